//! Message body transmission.
//!
//! Lines are sent one by one with CRLF terminators. `Bcc:` headers and
//! their continuation lines are dropped while still in the header block,
//! and any line starting with `.` is dot-stuffed (RFC 5321, section 4.5.2).

use crate::connection::{Session, Transport};
use crate::error::{Error, Result};
use crate::parser::strip_terminator;
use std::io::SeekFrom;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncSeek, AsyncSeekExt};

/// Per-line transparency filter for one message.
#[derive(Debug, Clone)]
pub struct BodyFilter {
    in_headers: bool,
    skipping_bcc: bool,
}

impl Default for BodyFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl BodyFilter {
    /// Creates a filter positioned at the start of the header block.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            in_headers: true,
            skipping_bcc: false,
        }
    }

    /// Returns the wire form of `line`, or `None` if it must not be sent.
    ///
    /// `line` may end in CRLF, LF or nothing; the output always ends in CRLF.
    pub fn filter(&mut self, line: &[u8]) -> Option<Vec<u8>> {
        let content = strip_terminator(line);

        if self.in_headers {
            if content.is_empty() {
                self.in_headers = false;
                self.skipping_bcc = false;
            } else if self.skipping_bcc && matches!(content[0], b' ' | b'\t') {
                return None;
            } else {
                self.skipping_bcc = is_bcc(content);
                if self.skipping_bcc {
                    return None;
                }
            }
        }

        let mut out = Vec::with_capacity(content.len() + 3);
        if content.first() == Some(&b'.') {
            out.push(b'.');
        }
        out.extend_from_slice(content);
        out.extend_from_slice(b"\r\n");
        Some(out)
    }

    /// Returns true while the header block has not ended.
    #[must_use]
    pub const fn in_headers(&self) -> bool {
        self.in_headers
    }
}

fn is_bcc(line: &[u8]) -> bool {
    line.get(..4)
        .is_some_and(|name| name.eq_ignore_ascii_case(b"bcc:"))
}

/// Rewinds `body` and streams it through a [`BodyFilter`].
///
/// Does not send the end-of-data marker. Returns the number of bytes
/// written.
///
/// # Errors
///
/// Returns [`Error::Stream`] if the source cannot be rewound or read, or
/// any error of [`Session::write_raw`].
pub async fn send_body<T, R>(session: &mut Session<T>, body: &mut R) -> Result<u64>
where
    T: Transport,
    R: AsyncBufRead + AsyncSeek + Unpin,
{
    body.seek(SeekFrom::Start(0))
        .await
        .map_err(Error::Stream)?;

    let mut filter = BodyFilter::new();
    let mut line = Vec::new();
    let mut sent = 0u64;

    loop {
        line.clear();
        if body
            .read_until(b'\n', &mut line)
            .await
            .map_err(Error::Stream)?
            == 0
        {
            break;
        }

        if let Some(out) = filter.filter(&line) {
            session.write_raw(&out).await?;
            sent += out.len() as u64;
        }
    }

    Ok(sent)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::connection::LineTransport;
    use crate::signal::Interrupt;
    use proptest::prelude::*;
    use std::io::Cursor;
    use tokio_test::io::Builder;

    fn run(input: &[u8]) -> Vec<Vec<u8>> {
        let mut filter = BodyFilter::new();
        input
            .split_inclusive(|b| *b == b'\n')
            .filter_map(|line| filter.filter(line))
            .collect()
    }

    #[test]
    fn test_lone_dot_is_stuffed() {
        let out = run(b"Subject: x\r\n\r\n.\r\n");
        assert_eq!(out.last().unwrap(), b"..\r\n");
    }

    #[test]
    fn test_leading_dot_in_header_is_stuffed() {
        let out = run(b".weird: header\r\n");
        assert_eq!(out, vec![b"..weird: header\r\n".to_vec()]);
    }

    #[test]
    fn test_bcc_with_continuation_is_dropped() {
        let out = run(b"From: a@b\r\nBcc: x@y\r\n \r\n\tz@w\r\nTo: c@d\r\n\r\nbody\r\n");
        assert_eq!(
            out,
            vec![
                b"From: a@b\r\n".to_vec(),
                b"To: c@d\r\n".to_vec(),
                b"\r\n".to_vec(),
                b"body\r\n".to_vec(),
            ]
        );
    }

    #[test]
    fn test_bcc_is_case_insensitive() {
        assert!(run(b"BCC: x@y\r\n").is_empty());
        assert!(run(b"bcc:x@y\r\n").is_empty());
        assert_eq!(run(b"Bccx: y\r\n").len(), 1);
    }

    #[test]
    fn test_bcc_in_body_is_kept() {
        let out = run(b"Subject: s\r\n\r\nBcc: x@y\r\n");
        assert_eq!(out.last().unwrap(), b"Bcc: x@y\r\n");
    }

    #[test]
    fn test_line_endings_normalized() {
        let out = run(b"Subject: s\n\nline one\nlast");
        assert_eq!(
            out,
            vec![
                b"Subject: s\r\n".to_vec(),
                b"\r\n".to_vec(),
                b"line one\r\n".to_vec(),
                b"last\r\n".to_vec(),
            ]
        );
    }

    #[tokio::test]
    async fn test_send_body_rewinds_source() {
        let mock = Builder::new()
            .write(b"Subject: s\r\n")
            .write(b"\r\n")
            .write(b"..\r\n")
            .build();
        let mut session = Session::new(LineTransport::new(mock), "body", Interrupt::never());

        let mut body = Cursor::new(b"Subject: s\n\n.\n".to_vec());
        body.set_position(5);
        let sent = send_body(&mut session, &mut body).await.unwrap();
        assert_eq!(sent, 18);
    }

    proptest! {
        #[test]
        fn no_output_line_is_a_lone_dot(input in proptest::collection::vec(
            prop_oneof![Just(b'.'), Just(b'\n'), Just(b'\r'), Just(b'a'), Just(b' ')],
            0..200,
        )) {
            for line in run(&input) {
                prop_assert_ne!(line.as_slice(), b".\r\n".as_slice());
                prop_assert!(line.ends_with(b"\r\n"));
            }
        }
    }
}
