//! SMTP reply line parser.
//!
//! Replies arrive as one or more raw lines:
//! - Single: `250 OK\r\n`
//! - Multi: `250-First line\r\n250-Second line\r\n250 Last line\r\n`
//!
//! Only the final line determines the class and carries the data payload.

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyClass};

/// Shortest acceptable raw reply line, terminator included.
pub const MIN_REPLY_LINE: usize = 6;

/// Rejects raw lines too short to hold a status code, separator and text.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the line is shorter than [`MIN_REPLY_LINE`].
pub fn check_line(line: &[u8]) -> Result<()> {
    if line.len() < MIN_REPLY_LINE {
        return Err(Error::Protocol(format!(
            "Reply line too short: {:?}",
            String::from_utf8_lossy(line)
        )));
    }
    Ok(())
}

/// Checks if a raw line continues a multi-line reply.
///
/// Continuation lines carry `-` as their fourth character.
#[must_use]
pub fn is_continuation(line: &[u8]) -> bool {
    line.get(3) == Some(&b'-')
}

/// Returns the line without its CRLF or bare LF terminator.
#[must_use]
pub fn strip_terminator(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r\n")
        .or_else(|| line.strip_suffix(b"\n"))
        .unwrap_or(line)
}

/// Parses the final line of a reply.
///
/// The data payload is only extracted when `want_data` is set and the class
/// matches `expected`.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if data was requested but the line has no
/// room for a terminated payload.
pub fn parse_final_line(line: &[u8], expected: ReplyClass, want_data: bool) -> Result<Reply> {
    let class = line
        .first()
        .map_or(ReplyClass::PermanentNegative, |&b| {
            ReplyClass::from_leading_byte(b)
        });
    let mut reply = Reply::new(
        class,
        String::from_utf8_lossy(strip_terminator(line)).into_owned(),
    );

    if want_data && class == expected {
        reply.data = Some(extract_data(line)?);
    }

    Ok(reply)
}

/// Extracts the text after the status code and any blanks.
///
/// The last two bytes are taken to be the line terminator and dropped.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if fewer than two bytes remain for the
/// payload and its terminator.
pub fn extract_data(line: &[u8]) -> Result<String> {
    let digits = line.iter().take_while(|b| b.is_ascii_digit()).count();
    let rest = &line[digits..];
    let blanks = rest.iter().take_while(|&&b| b == b' ' || b == b'\t').count();
    let rest = &rest[blanks..];

    if rest.len() < 2 {
        return Err(Error::Protocol(format!(
            "Reply carries no data: {:?}",
            String::from_utf8_lossy(line)
        )));
    }

    let payload = &rest[..rest.len() - 2];
    Ok(String::from_utf8_lossy(payload).into_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_short_line_rejected() {
        assert!(matches!(check_line(b"250\r\n"), Err(Error::Protocol(_))));
        assert!(matches!(check_line(b""), Err(Error::Protocol(_))));
        assert!(check_line(b"250 \r\n").is_ok());
    }

    #[test]
    fn test_continuation() {
        assert!(is_continuation(b"250-first\r\n"));
        assert!(!is_continuation(b"250 third\r\n"));
        assert!(!is_continuation(b"25"));
    }

    #[test]
    fn test_parse_final_line() {
        let reply = parse_final_line(b"250 third\r\n", ReplyClass::PositiveCompletion, false).unwrap();
        assert_eq!(reply.class, ReplyClass::PositiveCompletion);
        assert_eq!(reply.line, "250 third");
        assert!(reply.data.is_none());
    }

    #[test]
    fn test_extract_challenge() {
        let reply =
            parse_final_line(b"334 BASE64DATA\r\n", ReplyClass::PositiveIntermediate, true)
                .unwrap();
        assert_eq!(reply.data.as_deref(), Some("BASE64DATA"));
    }

    #[test]
    fn test_no_data_on_class_mismatch() {
        let reply =
            parse_final_line(b"535 denied\r\n", ReplyClass::PositiveIntermediate, true).unwrap();
        assert_eq!(reply.class, ReplyClass::PermanentNegative);
        assert!(reply.data.is_none());
    }

    #[test]
    fn test_extract_skips_blanks() {
        assert_eq!(extract_data(b"334 \t  abc\r\n").unwrap(), "abc");
        assert_eq!(extract_data(b"334 \r\n").unwrap(), "");
    }

    #[test]
    fn test_extract_without_room_for_terminator() {
        assert!(matches!(extract_data(b"334   x"), Err(Error::Protocol(_))));
        assert!(matches!(extract_data(b"334    "), Err(Error::Protocol(_))));
        assert_eq!(extract_data(b"334 xy").unwrap(), "");
        assert_eq!(extract_data(b"334 xyz\r\n").unwrap(), "xyz");
    }

    #[test]
    fn test_garbage_class_is_permanent() {
        let reply = parse_final_line(b"XYZ what\r\n", ReplyClass::PositiveCompletion, false).unwrap();
        assert_eq!(reply.class, ReplyClass::PermanentNegative);
        assert_eq!(reply.line, "XYZ what");
    }
}
