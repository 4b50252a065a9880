//! Transport that logs the session instead of talking to a server.

use super::Transport;
use crate::error::Result;
use std::collections::VecDeque;
use std::io;

/// Base64 of `<1.dry-run@localhost>`, offered as CRAM-MD5 challenge.
const DRY_RUN_CHALLENGE: &str = "PDEuZHJ5LXJ1bkBsb2NhbGhvc3Q+";

/// Logs every line the engine would send and answers like an accepting
/// server.
///
/// Selected at runtime with `dry_run` in the submit options.
#[derive(Debug)]
pub struct DryRunTransport {
    pending: VecDeque<Vec<u8>>,
    in_data: bool,
    sasl_steps: u8,
    tls: bool,
}

impl Default for DryRunTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl DryRunTransport {
    /// Creates a transport whose first reply is a greeting.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: VecDeque::from([b"220 dry-run ESMTP\r\n".to_vec()]),
            in_data: false,
            sasl_steps: 0,
            tls: false,
        }
    }

    fn respond(&mut self, line: &[u8]) {
        if self.in_data {
            if line == b".\r\n" {
                self.in_data = false;
                self.pending
                    .push_back(b"250 2.0.0 dry run, message not sent\r\n".to_vec());
            }
            return;
        }

        if self.sasl_steps > 0 {
            self.sasl_steps -= 1;
            let reply: &[u8] = if self.sasl_steps > 0 {
                b"334 UGFzc3dvcmQ6\r\n"
            } else {
                b"235 2.7.0 dry run accepted\r\n"
            };
            self.pending.push_back(reply.to_vec());
            return;
        }

        let text = String::from_utf8_lossy(line).trim_end().to_ascii_uppercase();
        let mut words = text.split_whitespace();
        let reply: Vec<u8> = match (words.next(), words.next(), words.next()) {
            (Some("DATA"), ..) => {
                self.in_data = true;
                b"354 end data with <CR><LF>.<CR><LF>\r\n".to_vec()
            }
            (Some("QUIT"), ..) => b"221 2.0.0 bye\r\n".to_vec(),
            (Some("STARTTLS"), ..) => b"220 2.0.0 ready to start TLS\r\n".to_vec(),
            (Some("AUTH"), Some("LOGIN"), None) => {
                self.sasl_steps = 2;
                b"334 VXNlcm5hbWU6\r\n".to_vec()
            }
            (Some("AUTH"), Some("PLAIN"), None) => {
                self.sasl_steps = 1;
                b"334 \r\n".to_vec()
            }
            (Some("AUTH"), Some("CRAM-MD5"), None) => {
                self.sasl_steps = 1;
                format!("334 {DRY_RUN_CHALLENGE}\r\n").into_bytes()
            }
            (Some("AUTH"), ..) => b"235 2.7.0 dry run accepted\r\n".to_vec(),
            _ => b"250 2.0.0 ok\r\n".to_vec(),
        };
        self.pending.push_back(reply);
    }

    fn describe(&self, line: &[u8]) -> String {
        if self.sasl_steps > 0 {
            return "<credentials>".to_string();
        }
        let text = String::from_utf8_lossy(line).trim_end().to_string();
        let mut words = text.splitn(3, ' ');
        match (words.next(), words.next(), words.next()) {
            (Some(auth), Some(mech), Some(resp))
                if auth.eq_ignore_ascii_case("AUTH") && resp != "=" =>
            {
                format!("AUTH {mech} <credentials>")
            }
            _ => text,
        }
    }
}

impl Transport for DryRunTransport {
    async fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        let Some(line) = self.pending.pop_front() else {
            return Ok(0);
        };
        buf.extend_from_slice(&line);
        Ok(line.len())
    }

    async fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        if self.in_data {
            tracing::trace!(line = %String::from_utf8_lossy(line).trim_end(), "dry run data");
        } else {
            tracing::info!(line = %self.describe(line), "dry run, not sent");
        }
        self.respond(line);
        Ok(())
    }

    async fn upgrade_to_tls(&mut self) -> Result<()> {
        tracing::info!("dry run, TLS negotiation skipped");
        self.tls = true;
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn is_tls(&self) -> bool {
        self.tls
    }
}
