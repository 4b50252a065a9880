//! Message envelope.

use super::Recipient;

/// One message to submit: sender, recipients and a seekable body.
///
/// The body is rewound before it is streamed, so a source that was already
/// read (for example to compute `size`) can be passed as is.
#[derive(Debug)]
pub struct Envelope<R> {
    /// Envelope sender for `MAIL FROM`.
    pub sender: String,
    /// Recipients, in submission order.
    pub recipients: Vec<Recipient>,
    /// Message source (headers and body).
    pub body: R,
    /// Size of the message source in bytes.
    pub size: u64,
}

impl<R> Envelope<R> {
    /// Creates an envelope with no recipients.
    pub fn new(sender: impl Into<String>, body: R, size: u64) -> Self {
        Self {
            sender: sender.into(),
            recipients: Vec::new(),
            body,
            size,
        }
    }

    /// Adds a recipient.
    #[must_use]
    pub fn to(mut self, recipient: impl Into<Recipient>) -> Self {
        self.recipients.push(recipient.into());
        self
    }

    /// Adds a recipient that is kept in the list but never sent.
    #[must_use]
    pub fn excluded(mut self, recipient: impl Into<Recipient>) -> Self {
        self.recipients.push(recipient.into().excluded());
        self
    }

    /// Recipients that will be announced with `RCPT TO`.
    pub fn active_recipients(&self) -> impl Iterator<Item = &Recipient> {
        self.recipients.iter().filter(|rcpt| !rcpt.is_excluded())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_recipients_skip_excluded() {
        let envelope = Envelope::new("me@example.com", (), 0)
            .to("a@example.com")
            .excluded("b@example.com")
            .to("c");

        let active: Vec<&str> = envelope.active_recipients().map(Recipient::as_str).collect();
        assert_eq!(active, vec!["a@example.com", "c"]);
        assert_eq!(envelope.recipients.len(), 3);
    }
}
