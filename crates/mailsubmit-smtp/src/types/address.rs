//! Envelope address types.

/// Envelope recipient.
///
/// Recipients are kept in the order they were declared. Excluded recipients
/// stay in the list but are never sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Recipient {
    address: String,
    excluded: bool,
    has_domain: bool,
}

impl Recipient {
    /// Creates a recipient, detecting whether the address carries a domain.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        let address = address.into();
        let has_domain = address
            .rsplit_once('@')
            .is_some_and(|(_, domain)| !domain.is_empty());
        Self {
            address,
            excluded: false,
            has_domain,
        }
    }

    /// Marks the recipient as excluded from the envelope.
    #[must_use]
    pub const fn excluded(mut self) -> Self {
        self.excluded = true;
        self
    }

    /// Returns the address as given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.address
    }

    /// Returns true if the recipient must be skipped.
    #[must_use]
    pub const fn is_excluded(&self) -> bool {
        self.excluded
    }

    /// Returns true if the address has a domain part.
    #[must_use]
    pub const fn has_domain(&self) -> bool {
        self.has_domain
    }

    /// Returns the address to put in `RCPT TO`, appending `@hostname` when
    /// the address has no domain.
    #[must_use]
    pub fn envelope_address(&self, hostname: &str) -> String {
        if self.has_domain {
            self.address.clone()
        } else {
            let name = self.address.trim_end_matches('@');
            format!("{name}@{hostname}")
        }
    }
}

impl std::fmt::Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.address)
    }
}

impl From<&str> for Recipient {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}
