//! SMTP reply types.

/// Reply class, taken from the leading status digit.
///
/// Anything that is not a digit between `1` and `5` collapses to
/// [`ReplyClass::PermanentNegative`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReplyClass {
    /// 1yz - positive preliminary
    PositivePreliminary,
    /// 2yz - positive completion
    PositiveCompletion,
    /// 3yz - positive intermediate
    PositiveIntermediate,
    /// 4yz - transient negative completion
    TransientNegative,
    /// 5yz - permanent negative completion
    PermanentNegative,
}

impl ReplyClass {
    /// Maps the first byte of a reply line to its class.
    #[must_use]
    pub const fn from_leading_byte(byte: u8) -> Self {
        match byte {
            b'1' => Self::PositivePreliminary,
            b'2' => Self::PositiveCompletion,
            b'3' => Self::PositiveIntermediate,
            b'4' => Self::TransientNegative,
            _ => Self::PermanentNegative,
        }
    }

    /// Returns the numeric class, always within `1..=5`.
    #[must_use]
    pub const fn as_digit(self) -> u8 {
        match self {
            Self::PositivePreliminary => 1,
            Self::PositiveCompletion => 2,
            Self::PositiveIntermediate => 3,
            Self::TransientNegative => 4,
            Self::PermanentNegative => 5,
        }
    }

    /// Returns true for 2yz replies.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::PositiveCompletion)
    }
}

impl std::fmt::Display for ReplyClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_digit())
    }
}

/// One logical SMTP reply, possibly assembled from several lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Class of the final line.
    pub class: ReplyClass,
    /// Final line, verbatim, without its terminator.
    pub line: String,
    /// Payload extracted from the final line, when it was requested and the
    /// class matched.
    pub data: Option<String>,
}

impl Reply {
    /// Creates a reply without a data payload.
    #[must_use]
    pub fn new(class: ReplyClass, line: impl Into<String>) -> Self {
        Self {
            class,
            line: line.into(),
            data: None,
        }
    }

    /// Returns true if this is a success reply (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.class.is_success()
    }
}
