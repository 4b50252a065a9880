//! Core SMTP types.

mod address;
mod envelope;
mod reply;

pub use address::Recipient;
pub use envelope::Envelope;
pub use reply::{Reply, ReplyClass};
