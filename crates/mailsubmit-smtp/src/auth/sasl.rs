//! SASL payload encodings.
//!
//! Implements:
//! - PLAIN (RFC 4616) - `\0<user>\0<password>`
//! - XOAUTH2 (Google/Microsoft proprietary) - bearer token blob
//! - CRAM-MD5 (RFC 2195) - keyed-hash challenge response
//!
//! Every encoded response goes through [`encode`], which rejects payloads
//! whose command line would exceed [`AUTH_LINE_CAPACITY`] before encoding.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};

type HmacMd5 = Hmac<md5::Md5>;

/// Longest AUTH command line, CRLF included (RFC 4954, section 4).
pub const AUTH_LINE_CAPACITY: usize = 12_288;

/// Base64-encodes `payload` for a line starting with `prefix`.
///
/// The full line length (prefix, encoded payload and CRLF) is computed and
/// checked before anything is encoded.
///
/// # Errors
///
/// Returns [`Error::CredentialsOverflow`] if the line would not fit.
pub fn encode(prefix: &str, payload: &[u8]) -> Result<String> {
    let overflow = || Error::CredentialsOverflow {
        capacity: AUTH_LINE_CAPACITY,
    };

    let line_len = base64::encoded_len(payload.len(), true)
        .and_then(|n| n.checked_add(prefix.len()))
        .and_then(|n| n.checked_add(2))
        .ok_or_else(overflow)?;
    if line_len > AUTH_LINE_CAPACITY {
        return Err(overflow());
    }

    Ok(STANDARD.encode(payload))
}

/// PLAIN message with an empty authorization identity.
#[must_use]
pub fn plain_blob(username: &str, password: &str) -> Vec<u8> {
    format!("\0{username}\0{password}").into_bytes()
}

/// XOAUTH2 initial response, before encoding.
///
/// Format: `user=<user>\x01auth=Bearer <token>\x01\x01`
#[must_use]
pub fn xoauth2_blob(user: &str, token: &str) -> Vec<u8> {
    format!("user={user}\x01auth=Bearer {token}\x01\x01").into_bytes()
}

/// Computes the encoded CRAM-MD5 response to a base64 challenge.
///
/// Response = base64(`<user> <hex(HMAC-MD5(password, challenge))>`)
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the challenge is not valid base64, or
/// [`Error::CredentialsOverflow`] if the response would not fit a line.
pub fn cram_md5_response(username: &str, password: &str, challenge: &str) -> Result<String> {
    let challenge = STANDARD
        .decode(challenge.trim())
        .map_err(|e| Error::Protocol(format!("Invalid CRAM-MD5 challenge: {e}")))?;

    let mut mac = HmacMd5::new_from_slice(password.as_bytes())
        .map_err(|e| Error::Protocol(format!("CRAM-MD5 key rejected: {e}")))?;
    mac.update(&challenge);
    let digest = hex::encode(mac.finalize().into_bytes());

    encode("", format!("{username} {digest}").as_bytes())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_format() {
        let encoded = encode("", &plain_blob("bob", "secret")).unwrap();
        assert_eq!(encoded, "AGJvYgBzZWNyZXQ=");
        assert_eq!(STANDARD.decode(encoded).unwrap(), b"\0bob\0secret");
    }

    #[test]
    fn test_xoauth2_format() {
        let blob = xoauth2_blob("bob", "tok");
        assert_eq!(blob, b"user=bob\x01auth=Bearer tok\x01\x01");
        assert_eq!(
            encode("AUTH XOAUTH2 ", &blob).unwrap(),
            "dXNlcj1ib2IBYXV0aD1CZWFyZXIgdG9rAQE="
        );
    }

    #[test]
    fn test_cram_md5_rfc2195_example() {
        let response = cram_md5_response(
            "tim",
            "tanstaaftanstaaf",
            "PDE4OTYuNjk3MTcwOTUyQHBvc3RvZmZpY2UucmVzdG9uLm1jaS5uZXQ+",
        )
        .unwrap();
        assert_eq!(response, "dGltIGI5MTNhNjAyYzdlZGE3YTQ5NWI0ZTZlNzMzNGQzODkw");
    }

    #[test]
    fn test_cram_md5_bad_challenge() {
        assert!(matches!(
            cram_md5_response("tim", "pw", "not base64!"),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_capacity_boundary() {
        // 9213 bytes encode to 12284 characters; with CRLF that is 12286.
        let payload = vec![b'a'; 9213];
        assert!(encode("", &payload).is_ok());
        assert!(encode("AUTH ", &payload).is_err());
    }

    #[test]
    fn test_overflow_reports_capacity() {
        let payload = vec![b'x'; AUTH_LINE_CAPACITY];
        match encode("", &payload) {
            Err(Error::CredentialsOverflow { capacity }) => {
                assert_eq!(capacity, AUTH_LINE_CAPACITY);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
