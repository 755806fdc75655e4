//! Confirmation codes sent by mail at sign-up.
//!
//! Codes are not stored: a code is a timestamp plus truncated HMAC over user's identity
//! and time of last login. Once user logs in with the code, last login changes and all
//! codes issued before stop matching.

use std::time::{Duration, SystemTime};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

const MAC_LENGTH: usize = 16;
/// Tolerance for clock skew between issue and check
const MAX_FUTURE_SECS: u64 = 60;

/// User state the code is bound to
#[derive(Debug, Clone, Copy)]
pub struct CodeSubject<'a> {
    pub user_id: i64,
    pub email: &'a str,
    /// Unix timestamp (nanos) of last login, `None` if user never logged in
    pub last_login: Option<i128>,
}

pub struct ConfirmationCodes {
    key: Vec<u8>,
    validity: Duration,
}

fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

impl ConfirmationCodes {
    pub fn new(key: impl AsRef<[u8]>, validity: Duration) -> Self {
        ConfirmationCodes {
            key: key.as_ref().to_vec(),
            validity,
        }
    }

    fn mac(&self, subject: &CodeSubject<'_>, timestamp: u64) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.key)?;
        mac.update(&subject.user_id.to_be_bytes());
        mac.update(b"|");
        mac.update(subject.email.as_bytes());
        mac.update(b"|");
        if let Some(last_login) = subject.last_login {
            mac.update(&last_login.to_be_bytes());
        }
        mac.update(b"|");
        mac.update(&timestamp.to_be_bytes());
        Ok(mac)
    }

    fn make_at(&self, subject: &CodeSubject<'_>, timestamp: u64) -> Result<String> {
        let tag = self.mac(subject, timestamp)?.finalize().into_bytes();
        let tag = base16ct::lower::encode_string(&tag[..MAC_LENGTH]);
        Ok(format!("{timestamp:x}-{tag}"))
    }

    pub fn make(&self, subject: &CodeSubject<'_>) -> Result<String> {
        self.make_at(subject, unix_secs(SystemTime::now()))
    }

    pub fn check(&self, subject: &CodeSubject<'_>, code: &str) -> Result<()> {
        let (timestamp, tag) = code
            .split_once('-')
            .ok_or(Error::InvalidCode("malformed"))?;
        let timestamp =
            u64::from_str_radix(timestamp, 16).map_err(|_| Error::InvalidCode("malformed"))?;
        let tag = base16ct::lower::decode_vec(tag).map_err(|_| Error::InvalidCode("malformed"))?;
        if tag.len() != MAC_LENGTH {
            return Err(Error::InvalidCode("malformed"));
        }

        let now = unix_secs(SystemTime::now());
        if timestamp > now + MAX_FUTURE_SECS {
            return Err(Error::InvalidCode("issued in future"));
        }
        if now - timestamp.min(now) > self.validity.as_secs() {
            debug!("Confirmation code for user {} expired", subject.user_id);
            return Err(Error::InvalidCode("expired"));
        }

        self.mac(subject, timestamp)?
            .verify_truncated_left(&tag)
            .map_err(|_| Error::InvalidCode("mismatch"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(last_login: Option<i128>) -> CodeSubject<'static> {
        CodeSubject {
            user_id: 7,
            email: "reviewer@example.com",
            last_login,
        }
    }

    fn codes() -> ConfirmationCodes {
        ConfirmationCodes::new(b"0123456789abcdef", Duration::from_secs(3600))
    }

    #[test]
    fn test_code() {
        let codes = codes();
        let code = codes.make(&subject(None)).unwrap();
        assert!(code.len() < 250);
        codes.check(&subject(None), &code).unwrap();

        let other = CodeSubject {
            email: "other@example.com",
            ..subject(None)
        };
        assert!(codes.check(&other, &code).is_err());
    }

    #[test]
    fn test_code_used_by_login() {
        let codes = codes();
        let code = codes.make(&subject(None)).unwrap();
        let err = codes.check(&subject(Some(1_700_000_000_000)), &code).unwrap_err();
        assert!(matches!(err, Error::InvalidCode("mismatch")));
    }

    #[test]
    fn test_code_expired() {
        let codes = codes();
        let issued = unix_secs(SystemTime::now()) - 7200;
        let code = codes.make_at(&subject(None), issued).unwrap();
        let err = codes.check(&subject(None), &code).unwrap_err();
        assert!(matches!(err, Error::InvalidCode("expired")));

        let issued = unix_secs(SystemTime::now()) + 3600;
        let code = codes.make_at(&subject(None), issued).unwrap();
        assert!(codes.check(&subject(None), &code).is_err());
    }

    #[test]
    fn test_code_garbage() {
        let codes = codes();
        for code in ["", "abc", "zz-00", "1234-", "1234-abcd"] {
            assert!(codes.check(&subject(None), code).is_err(), "{code} accepted");
        }

        let code = codes.make(&subject(None)).unwrap();
        let mut tampered = code.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == '0' { '1' } else { '0' });
        assert!(codes.check(&subject(None), &tampered).is_err());
    }
}
