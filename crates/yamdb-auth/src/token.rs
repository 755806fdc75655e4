use std::time::{Duration, SystemTime};

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Serialize};
use yamdb_types::claim::TimeLimited;

use crate::error::Result;

const ALGORITHM: Algorithm = Algorithm::HS256;
/// Allowed clock skew when checking expiration
const LEEWAY_SECS: u64 = 30;

/// Issues and validates HS256 access tokens
pub struct TokenManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validity: Duration,
    validation: Validation,
}

impl TokenManager {
    pub fn new(secret: impl AsRef<[u8]>, validity: Duration) -> Self {
        let secret = secret.as_ref();
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = LEEWAY_SECS;
        validation.set_required_spec_claims(&["exp", "sub"]);
        TokenManager {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validity,
            validation,
        }
    }

    fn sign(&self, mut claims: impl Serialize + TimeLimited, until: SystemTime) -> Result<String> {
        claims.set_validity(until);
        Ok(encode(&Header::new(ALGORITHM), &claims, &self.encoding)?)
    }

    /// Token valid for configured time from now
    pub fn issue(&self, claims: impl Serialize + TimeLimited) -> Result<String> {
        self.sign(claims, SystemTime::now() + self.validity)
    }

    #[cfg(test)]
    pub fn issue_expired(&self, claims: impl Serialize + TimeLimited) -> Result<String> {
        self.sign(claims, SystemTime::now() - self.validity)
    }

    /// Checks signature, algorithm and expiration, returns claims
    pub fn validate<T: DeserializeOwned>(&self, token: &str) -> Result<T> {
        let data = decode::<T>(token, &self.decoding, &self.validation)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use yamdb_types::claim::{ApiClaim, Authorization, Role, TimeLimited};

    use super::*;
    use crate::Error;

    #[test]
    fn test_token() {
        let claim = ApiClaim::new_expired("123", "reviewer", Role::Moderator);
        let manager = TokenManager::new("secret", Duration::from_secs(3600));
        let token = manager.issue(claim).unwrap();
        let res = manager.validate::<ApiClaim>(&token);
        assert!(res.is_ok());
        let claim = res.unwrap();
        assert_eq!(claim.sub, "123");
        assert_eq!(Some(123), claim.user_id());
        assert_eq!("reviewer", claim.username);
        assert!(claim.is_moderator());
        assert!(claim.check_validity());
    }

    #[test]
    fn test_token_expiration() {
        let claim = ApiClaim::new_expired("123", "reviewer", Role::User);
        let manager = TokenManager::new("secret", Duration::from_secs(3600));
        let token = manager.issue_expired(claim).unwrap();
        let res = manager.validate::<ApiClaim>(&token);
        assert!(res.is_err());

        match res.unwrap_err() {
            Error::JwtError(e) => assert!(matches!(
                e.kind(),
                jsonwebtoken::errors::ErrorKind::ExpiredSignature
            )),
            err => panic!("Unexpected error: {}", err),
        }
    }

    #[test]
    fn test_token_other_secret() {
        let claim = ApiClaim::new_expired("1", "reviewer", Role::Admin);
        let manager = TokenManager::new("secret", Duration::from_secs(3600));
        let token = manager.issue(claim).unwrap();
        let other = TokenManager::new("other secret", Duration::from_secs(3600));
        assert!(other.validate::<ApiClaim>(&token).is_err());
    }

    #[test]
    fn test_other_algorithm_rejected() {
        let mut claim = ApiClaim::new_expired("7", "reviewer", Role::User);
        claim.set_validity(std::time::SystemTime::now() + Duration::from_secs(600));
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claim,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        let manager = TokenManager::new("secret", Duration::from_secs(3600));

        match manager.validate::<ApiClaim>(&token).unwrap_err() {
            Error::JwtError(e) => assert!(matches!(
                e.kind(),
                jsonwebtoken::errors::ErrorKind::InvalidAlgorithm
            )),
            err => panic!("Unexpected error: {}", err),
        }
    }
}
