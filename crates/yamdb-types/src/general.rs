use std::{fmt::Display, str::FromStr};

use garde::Validate;
use serde::{Deserialize, Serialize};

pub const EMAIL_MAX_LENGTH: usize = 254;
pub const USERNAME_MAX_LENGTH: usize = 150;
/// Reserved for current user endpoint `/users/me`
pub const RESERVED_USERNAME: &str = "me";

#[derive(Debug, Clone, PartialEq, Eq, Validate, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[garde(transparent)]
pub struct ValidEmail(#[garde(email, length(max = 254))] String);

impl FromStr for ValidEmail {
    type Err = garde::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let email = ValidEmail(s.to_string());
        email.validate()?;
        Ok(email)
    }
}

impl AsRef<str> for ValidEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for ValidEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn not_reserved(username: &str, _ctx: &()) -> garde::Result {
    if username == RESERVED_USERNAME {
        Err(garde::Error::new(format!(
            "{RESERVED_USERNAME} cannot be used as username"
        )))
    } else {
        Ok(())
    }
}

/// Letters, digits and @/./+/-/_ only, "me" is reserved
#[derive(Debug, Clone, PartialEq, Eq, Validate, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[garde(transparent)]
pub struct ValidUsername(
    #[garde(
        length(min = 1, max = 150),
        pattern(r"^[\w.@+-]+\z"),
        custom(not_reserved)
    )]
    String,
);

impl FromStr for ValidUsername {
    type Err = garde::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let username = ValidUsername(s.to_string());
        username.validate()?;
        Ok(username)
    }
}

impl AsRef<str> for ValidUsername {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for ValidUsername {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use fake::Fake as _;
    use quickcheck::Arbitrary;
    use quickcheck_macros::quickcheck;

    use super::*;

    impl Arbitrary for ValidEmail {
        fn arbitrary(_g: &mut quickcheck::Gen) -> Self {
            let email: String = fake::faker::internet::en::SafeEmail().fake();
            ValidEmail(email)
        }
    }

    #[quickcheck]
    fn test_valid_email_arbitrary(valid_email: ValidEmail) {
        assert!(valid_email.validate().is_ok());
    }

    #[test]
    fn test_valid_email() {
        let email = ValidEmail::from_str("admin@localhost").unwrap();
        assert_eq!(email.as_ref(), "admin@localhost");
    }

    #[test]
    fn test_invalid_email() {
        let email = ValidEmail::from_str("admin");
        assert!(email.is_err());

        let long = format!("{}@example.com", "a".repeat(250));
        assert!(ValidEmail::from_str(&long).is_err());
    }

    #[test]
    fn test_valid_username() {
        for name in ["ivan", "ivan.usak", "ivan+1@home", "under_score", "me2", "meme"] {
            assert!(ValidUsername::from_str(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn test_reserved_username() {
        let err = ValidUsername::from_str("me").unwrap_err();
        assert!(err.to_string().contains("cannot be used as username"));
    }

    #[test]
    fn test_invalid_username() {
        for name in ["", "with space", "semi;colon", "new\nline"] {
            assert!(ValidUsername::from_str(name).is_err(), "{name:?} should be invalid");
        }
        assert!(ValidUsername::from_str(&"x".repeat(USERNAME_MAX_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_username_deserialize() {
        let name: ValidUsername = serde_json::from_str("\"ivan\"").unwrap();
        assert_eq!("ivan", name.as_ref());
    }
}
