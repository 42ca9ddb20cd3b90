// ABOUTME: Validated stack name used as the node identity in the dependency graph.
// ABOUTME: Follows provisioning API naming rules: letters, digits and hyphens.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Maximum length accepted by the provisioning API for a stack name.
pub const MAX_STACK_NAME_LEN: usize = 128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StackNameError {
    #[error("stack name cannot be empty")]
    Empty,

    #[error("stack name exceeds maximum length of {MAX_STACK_NAME_LEN} characters")]
    TooLong,

    #[error("stack name must start with a letter")]
    InvalidStart,

    #[error("invalid character in stack name: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StackName(String);

impl StackName {
    pub fn new(value: &str) -> Result<Self, StackNameError> {
        let mut chars = value.chars();

        let first = chars.next().ok_or(StackNameError::Empty)?;

        if value.len() > MAX_STACK_NAME_LEN {
            return Err(StackNameError::TooLong);
        }

        if !first.is_ascii_alphabetic() {
            return Err(StackNameError::InvalidStart);
        }

        if let Some(c) = chars.find(|c| !c.is_ascii_alphanumeric() && *c != '-') {
            return Err(StackNameError::InvalidChar(c));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StackName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for StackName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for StackName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StackName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        StackName::new(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_letters_digits_and_hyphens() {
        let name = StackName::new("vpc-2-core").unwrap();
        assert_eq!(name.as_str(), "vpc-2-core");
    }

    #[test]
    fn rejects_leading_digit() {
        assert_eq!(StackName::new("2vpc"), Err(StackNameError::InvalidStart));
    }

    #[test]
    fn rejects_slash() {
        assert_eq!(
            StackName::new("dev/vpc"),
            Err(StackNameError::InvalidChar('/'))
        );
    }

    #[test]
    fn orders_lexicographically() {
        let a = StackName::new("alpha").unwrap();
        let b = StackName::new("beta").unwrap();
        assert!(a < b);
    }
}
