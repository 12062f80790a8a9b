use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Per-field cast failure policy.
///
/// The flags are independent. With neither `fallback_to_string` nor
/// `drop_property` set, a failed cast aborts the whole record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OnErrorPolicy {
    pub fallback_to_string: bool,
    pub drop_property: bool,
    pub silent: bool,
}

/// What the document builder does with a field whose cast failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastFailureAction {
    StoreAsString,
    SkipField,
    DropRecord,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "Invalid on-error policy '{0}'. Expected one of drop-message, drop-property, fallback-to-string, optionally prefixed with 'silently-'"
)]
pub struct PolicyParseError(pub String);

impl OnErrorPolicy {
    pub const DROP_MESSAGE: Self = Self {
        fallback_to_string: false,
        drop_property: false,
        silent: false,
    };

    pub const FALLBACK_TO_STRING: Self = Self {
        fallback_to_string: true,
        drop_property: false,
        silent: false,
    };

    pub const DROP_PROPERTY: Self = Self {
        fallback_to_string: false,
        drop_property: true,
        silent: false,
    };

    pub fn silently(mut self) -> Self {
        self.silent = true;
        self
    }

    pub fn on_failure(&self) -> CastFailureAction {
        if self.fallback_to_string {
            CastFailureAction::StoreAsString
        } else if self.drop_property {
            CastFailureAction::SkipField
        } else {
            CastFailureAction::DropRecord
        }
    }
}

impl fmt::Display for OnErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.silent {
            f.write_str("silently-")?;
        }
        f.write_str(match self.on_failure() {
            CastFailureAction::StoreAsString => "fallback-to-string",
            CastFailureAction::SkipField => "drop-property",
            CastFailureAction::DropRecord => "drop-message",
        })
    }
}

impl FromStr for OnErrorPolicy {
    type Err = PolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        let (silent, action) = match normalized.strip_prefix("silently-") {
            Some(rest) => (true, rest),
            None => (false, normalized.as_str()),
        };

        let policy = match action {
            "drop-message" => Self::DROP_MESSAGE,
            "drop-property" => Self::DROP_PROPERTY,
            "fallback-to-string" => Self::FALLBACK_TO_STRING,
            _ => return Err(PolicyParseError(s.to_string())),
        };

        Ok(Self { silent, ..policy })
    }
}

impl TryFrom<String> for OnErrorPolicy {
    type Error = PolicyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OnErrorPolicy> for String {
    fn from(policy: OnErrorPolicy) -> Self {
        policy.to_string()
    }
}
