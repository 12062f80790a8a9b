use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const SCHEMES: &[&str] = &["mongodb://", "mongodb+srv://"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UriError {
    #[error("Error parsing MongoDB URI '{0}': expected mongodb:// or mongodb+srv:// scheme")]
    InvalidScheme(String),
    #[error("Error parsing MongoDB URI '{0}': no host given")]
    MissingHost(String),
    #[error("Missing DB name from MongoDB URI '{0}'")]
    MissingDatabase(String),
}

/// A validated MongoDB connection string.
///
/// Only the parts the writer needs are extracted (database name and a
/// credential-free rendering); everything else is handed to the driver
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreUri {
    raw: String,
    database: String,
    redacted: String,
}

impl StoreUri {
    pub fn parse(uri: &str) -> Result<Self, UriError> {
        let (scheme, rest) = SCHEMES
            .iter()
            .find_map(|scheme| uri.strip_prefix(scheme).map(|rest| (*scheme, rest)))
            .ok_or_else(|| UriError::InvalidScheme(uri.to_string()))?;

        let (authority, path) = match rest.split_once('/') {
            Some((authority, path)) => (authority, path),
            None => (rest, ""),
        };

        let (userinfo, hosts) = match authority.rsplit_once('@') {
            Some((userinfo, hosts)) => (Some(userinfo), hosts),
            None => (None, authority),
        };
        if hosts.is_empty() || hosts.split(',').any(str::is_empty) {
            return Err(UriError::MissingHost(uri.to_string()));
        }

        let database = path.split('?').next().unwrap_or_default();
        if database.is_empty() {
            return Err(UriError::MissingDatabase(uri.to_string()));
        }

        let redacted = match userinfo.and_then(|info| info.split_once(':')) {
            Some((user, _password)) => format!("{scheme}{user}:***@{hosts}/{path}"),
            None => uri.to_string(),
        };

        Ok(Self {
            raw: uri.to_string(),
            database: database.to_string(),
            redacted,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// The URI with any password replaced, safe for logs and stats names.
    pub fn redacted(&self) -> &str {
        &self.redacted
    }
}

impl FromStr for StoreUri {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for StoreUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted)
    }
}
