//! Remote backend configuration.

use crate::{DEFAULT_POOL_SIZE, FsError};

/// Connection settings for a [`RemoteFs`](crate::RemoteFs).
///
/// # Examples
///
/// ```rust
/// use unifile::RemoteConfig;
///
/// let config = RemoteConfig::new("namenode:8020").with_pool_size(4);
/// assert_eq!(config.effective_pool_size(), 4);
/// assert_eq!(RemoteConfig::new("namenode:8020").effective_pool_size(), 16);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RemoteConfig {
    /// `host:port` of the remote filesystem's control service.
    pub address: String,
    /// Number of pooled clients. `0` selects [`DEFAULT_POOL_SIZE`].
    #[cfg_attr(feature = "serde", serde(default = "default_pool_size"))]
    pub pool_size: usize,
}

#[cfg(feature = "serde")]
fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

impl RemoteConfig {
    /// Environment variable holding the backend address.
    pub const ADDRESS_ENV: &'static str = "UNIFILE_REMOTE_ADDR";

    /// Environment variable holding the pool size.
    pub const POOL_SIZE_ENV: &'static str = "UNIFILE_POOL_SIZE";

    /// Config for `address` with the default pool size.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            pool_size: DEFAULT_POOL_SIZE,
        }
    }

    /// Set the pool size.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Pool size actually used.
    pub fn effective_pool_size(&self) -> usize {
        if self.pool_size == 0 {
            DEFAULT_POOL_SIZE
        } else {
            self.pool_size
        }
    }

    /// Reject an empty address.
    pub fn validate(&self) -> Result<(), FsError> {
        if self.address.trim().is_empty() {
            return Err(FsError::InvalidArgument {
                operation: "connect",
                details: "remote address is empty".into(),
            });
        }
        Ok(())
    }

    /// Read [`ADDRESS_ENV`](Self::ADDRESS_ENV) and
    /// [`POOL_SIZE_ENV`](Self::POOL_SIZE_ENV) from the process environment.
    ///
    /// # Errors
    ///
    /// [`FsError::InvalidArgument`] if the address is missing or empty, or the
    /// pool size is not an unsigned integer.
    pub fn from_env() -> Result<Self, FsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, FsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let address = lookup(Self::ADDRESS_ENV).ok_or_else(|| FsError::InvalidArgument {
            operation: "config",
            details: format!("{} is not set", Self::ADDRESS_ENV),
        })?;
        let pool_size = match lookup(Self::POOL_SIZE_ENV) {
            Some(raw) => raw.trim().parse().map_err(|e| FsError::InvalidArgument {
                operation: "config",
                details: format!("{}={raw:?}: {e}", Self::POOL_SIZE_ENV),
            })?,
            None => DEFAULT_POOL_SIZE,
        };
        let config = Self { address, pool_size };
        config.validate()?;
        Ok(config)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self::new("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn zero_pool_size_falls_back_to_default() {
        let config = RemoteConfig::new("nn:8020").with_pool_size(0);
        assert_eq!(config.effective_pool_size(), DEFAULT_POOL_SIZE);
    }

    #[test]
    fn pool_size_of_one_is_honored() {
        let config = RemoteConfig::new("nn:8020").with_pool_size(1);
        assert_eq!(config.effective_pool_size(), 1);
    }

    #[test]
    fn empty_address_is_invalid() {
        assert!(matches!(
            RemoteConfig::default().validate(),
            Err(FsError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn lookup_reads_address_and_pool_size() {
        let config = RemoteConfig::from_lookup(lookup(&[
            (RemoteConfig::ADDRESS_ENV, "nn:8020"),
            (RemoteConfig::POOL_SIZE_ENV, " 4 "),
        ]))
        .unwrap();
        assert_eq!(config, RemoteConfig::new("nn:8020").with_pool_size(4));
    }

    #[test]
    fn lookup_defaults_pool_size() {
        let config =
            RemoteConfig::from_lookup(lookup(&[(RemoteConfig::ADDRESS_ENV, "nn:8020")])).unwrap();
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
    }

    #[test]
    fn lookup_rejects_missing_address_and_bad_size() {
        assert!(RemoteConfig::from_lookup(lookup(&[])).is_err());
        let err = RemoteConfig::from_lookup(lookup(&[
            (RemoteConfig::ADDRESS_ENV, "nn:8020"),
            (RemoteConfig::POOL_SIZE_ENV, "many"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains(RemoteConfig::POOL_SIZE_ENV));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn pool_size_defaults_when_deserialized_without_it() {
        let config: RemoteConfig = serde_json::from_str(r#"{"address":"nn:8020"}"#).unwrap();
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
    }
}
