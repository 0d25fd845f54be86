use crate::error::{ConfigError, Result};
use std::fmt;

pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";

#[derive(Clone, PartialEq, Eq)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &self.session_token.as_ref().map(|_| "** redacted **"))
            .finish()
    }
}

/// Everything `S3Storage` needs to build a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Config {
    pub bucket: String,
    /// Custom endpoint for S3-compatible services (MinIO, Ceph, ...).
    pub endpoint_url: Option<String>,
    pub region: String,
    pub credentials: S3Credentials,
}

impl S3Config {
    pub fn new(
        bucket: impl Into<String>,
        region: impl Into<String>,
        credentials: S3Credentials,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            endpoint_url: None,
            region: region.into(),
            credentials,
        }
    }

    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        let url = endpoint_url.into();
        self.endpoint_url = (!url.is_empty()).then_some(url);
        self
    }

    /// Reads credentials and region from the process environment. Fails on
    /// the first required variable that is unset or empty.
    pub fn from_env(bucket: impl Into<String>, endpoint_url: Option<String>) -> Result<Self> {
        Self::from_lookup(bucket, endpoint_url, |key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(
        bucket: impl Into<String>,
        endpoint_url: Option<String>,
        lookup: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingEnv(key))
        };
        let access_key_id = required(ENV_ACCESS_KEY_ID)?;
        let secret_access_key = required(ENV_SECRET_ACCESS_KEY)?;
        let region = required(ENV_REGION)?;
        let session_token = lookup(ENV_SESSION_TOKEN).filter(|v| !v.is_empty());

        let config = Self::new(
            bucket,
            region,
            S3Credentials {
                access_key_id,
                secret_access_key,
                session_token,
            },
        );
        Ok(match endpoint_url {
            Some(url) => config.with_endpoint_url(url),
            None => config,
        })
    }
}
