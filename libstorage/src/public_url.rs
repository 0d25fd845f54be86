//! Public URLs for stored blobs, for deployments that serve the storage
//! root or bucket over HTTP.

use crate::error::ConfigError;
use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PublicUrlConfig {
    pub base_url: String,
    /// Prefix between the base URL and the blob path.
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicUrl {
    base: Url,
    location: Vec<String>,
}

impl PublicUrl {
    pub fn new(base_url: &str, location: &str) -> Result<Self, ConfigError> {
        let base = Url::parse(base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(ConfigError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "cannot be a base".to_string(),
            });
        }
        Ok(Self {
            base,
            location: segments(location).map(str::to_string).collect(),
        })
    }

    pub fn from_config(config: &PublicUrlConfig) -> Result<Self, ConfigError> {
        Self::new(&config.base_url, &config.location)
    }

    /// `base_url/location/path`, with each segment percent-encoded.
    pub fn url_for(&self, path: &str) -> String {
        let mut url = self.base.clone();
        if let Ok(mut parts) = url.path_segments_mut() {
            parts
                .pop_if_empty()
                .extend(&self.location)
                .extend(segments(path));
        }
        url.into()
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
