//! Connection settings for the remote profile service.

use super::error::{ProfileServiceError, ProfileServiceResult};

/// Runtime configuration describing how to reach the profile service.
#[derive(Debug, Clone)]
pub struct ProfileServiceConfig {
    /// Root URL of the service.
    pub base_url: String,
    /// Bearer key, when the service requires one.
    pub api_key: Option<String>,
}

impl ProfileServiceConfig {
    /// Construct a configuration from an explicit base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
        }
    }

    /// Attach the bearer key sent with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Build a configuration by reading the expected environment variables.
    pub fn from_env() -> ProfileServiceResult<Self> {
        let base_url = std::env::var("PROFILE_STORE_URL").map_err(|_| {
            ProfileServiceError::MissingEnvVar {
                var: "PROFILE_STORE_URL",
            }
        })?;

        let mut config = Self::new(base_url);
        if let Ok(api_key) = std::env::var("PROFILE_STORE_API_KEY") {
            config = config.with_api_key(api_key);
        }

        Ok(config)
    }
}
