//! HTTP client implementation of [`ProfileStore`](crate::dao::profile_store::ProfileStore).

use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method};
use serde::{Serialize, de::DeserializeOwned};

use crate::dao::{
    models::ProfileProgress,
    profile_store::ProfileStore,
    storage::{StorageError, StorageResult},
};

use super::{
    config::ProfileServiceConfig,
    error::{ProfileServiceError, ProfileServiceResult},
};

const HEALTH_PATH: &str = "health";

#[derive(Serialize)]
struct ExperienceCredit {
    experience: u32,
}

#[derive(Serialize)]
struct BadgeAward<'a> {
    badge: &'a str,
}

/// Profile store calling the remote profile service over HTTP.
#[derive(Clone)]
pub struct HttpProfileStore {
    client: Client,
    base_url: Arc<str>,
    api_key: Option<Arc<str>>,
}

impl HttpProfileStore {
    /// Build the HTTP client for the configured profile service.
    pub fn connect(config: ProfileServiceConfig) -> ProfileServiceResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| ProfileServiceError::ClientBuilder { source })?;

        Ok(Self {
            client,
            base_url: Arc::<str>::from(config.base_url.trim_end_matches('/')),
            api_key: config.api_key.map(Arc::<str>::from),
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        let builder = self.client.request(method, url);
        match self.api_key {
            Some(ref key) => builder.bearer_auth(key.as_ref()),
            None => builder,
        }
    }

    async fn post<B, T>(&self, path: String, body: &B) -> ProfileServiceResult<Option<T>>
    where
        B: ?Sized + Serialize,
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::POST, &path)
            .json(body)
            .send()
            .await
            .map_err(|source| ProfileServiceError::RequestSend {
                path: path.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProfileServiceError::RequestStatus { path, status });
        }
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }

        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|source| ProfileServiceError::DecodeResponse { path, source })
    }
}

impl ProfileStore for HttpProfileStore {
    fn credit_experience(
        &self,
        player_id: &str,
        experience: u32,
    ) -> BoxFuture<'static, StorageResult<ProfileProgress>> {
        let store = self.clone();
        let path = format!("profiles/{player_id}/experience");
        Box::pin(async move {
            let progress = store
                .post::<_, ProfileProgress>(path.clone(), &ExperienceCredit { experience })
                .await?;
            progress.ok_or_else(|| StorageError::rejected(format!("{path} returned no progress")))
        })
    }

    fn award_badge(&self, player_id: &str, badge: &str) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let path = format!("profiles/{player_id}/badges");
        let badge = badge.to_string();
        Box::pin(async move {
            store
                .post::<_, serde_json::Value>(path, &BadgeAward { badge: &badge })
                .await?;
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let response = store
                .request(Method::GET, HEALTH_PATH)
                .send()
                .await
                .map_err(|source| ProfileServiceError::RequestSend {
                    path: HEALTH_PATH.to_string(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(ProfileServiceError::RequestStatus {
                    path: HEALTH_PATH.to_string(),
                    status: response.status(),
                }
                .into())
            }
        })
    }
}
