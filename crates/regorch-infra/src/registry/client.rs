//! HttpRegistryClient -- reqwest implementation of the registry ports.
//!
//! Implements [`ResourceApi`] for every [`ResourceKind`], so one client
//! value satisfies `ModelRegistry`. Requests carry `Accept:
//! application/json` and, when configured, a bearer or basic
//! `Authorization` header. Credentials are wrapped in [`SecretString`] and
//! only exposed while building that header.
//!
//! Error mapping:
//! - connect / timeout failures -> `RegistryError::{Connect, Timeout}`
//! - non-2xx -> `RegistryError::Status` with method, url and body (logged
//!   at `error`); a 404 on `get`/`find` reads as `None`
//! - undecodable 2xx bodies -> `RegistryError::Decode`

use std::time::Duration;

use base64::Engine;
use regorch_core::registry::{ResourceApi, ResourceKind};
use regorch_types::config::RegistryConfig;
use regorch_types::error::RegistryError;
use regorch_types::registry::{Lookup, ResourceList};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Method, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::ConfigError;

/// How requests authenticate against the registry.
pub enum RegistryAuth {
    None,
    Bearer(SecretString),
    Basic {
        username: String,
        password: SecretString,
    },
}

impl RegistryAuth {
    /// A token wins over username/password.
    pub fn from_config(config: &RegistryConfig) -> Self {
        if let Some(token) = config.token.as_deref().filter(|t| !t.trim().is_empty()) {
            return RegistryAuth::Bearer(SecretString::from(token.to_string()));
        }
        match config.username.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(username) => RegistryAuth::Basic {
                username: username.to_string(),
                password: SecretString::from(config.password.clone().unwrap_or_default()),
            },
            None => RegistryAuth::None,
        }
    }

    fn header_value(&self) -> Option<String> {
        match self {
            RegistryAuth::None => None,
            RegistryAuth::Bearer(token) => Some(format!("Bearer {}", token.expose_secret())),
            RegistryAuth::Basic { username, password } => {
                let raw = format!("{username}:{}", password.expose_secret());
                Some(format!(
                    "Basic {}",
                    base64::engine::general_purpose::STANDARD.encode(raw)
                ))
            }
        }
    }
}

/// Model registry REST client.
///
/// Does not derive Debug; the auth field holds credentials.
pub struct HttpRegistryClient {
    client: reqwest::Client,
    base_url: Url,
    auth: RegistryAuth,
}

impl HttpRegistryClient {
    /// Build a client from the `[registry]` config section.
    pub fn from_config(config: &RegistryConfig) -> Result<Self, ConfigError> {
        Self::new(&config.base_url, config.timeout(), RegistryAuth::from_config(config))
    }

    pub fn new(base_url: &str, timeout: Duration, auth: RegistryAuth) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url).map_err(|e| ConfigError::Invalid {
            field: "registry.base_url",
            message: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::Invalid {
                field: "registry.base_url",
                message: format!("'{base_url}' cannot carry a path"),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Invalid {
                field: "registry",
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url,
            auth,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL with `segments` appended, each percent-encoded.
    fn url(&self, segments: &[String]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<reqwest::Response, RegistryError> {
        let mut request = self
            .client
            .request(method, url)
            .header(ACCEPT, "application/json");
        if let Some(value) = self.auth.header_value() {
            request = request.header(AUTHORIZATION, value);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.map_err(transport_error)
    }

    /// Pass through 2xx responses; turn anything else into `Status`.
    async fn ensure_success(
        response: reqwest::Response,
        method: &Method,
    ) -> Result<reqwest::Response, RegistryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        tracing::error!(
            status = status.as_u16(),
            method = %method,
            url = %url,
            body = %body,
            "registry request failed"
        );
        Err(RegistryError::Status {
            status: status.as_u16(),
            method: method.to_string(),
            url,
            body,
        })
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RegistryError> {
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(transport_error)?;
        serde_json::from_slice(&bytes).map_err(|e| RegistryError::Decode {
            status,
            message: e.to_string(),
        })
    }

    async fn fetch_optional<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, RegistryError> {
        let response = self.send::<()>(Method::GET, url, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::ensure_success(response, &Method::GET).await?;
        Self::decode(response).await.map(Some)
    }
}

fn transport_error(e: reqwest::Error) -> RegistryError {
    if e.is_timeout() {
        RegistryError::Timeout(e.to_string())
    } else {
        RegistryError::Connect(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// ResourceApi impl
// ---------------------------------------------------------------------------

impl<K: ResourceKind> ResourceApi<K> for HttpRegistryClient {
    async fn create(&self, parent: &K::Parent, dto: &K::Create) -> Result<K::Resource, RegistryError> {
        let url = self.url(&K::collection_segments(parent));
        tracing::debug!(kind = K::NAME, url = %url, "registry create");
        let response = self.send(Method::POST, url, Some(dto)).await?;
        let response = Self::ensure_success(response, &Method::POST).await?;
        Self::decode(response).await
    }

    async fn get(&self, parent: &K::Parent, id: &str) -> Result<Option<K::Resource>, RegistryError> {
        let mut segments = K::collection_segments(parent);
        segments.push(id.to_string());
        self.fetch_optional(self.url(&segments)).await
    }

    async fn find(
        &self,
        parent: &K::Parent,
        lookup: &Lookup,
    ) -> Result<Option<K::Resource>, RegistryError> {
        let mut url = self.url(&K::collection_segments(parent));
        url.query_pairs_mut()
            .append_pair(lookup.param(), lookup.value())
            .append_pair("pageSize", "1");
        let list: Option<ResourceList<K::Resource>> = self.fetch_optional(url).await?;
        Ok(list.and_then(|l| l.items.into_iter().next()))
    }

    async fn update(
        &self,
        parent: &K::Parent,
        id: &str,
        patch: &K::Update,
    ) -> Result<K::Resource, RegistryError> {
        let mut segments = K::collection_segments(parent);
        segments.push(id.to_string());
        let url = self.url(&segments);
        let response = self.send(Method::PATCH, url, Some(patch)).await?;
        let response = Self::ensure_success(response, &Method::PATCH).await?;
        Self::decode(response).await
    }
}
