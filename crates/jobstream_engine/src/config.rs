use jobstream_core::JobId;
use jobstream_logging::stream_info;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::OnceCell;
use url::Url;

use crate::rest::{send_json, ApiError, ClientSettings};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("runtime configuration has not been loaded yet")]
    NotReady,
    #[error("invalid url in runtime configuration: {0}")]
    InvalidUrl(String),
    #[error("failed to fetch runtime configuration: {0}")]
    Fetch(#[from] ApiError),
}

/// Runtime configuration document served at `/api/config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Origin of the REST API (`/api/v1/...` is appended).
    pub api_url: String,
    /// Origin of the realtime endpoints (`/ws/jobs/{id}` is appended).
    pub ws_url: String,
    /// Path prefix the console is mounted under.
    #[serde(default)]
    pub base_path: String,
}

impl RuntimeConfig {
    /// Builds an already-resolved configuration, e.g. from command-line flags.
    pub fn from_parts(
        api_url: impl Into<String>,
        ws_url: impl Into<String>,
        base_path: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            api_url: api_url.into(),
            ws_url: ws_url.into(),
            base_path: base_path.into(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let api = parse_base(&self.api_url)?;
        if !matches!(api.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(self.api_url.clone()));
        }
        self.realtime_base().map(drop)
    }

    /// `<ws_url>/ws/jobs/<job_id>`, with `http(s)` origins mapped to `ws(s)`.
    pub fn job_stream_url(&self, job_id: &JobId) -> Result<Url, ConfigError> {
        let mut url = self.realtime_base()?;
        url.path_segments_mut()
            .map_err(|_| ConfigError::InvalidUrl(self.ws_url.clone()))?
            .pop_if_empty()
            .extend(["ws", "jobs", job_id.as_str()]);
        Ok(url)
    }

    fn realtime_base(&self) -> Result<Url, ConfigError> {
        let mut url = parse_base(&self.ws_url)?;
        let scheme = match url.scheme() {
            "ws" | "wss" => None,
            "http" => Some("ws"),
            "https" => Some("wss"),
            _ => return Err(ConfigError::InvalidUrl(self.ws_url.clone())),
        };
        if let Some(scheme) = scheme {
            url.set_scheme(scheme)
                .map_err(|_| ConfigError::InvalidUrl(self.ws_url.clone()))?;
        }
        Ok(url)
    }
}

fn parse_base(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|err| ConfigError::InvalidUrl(format!("{raw}: {err}")))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidUrl(raw.to_string()));
    }
    Ok(url)
}

/// Fetches the runtime configuration once per process and caches it.
#[derive(Debug)]
pub struct ConfigResolver {
    // `None` for preloaded resolvers.
    source: Option<ConfigSource>,
    cell: OnceCell<RuntimeConfig>,
}

#[derive(Debug)]
struct ConfigSource {
    config_url: Url,
    http: reqwest::Client,
}

impl ConfigResolver {
    /// `origin` is where the console is served; the document lives at
    /// `{origin}/api/config`.
    pub fn new(origin: &str, settings: &ClientSettings) -> Result<Self, ConfigError> {
        let mut config_url = parse_base(origin)?;
        config_url
            .path_segments_mut()
            .map_err(|_| ConfigError::InvalidUrl(origin.to_string()))?
            .pop_if_empty()
            .extend(["api", "config"]);
        Ok(Self {
            source: Some(ConfigSource {
                config_url,
                http: settings.build_http()?,
            }),
            cell: OnceCell::new(),
        })
    }

    /// A resolver whose document is already known. Never touches the network.
    pub fn preloaded(config: RuntimeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            source: None,
            cell: OnceCell::new_with(Some(config)),
        })
    }

    pub async fn resolve(&self) -> Result<&RuntimeConfig, ConfigError> {
        self.cell.get_or_try_init(|| self.fetch()).await
    }

    /// The cached document, or `ConfigError::NotReady` before [`Self::resolve`] succeeded.
    pub fn current(&self) -> Result<&RuntimeConfig, ConfigError> {
        self.cell.get().ok_or(ConfigError::NotReady)
    }

    async fn fetch(&self) -> Result<RuntimeConfig, ConfigError> {
        let Some(source) = &self.source else {
            return Err(ConfigError::NotReady);
        };
        let config: RuntimeConfig =
            send_json(source.http.get(source.config_url.clone())).await?;
        config.validate()?;
        stream_info!(
            "Resolved runtime config api_url={} ws_url={} base_path={:?}",
            config.api_url,
            config.ws_url,
            config.base_path
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_maps_http_origin_to_ws() {
        let config =
            RuntimeConfig::from_parts("https://gw.test", "https://gw.test/realtime", "").unwrap();
        let url = config.job_stream_url(&JobId::new("abc").unwrap()).unwrap();
        assert_eq!(url.as_str(), "wss://gw.test/realtime/ws/jobs/abc");
    }

    #[test]
    fn stream_url_keeps_ws_origin_and_encodes_id() {
        let config = RuntimeConfig::from_parts("http://gw.test", "ws://gw.test:8000/", "").unwrap();
        let url = config.job_stream_url(&JobId::new("a/b").unwrap()).unwrap();
        assert_eq!(url.as_str(), "ws://gw.test:8000/ws/jobs/a%2Fb");
    }

    #[tokio::test]
    async fn preloaded_resolver_accepts_api_url_with_path() {
        let config =
            RuntimeConfig::from_parts("https://gw.test/gateway/v2", "wss://rt.gw.test", "/console")
                .unwrap();
        let resolver = ConfigResolver::preloaded(config.clone()).unwrap();
        assert!(resolver.source.is_none());
        assert_eq!(resolver.current().unwrap(), &config);
        assert_eq!(resolver.resolve().await.unwrap(), &config);
    }

    #[test]
    fn rejects_unusable_urls() {
        assert!(matches!(
            RuntimeConfig::from_parts("gw.test", "ws://gw.test", ""),
            Err(ConfigError::InvalidUrl(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_parts("http://gw.test", "ftp://gw.test", ""),
            Err(ConfigError::InvalidUrl(_))
        ));
    }
}
