use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{Config, ConfigError, Serial};
use crate::datasource::{repository, Store};
use crate::errors::Result;
use crate::jobs::download::DownloadSettings;
use crate::media::{MediaFetcher, YtDlp};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared handles of a running poller, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub client: youtube::Client,
    pub fetcher: Arc<dyn MediaFetcher>,
    pub serials: Arc<[Serial]>,
    pub download: DownloadSettings,
    pub default_lookback: chrono::Duration,
    pub cancel: CancellationToken,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("store", &self.store)
            .field("client", &self.client)
            .field("serials", &self.serials)
            .field("download", &self.download)
            .field("default_lookback", &self.default_lookback)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wire up the store, the catalog client and the media fetcher from `config`.
    pub async fn new(config: &Config, serials: Vec<Serial>) -> Result<Self> {
        let store = Store::open(&config.database).await?;
        let auth = authorization(config, &store).await?;
        let client = youtube::Client::new(auth, create_reqwest_client()?);
        Ok(Self {
            store,
            client,
            fetcher: Arc::new(YtDlp::new(&config.ytdlp, &config.format)),
            serials: serials.into(),
            download: DownloadSettings {
                download_dir: config.download_dir.clone(),
                debug: config.debug,
            },
            default_lookback: config.default_lookback(),
            cancel: CancellationToken::new(),
        })
    }
}

/// An API key from the environment wins over a stored OAuth token.
pub async fn authorization(config: &Config, store: &Store) -> Result<youtube::Authorization> {
    if let Some(key) = config.api_key.as_ref().filter(|k| !k.is_empty()) {
        info!("using api key");
        return Ok(youtube::Authorization::ApiKey(key.clone()));
    }
    match repository::settings::get_token(store.pool()).await? {
        Some(token) => {
            if token.is_expired(chrono::Utc::now()) {
                warn!("stored token has expired, requests will be rejected until it is replaced");
            }
            info!("using stored token");
            Ok(youtube::Authorization::Bearer(token.access_token))
        }
        None => Err(ConfigError::MissingCredentials.into()),
    }
}

pub fn create_reqwest_client() -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(youtube::Error::from)?;
    Ok(client)
}
