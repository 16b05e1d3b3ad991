//! Provider construction from explicit parameters or engine settings

use crate::error::{BuildError, BuildResult};
use crate::http::HttpApi;
use crate::netease::NeteaseProvider;
use crate::retry::RetryPolicy;
use crate::youtube::YouTubeProvider;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tfconfig::EngineSettings;
use tfsource::{MusicProvider, Platform};
use tracing::{info, warn};

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = concat!("TuneFuse/", env!("CARGO_PKG_VERSION"));

/// Builder for one provider client
///
/// ```no_run
/// use tfprovider::ProviderBuilder;
/// use tfsource::Platform;
///
/// let provider = ProviderBuilder::new(Platform::Netease)
///     .id("netease-mirror")
///     .base_url("https://mirror.example.com")
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ProviderBuilder {
    client: Option<Client>,
    id: Option<String>,
    platform: Platform,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
    user_agent: String,
    search_max_pages: usize,
    search_budget: Option<Duration>,
}

impl ProviderBuilder {
    pub fn new(platform: Platform) -> Self {
        Self {
            client: None,
            id: None,
            platform,
            base_url: String::new(),
            timeout: Duration::from_millis(tfconfig::engine::DEFAULT_PROVIDER_TIMEOUT_MS),
            retry: RetryPolicy::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            search_max_pages: tfconfig::engine::DEFAULT_SEARCH_MAX_PAGES,
            search_budget: None,
        }
    }

    /// Share an HTTP client (and its connection pool) between providers
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Provider id, defaults to the platform tag
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Ignored when a shared client is given
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Page cap for NetEase searches
    pub fn search_max_pages(mut self, pages: usize) -> Self {
        self.search_max_pages = pages;
        self
    }

    /// Time a NetEase search may spend paging, defaults to the request
    /// timeout. Pages gathered when it runs out are still returned.
    pub fn search_budget(mut self, budget: Duration) -> Self {
        self.search_budget = Some(budget);
        self
    }

    fn into_parts(self) -> BuildResult<(String, Platform, HttpApi, usize)> {
        let id = self.id.unwrap_or_else(|| self.platform.to_string());

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(BuildError::InvalidBaseUrl {
                endpoint: id,
                url: self.base_url,
            });
        }

        let client = match self.client {
            Some(client) => client,
            None => Client::builder().user_agent(&self.user_agent).build()?,
        };

        let api = HttpApi::new(client, &self.base_url, self.timeout, self.retry);
        Ok((id, self.platform, api, self.search_max_pages))
    }

    pub fn build_netease(self) -> BuildResult<NeteaseProvider> {
        let search_budget = self.search_budget.unwrap_or(self.timeout);
        let (id, _, api, search_max_pages) = self.into_parts()?;
        Ok(NeteaseProvider::new(id, api, search_max_pages, search_budget))
    }

    pub fn build_youtube(self) -> BuildResult<YouTubeProvider> {
        let (id, platform, api, _) = self.into_parts()?;
        Ok(YouTubeProvider::new(id, platform, api))
    }

    /// Builds the client matching the platform
    ///
    /// NetEase endpoints get a [`NeteaseProvider`]; YouTube and Kugou
    /// endpoints are served by the YouTube-style proxy client.
    pub fn build(self) -> BuildResult<Arc<dyn MusicProvider>> {
        Ok(match self.platform {
            Platform::Netease => Arc::new(self.build_netease()?),
            Platform::YouTube | Platform::Kugou => Arc::new(self.build_youtube()?),
        })
    }
}

/// Turns the configured endpoints into provider handles, in configuration
/// order
///
/// Endpoints with an unknown platform or a bad base URL are skipped with a
/// warning; only a failure to create the shared HTTP client is fatal.
pub fn build_providers(settings: &EngineSettings) -> BuildResult<Vec<Arc<dyn MusicProvider>>> {
    let client = Client::builder().user_agent(DEFAULT_USER_AGENT).build()?;
    let retry = RetryPolicy::from_settings(settings);
    let mut providers = Vec::with_capacity(settings.provider_endpoints.len());

    for endpoint in &settings.provider_endpoints {
        let platform = match endpoint.platform.parse::<Platform>() {
            Ok(platform) => platform,
            Err(_) => {
                warn!(
                    provider = %endpoint.name,
                    "{}",
                    BuildError::UnknownPlatform {
                        endpoint: endpoint.name.clone(),
                        platform: endpoint.platform.clone(),
                    }
                );
                continue;
            }
        };

        let built = ProviderBuilder::new(platform)
            .client(client.clone())
            .id(endpoint.name.clone())
            .base_url(endpoint.baseurl.clone())
            .timeout(settings.timeout_for(endpoint))
            .retry(retry)
            .search_max_pages(settings.search_max_pages)
            .build();

        match built {
            Ok(provider) => {
                info!(
                    provider = %endpoint.name,
                    platform = %platform,
                    "registered provider {}",
                    endpoint.baseurl
                );
                providers.push(provider);
            }
            Err(e) => warn!(provider = %endpoint.name, "skipping endpoint: {}", e),
        }
    }

    Ok(providers)
}
