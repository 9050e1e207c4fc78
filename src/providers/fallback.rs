use alloy::{
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::client::RpcClient,
    transports::{
        http::{reqwest::Url, Http},
        layers::FallbackLayer,
    },
};
use eyre::{eyre, Result};
use std::num::NonZeroUsize;
use tower::ServiceBuilder;
use tracing::info;

/// Configuration for fallback provider
pub struct FallbackConfig {
    pub rpc_urls: Vec<String>,
    pub active_transport_count: usize,
}

impl FallbackConfig {
    pub fn new(rpc_urls: Vec<String>, active_transport_count: usize) -> Self {
        Self {
            rpc_urls,
            active_transport_count,
        }
    }

    pub fn with_active_count(mut self, count: usize) -> Self {
        self.active_transport_count = count;
        self
    }
}

/// Creates a type-erased provider that spreads requests over several RPC nodes
pub fn create_fallback_provider(config: FallbackConfig) -> Result<DynProvider> {
    if config.rpc_urls.is_empty() {
        return Err(eyre!("no rpc urls configured"));
    }

    let active = NonZeroUsize::new(config.active_transport_count.min(config.rpc_urls.len()))
        .ok_or_else(|| eyre!("active transport count must be positive"))?;
    let fallback_layer = FallbackLayer::default().with_active_transport_count(active);

    let transports = config
        .rpc_urls
        .iter()
        .map(|url| {
            Url::parse(url)
                .map(Http::new)
                .map_err(|e| eyre!("Invalid URL {}: {}", url, e))
        })
        .collect::<Result<Vec<Http<_>>>>()?;

    let transport = ServiceBuilder::new()
        .layer(fallback_layer)
        .service(transports);

    let client = RpcClient::builder().transport(transport, false);
    let provider = ProviderBuilder::new().connect_client(client).erased();

    info!(nodes = config.rpc_urls.len(), active = active.get(), "provider created");
    Ok(provider)
}
