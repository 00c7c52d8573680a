use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::providers::{ChangeNowProvider, ExolixProvider, ProviderKind, SimpleSwapProvider, SwapProvider};

/// Builds the enabled providers, primary first. Exolix loads its network
/// catalogue here and never fails; a missing catalogue falls back to defaults.
pub async fn build_providers(config: &Config) -> anyhow::Result<Vec<Arc<dyn SwapProvider>>> {
    let mut providers: Vec<Arc<dyn SwapProvider>> = Vec::new();

    for kind in config.enabled_providers() {
        let settings = config
            .providers
            .get(&kind)
            .ok_or_else(|| anyhow::anyhow!("{} has no settings", kind.as_str()))?;
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("{} is selected but its API key is not set", kind.as_str()))?;
        let base_url = settings.base_url.clone();

        let provider: Arc<dyn SwapProvider> = match kind {
            ProviderKind::ChangeNow => Arc::new(ChangeNowProvider::new(base_url, api_key, &config.http)),
            ProviderKind::SimpleSwap => Arc::new(SimpleSwapProvider::new(base_url, api_key, &config.http)),
            ProviderKind::Exolix => Arc::new(ExolixProvider::connect(base_url, api_key, &config.http).await),
        };
        info!(provider = provider.name(), base_url = %settings.base_url, "Swap provider initialized");
        providers.push(provider);
    }

    Ok(providers)
}
