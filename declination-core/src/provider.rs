use crate::{
    Config,
    model::{Declination, DeclinationRequest},
    provider::noaa::NoaaProvider,
};
use async_trait::async_trait;
use std::{fmt::Debug, time::Duration};

pub mod noaa;

/// Anything that can answer a single-point declination query.
///
/// Errors are reported as `anyhow::Error`; the batch executor keeps only
/// their rendered message.
#[async_trait]
pub trait DeclinationProvider: Send + Sync + Debug {
    async fn declination(&self, request: &DeclinationRequest) -> anyhow::Result<Declination>;
}

/// Construct the NOAA provider described by `config`.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn DeclinationProvider>> {
    if config.endpoint.trim().is_empty() {
        return Err(anyhow::anyhow!(
            "No endpoint configured.\n\
             Hint: run `declination configure` and enter the calculator URL."
        ));
    }

    let mut provider = NoaaProvider::new(&config.endpoint, &config.api_key, &config.model)
        .with_timeout(Duration::from_secs(config.timeout_secs))?;

    if let Some(fallback) = config.fallback_endpoint.as_deref().filter(|s| !s.trim().is_empty()) {
        provider = provider.with_fallback(fallback);
    }

    Ok(Box::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn provider_from_default_config() {
        let cfg = Config::default();
        assert!(provider_from_config(&cfg).is_ok());
    }

    #[test]
    fn provider_from_config_errors_without_endpoint() {
        let cfg = Config { endpoint: "  ".into(), ..Config::default() };
        let err = provider_from_config(&cfg).unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("No endpoint configured"));
        assert!(msg.contains("Hint: run `declination configure`"));
    }
}
