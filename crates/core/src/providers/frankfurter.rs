use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::errors::CoreError;

use super::traits::RateProvider;

const BASE_URL: &str = "https://api.frankfurter.dev/v1";

/// Frankfurter API provider for fiat currency exchange rates.
///
/// - **Free**: No API key, no rate limits, open-source.
/// - **Source**: European Central Bank (ECB) data.
/// - **Coverage**: ~30+ currencies (EUR, USD, THB, GBP, JPY, etc.)
pub struct FrankfurterProvider {
    client: Client,
}

impl FrankfurterProvider {
    pub fn new() -> Self {
        let builder = Client::builder().timeout(Duration::from_secs(30));
        Self {
            client: builder.build().unwrap_or_else(|_| Client::new()),
        }
    }
}

impl Default for FrankfurterProvider {
    fn default() -> Self {
        Self::new()
    }
}

// ── Frankfurter API response types ──────────────────────────────────

#[derive(Deserialize)]
struct RatesResponse {
    rates: HashMap<String, f64>,
}

#[async_trait]
impl RateProvider for FrankfurterProvider {
    fn name(&self) -> &str {
        "Frankfurter"
    }

    async fn latest_rate(&self, base: &str, target: &str) -> Result<f64, CoreError> {
        let base = base.to_uppercase();
        let target = target.to_uppercase();

        // Same currency → rate is 1.0
        if base == target {
            return Ok(1.0);
        }

        let url = format!("{BASE_URL}/latest?base={base}&symbols={target}");

        let resp: RatesResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: "Frankfurter".into(),
                message: format!("Failed to parse response for {base}/{target}: {e}"),
            })?;

        resp.rates
            .get(&target)
            .copied()
            .ok_or_else(|| CoreError::Api {
                provider: "Frankfurter".into(),
                message: format!("No rate found for {base} -> {target}"),
            })
    }
}
