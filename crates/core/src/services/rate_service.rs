use log::warn;
use std::time::{Duration, Instant};

use crate::providers::traits::RateProvider;

/// How long a fetched rate stays fresh before the provider is asked again.
const CACHE_TTL: Duration = Duration::from_secs(300);

/// Display-rate lookup with a short-lived cache.
///
/// The rate is cosmetic: on provider failure the stale cached value is
/// served rather than nothing, and `None` only means no rate was ever
/// fetched for the requested pair. Nothing else depends on this service.
pub struct RateService {
    provider: Box<dyn RateProvider>,
    cached: Option<CachedRate>,
}

struct CachedRate {
    base: String,
    target: String,
    rate: f64,
    fetched_at: Instant,
}

impl RateService {
    pub fn new(provider: Box<dyn RateProvider>) -> Self {
        Self {
            provider,
            cached: None,
        }
    }

    /// Latest `base` → `target` rate, served from cache within the TTL.
    pub async fn display_rate(&mut self, base: &str, target: &str) -> Option<f64> {
        if let Some(cached) = &self.cached {
            if cached.base == base
                && cached.target == target
                && cached.fetched_at.elapsed() < CACHE_TTL
            {
                return Some(cached.rate);
            }
        }

        match self.provider.latest_rate(base, target).await {
            Ok(rate) => {
                self.cached = Some(CachedRate {
                    base: base.to_string(),
                    target: target.to_string(),
                    rate,
                    fetched_at: Instant::now(),
                });
                Some(rate)
            }
            Err(err) => {
                warn!("rate fetch failed ({}): {err}", self.provider.name());
                // A stale value for the same pair beats no value at all.
                self.cached
                    .as_ref()
                    .filter(|c| c.base == base && c.target == target)
                    .map(|c| c.rate)
            }
        }
    }
}
