use async_trait::async_trait;

use crate::errors::CoreError;

/// Trait abstraction for currency-rate providers.
///
/// The display rate is cosmetic, so implementations compete only on
/// availability; if an API stops working, we replace that one
/// implementation and the rest of the codebase is untouched.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Human-readable name of this provider (for logs/errors).
    fn name(&self) -> &str;

    /// Latest exchange rate from `base` to `target` (e.g. USD → THB).
    async fn latest_rate(&self, base: &str, target: &str) -> Result<f64, CoreError>;
}
