use std::collections::HashMap;

use anyhow::Result;

/// Upstream source of latest exchange rates.
///
/// Returned values follow the upstream convention: `1 base = value units`.
#[async_trait::async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_latest(&self, base: &str, quotes: &[String]) -> Result<HashMap<String, f64>>;

    /// Source name for logging.
    fn name(&self) -> &str;
}

/// A source that never returns any rates. Used when running offline.
#[derive(Debug, Clone, Default)]
pub struct NoopRateSource;

#[async_trait::async_trait]
impl RateSource for NoopRateSource {
    async fn fetch_latest(&self, _base: &str, _quotes: &[String]) -> Result<HashMap<String, f64>> {
        Ok(HashMap::new())
    }

    fn name(&self) -> &str {
        "noop"
    }
}
