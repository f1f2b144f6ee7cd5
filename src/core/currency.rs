use ahash::AHashMap;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

fn default_refresh_interval() -> Duration {
    Duration::from_secs(1800)
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CurrencyConfig {
    /// Optional rates endpoint returning `{"rates": {"EUR": 0.92, ...}}`
    pub refresh_url: Option<String>,

    #[serde(default = "default_refresh_interval", with = "humantime_serde")]
    pub refresh_interval: Duration,

    /// Seed rates used at boot and whenever the endpoint is down,
    /// expressed as units per USD
    pub static_rates: HashMap<String, f64>,
}

/// One immutable snapshot of conversion rates, USD pivot
#[derive(Debug, Clone)]
pub struct CurrencyRates {
    rates: AHashMap<String, f64>,
}

impl CurrencyRates {
    pub fn new(rates: impl IntoIterator<Item = (String, f64)>) -> Self {
        let rates = rates
            .into_iter()
            .map(|(code, rate)| (code.to_ascii_uppercase(), rate))
            .filter(|(_, rate)| rate.is_finite() && *rate > 0.0)
            .collect();

        Self { rates }
    }

    fn per_usd(&self, code: &str) -> Option<f64> {
        let code = code.to_ascii_uppercase();
        if code == "USD" {
            return Some(1.0);
        }

        self.rates.get(&code).copied()
    }

    /// Convert an amount between currencies through the USD pivot.
    /// `None` when either code is unknown in this snapshot.
    pub fn convert(&self, amount: f64, from: &str, to: &str) -> Option<f64> {
        if from.eq_ignore_ascii_case(to) {
            return Some(amount);
        }

        let from_rate = self.per_usd(from)?;
        let to_rate = self.per_usd(to)?;

        Some(amount / from_rate * to_rate)
    }

    pub fn knows(&self, code: &str) -> bool {
        self.per_usd(code).is_some()
    }
}

#[derive(Debug, Deserialize)]
struct RatesPayload {
    rates: HashMap<String, f64>,
}

/// Holds the process-wide rate snapshot. Consumers grab one Arc per
/// request so a mid-auction refresh can never mix rates.
pub struct CurrencyConverter {
    snapshot: ArcSwap<CurrencyRates>,
    config: CurrencyConfig,
}

impl CurrencyConverter {
    pub fn new(config: CurrencyConfig) -> Self {
        let seed = CurrencyRates::new(config.static_rates.clone());

        Self {
            snapshot: ArcSwap::from_pointee(seed),
            config,
        }
    }

    pub fn snapshot(&self) -> Arc<CurrencyRates> {
        self.snapshot.load_full()
    }

    pub fn store(&self, rates: CurrencyRates) {
        self.snapshot.store(Arc::new(rates));
    }

    async fn refresh_once(&self, client: &reqwest::Client, url: &str) -> Result<usize, anyhow::Error> {
        let payload: RatesPayload = client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let count = payload.rates.len();
        self.store(CurrencyRates::new(payload.rates));

        Ok(count)
    }

    /// Periodic refresh loop; call from a spawned task at startup. A
    /// failed fetch keeps the previous snapshot.
    pub async fn refresh_loop(self: Arc<Self>, client: reqwest::Client) {
        let Some(url) = self.config.refresh_url.clone() else {
            debug!("No currency refresh URL configured, static rates only");
            return;
        };

        loop {
            // Spread refreshes across the fleet
            let jitter = Duration::from_millis(fastrand::u64(0..2000));
            tokio::time::sleep(self.config.refresh_interval + jitter).await;

            match self.refresh_once(&client, &url).await {
                Ok(count) => debug!("Refreshed {} currency rates", count),
                Err(e) => warn!("Currency refresh failed, keeping snapshot: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rates() -> CurrencyRates {
        CurrencyRates::new([("EUR".to_string(), 0.9), ("JPY".to_string(), 150.0)])
    }

    #[test]
    fn test_same_currency_identity() {
        assert_eq!(rates().convert(2.5, "USD", "usd"), Some(2.5));
        assert_eq!(rates().convert(2.5, "EUR", "EUR"), Some(2.5));
    }

    #[test]
    fn test_pivot_conversion() {
        let rates = rates();

        let usd = rates.convert(9.0, "EUR", "USD").unwrap();
        assert!((usd - 10.0).abs() < 1e-9);

        let jpy = rates.convert(1.0, "USD", "JPY").unwrap();
        assert!((jpy - 150.0).abs() < 1e-9);

        let eur_to_jpy = rates.convert(0.9, "EUR", "JPY").unwrap();
        assert!((eur_to_jpy - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_currency_is_none() {
        assert_eq!(rates().convert(1.0, "GBP", "USD"), None);
        assert!(!rates().knows("GBP"));
        assert!(rates().knows("usd"));
    }

    #[test]
    fn test_nonsense_rates_dropped() {
        let rates = CurrencyRates::new([
            ("EUR".to_string(), f64::NAN),
            ("JPY".to_string(), -5.0),
            ("CAD".to_string(), 1.35),
        ]);

        assert!(!rates.knows("EUR"));
        assert!(!rates.knows("JPY"));
        assert!(rates.knows("CAD"));
    }

    #[test]
    fn test_snapshot_isolated_from_store() {
        let converter = CurrencyConverter::new(CurrencyConfig {
            static_rates: HashMap::from([("EUR".to_string(), 0.9)]),
            ..Default::default()
        });

        let before = converter.snapshot();
        converter.store(CurrencyRates::new([("EUR".to_string(), 2.0)]));

        // The held snapshot still sees the old rate
        assert!((before.convert(0.9, "EUR", "USD").unwrap() - 1.0).abs() < 1e-9);
        assert!((converter.snapshot().convert(2.0, "EUR", "USD").unwrap() - 1.0).abs() < 1e-9);
    }
}
