use chrono::{Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::warn;

/// BIST-30 constituents offered on the dashboard and covered by the report.
pub const BIST30_SYMBOLS: &[&str] = &[
    "AKBNK.IS", "ASELS.IS", "BIMAS.IS", "ENKAI.IS", "EREGL.IS",
    "FROTO.IS", "GARAN.IS", "GUBRF.IS", "ISCTR.IS", "KCHOL.IS",
    "KOZAL.IS", "MGROS.IS", "PETKM.IS", "PGSUS.IS", "SAHOL.IS",
    "SASA.IS", "SISE.IS", "SKBNK.IS", "TAVHL.IS", "TCELL.IS",
    "THYAO.IS", "TOASO.IS", "TTKOM.IS", "TUPRS.IS", "ULKER.IS",
    "VAKBN.IS", "YKBNK.IS", "ASTOR.IS", "AEFES.IS", "KRDMD.IS",
];

/// Dashboard benchmark (BIST-30 index).
pub const BENCHMARK_SYMBOL: &str = "XU030.IS";

/// FX series shown next to the deposit rate.
pub const FX_SYMBOL: &str = "USDTRY=X";

/// Indices appended to the batch report's return table.
pub const REPORT_INDEX_SYMBOLS: &[&str] = &["XU100.IS", "XU030.IS"];

/// Assumed annual deposit rate shown as a reference card.
pub const DEPOSIT_RATE: f64 = 0.45;

pub const LOOKBACK_DAYS: i64 = 365;
pub const TOP_K: usize = 3;
pub const FIXTURE_SEED: u64 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    Yahoo,
    Fixture,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yahoo => "yahoo",
            Self::Fixture => "fixture",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "yahoo" | "yfinance" => Some(Self::Yahoo),
            "fixture" | "mock" | "offline" => Some(Self::Fixture),
            _ => None,
        }
    }
}

/// Everything the dashboard and report need to know about the market they
/// analyse. Passed explicitly; nothing here is global state.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub universe: Vec<String>,
    pub benchmark: String,
    pub fx: String,
    pub report_indices: Vec<String>,
    pub deposit_rate: f64,
    pub lookback_days: i64,
    pub top_k: usize,
    pub exchange_tz: Tz,
    pub provider: ProviderKind,
    pub fixture_seed: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            universe: BIST30_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            benchmark: BENCHMARK_SYMBOL.to_string(),
            fx: FX_SYMBOL.to_string(),
            report_indices: REPORT_INDEX_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            deposit_rate: DEPOSIT_RATE,
            lookback_days: LOOKBACK_DAYS,
            top_k: TOP_K,
            exchange_tz: chrono_tz::Europe::Istanbul,
            provider: ProviderKind::Yahoo,
            fixture_seed: FIXTURE_SEED,
        }
    }
}

impl AppConfig {
    /// Defaults overridden by `BIST_DATA_PROVIDER`, `BIST_LOOKBACK_DAYS` and
    /// `BIST_TOP_K`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("BIST_DATA_PROVIDER") {
            match ProviderKind::parse(&raw) {
                Some(kind) => config.provider = kind,
                None => warn!(
                    "Unknown BIST_DATA_PROVIDER={} ; defaulting to yahoo. Allowed values: yahoo | fixture",
                    raw
                ),
            }
        }

        if let Some(days) = lookup("BIST_LOOKBACK_DAYS").and_then(|v| v.trim().parse::<i64>().ok()) {
            config.lookback_days = days.clamp(2, 365 * 10);
        }

        if let Some(k) = lookup("BIST_TOP_K").and_then(|v| v.trim().parse::<usize>().ok()) {
            config.top_k = k.max(1);
        }

        config
    }

    /// Today's calendar date on the exchange.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.exchange_tz).date_naive()
    }

    /// `[today - lookback, today)`: the analysis window ending before today's
    /// unfinished session.
    pub fn analysis_window(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        (today - Duration::days(self.lookback_days), today)
    }

    pub fn is_known_symbol(&self, symbol: &str) -> bool {
        self.universe.iter().any(|s| s.eq_ignore_ascii_case(symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.universe.len(), 30);
        assert_eq!(config.benchmark, "XU030.IS");
        assert_eq!(config.top_k, 3);
        assert!((config.deposit_rate - 0.45).abs() < f64::EPSILON);
        assert!(config.is_known_symbol("thyao.is"));
        assert!(!config.is_known_symbol("AAPL"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("BIST_DATA_PROVIDER", "Fixture"),
            ("BIST_LOOKBACK_DAYS", "90"),
            ("BIST_TOP_K", "0"),
        ]);
        let config = AppConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.provider, ProviderKind::Fixture);
        assert_eq!(config.lookback_days, 90);
        assert_eq!(config.top_k, 1);
    }

    #[test]
    fn test_unknown_provider_keeps_default() {
        let config = AppConfig::from_lookup(|k| (k == "BIST_DATA_PROVIDER").then(|| "polygon".to_string()));
        assert_eq!(config.provider, ProviderKind::Yahoo);
    }

    #[test]
    fn test_analysis_window() {
        let config = AppConfig::default();
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let (start, end) = config.analysis_window(today);
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(end, today);
    }
}
