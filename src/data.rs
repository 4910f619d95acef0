use crate::config::{AppConfig, ProviderKind};
use crate::prices::PriceTable;
use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Why a price fetch produced nothing usable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("request for {symbol} failed: {reason}")]
    Http { symbol: String, reason: String },

    #[error("provider rejected {symbol}: {reason}")]
    Provider { symbol: String, reason: String },

    #[error("could not decode response for {symbol}: {reason}")]
    Decode { symbol: String, reason: String },

    #[error("no price data for {symbol} in range")]
    EmptyResult { symbol: String },

    #[error("all {count} symbols failed; last error: {last}")]
    AllSymbolsFailed { count: usize, last: String },
}

/// Instruments and the half-open date range `[start, end)` to fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    pub symbols: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FetchRequest {
    pub fn new<S: AsRef<str>>(symbols: &[S], start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            symbols: symbols.iter().map(|s| s.as_ref().trim().to_uppercase()).collect(),
            start,
            end,
        }
    }

    pub fn single(symbol: &str, start: NaiveDate, end: NaiveDate) -> Self {
        Self::new(&[symbol], start, end)
    }

    pub fn key(&self) -> FetchKey {
        let mut symbols = self.symbols.clone();
        symbols.sort();
        symbols.dedup();
        FetchKey {
            symbols,
            start: self.start,
            end: self.end,
        }
    }
}

/// Cache key: the instrument set (order-insensitive) and the date range.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FetchKey {
    symbols: Vec<String>,
    start: NaiveDate,
    end: NaiveDate,
}

/// Anything that can supply daily adjusted closes.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, request: &FetchRequest) -> Result<PriceTable, DataError>;
}

/// Runs a fetch and degrades any failure to an empty table.
pub async fn fetch_or_empty(provider: &dyn PriceProvider, request: &FetchRequest) -> PriceTable {
    match provider.fetch(request).await {
        Ok(table) => table,
        Err(e) => {
            warn!(
                "{} fetch for {:?} [{} .. {}) unavailable: {}",
                provider.name(),
                request.symbols,
                request.start,
                request.end,
                e
            );
            PriceTable::empty()
        }
    }
}

pub fn build_provider(config: &AppConfig) -> Box<dyn PriceProvider> {
    match config.provider {
        ProviderKind::Yahoo => Box::new(YahooProvider::new(config.exchange_tz)),
        ProviderKind::Fixture => Box::new(FixtureProvider::random_walk(config.fixture_seed)),
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Memoized fetch
// ──────────────────────────────────────────────────────────────────────────────

/// Memoizes fetch outcomes per (instrument set, start, end) for the life of the
/// process. Failures are memoized too, so an unavailable key is not re-fetched.
pub struct CachedProvider {
    inner: Box<dyn PriceProvider>,
    entries: Mutex<HashMap<FetchKey, Result<PriceTable, DataError>>>,
}

impl CachedProvider {
    pub fn new(inner: Box<dyn PriceProvider>) -> Self {
        Self {
            inner,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[async_trait]
impl PriceProvider for CachedProvider {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<PriceTable, DataError> {
        let key = request.key();
        if let Some(hit) = self.entries.lock().await.get(&key) {
            debug!("Price cache hit for {:?}", request.symbols);
            return hit.clone();
        }

        info!(
            "Price cache miss for {} symbols [{} .. {}), fetching from {}...",
            request.symbols.len(),
            request.start,
            request.end,
            self.inner.name()
        );
        // Unlocked while fetching; a concurrent fetch of the same key may
        // finish first, in which case its outcome is kept.
        let outcome = self.inner.fetch(request).await;
        self.entries.lock().await.entry(key).or_insert(outcome).clone()
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Yahoo Finance
// ──────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize, Serialize, Debug)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooChart {
    result: Option<Vec<YahooResult>>,
    error: Option<YahooChartError>,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: YahooIndicators,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooIndicators {
    #[serde(default)]
    quote: Vec<YahooQuote>,
    #[serde(default)]
    adjclose: Vec<YahooAdjClose>,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooAdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Daily bars from the Yahoo v8 chart endpoint, one request per symbol.
pub struct YahooProvider {
    client: reqwest::Client,
    base_url: String,
    tz: Tz,
}

impl YahooProvider {
    pub fn new(tz: Tz) -> Self {
        Self::with_base_url("https://query1.finance.yahoo.com", tz)
    }

    pub fn with_base_url(base_url: &str, tz: Tz) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, tz)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str, tz: Tz) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tz,
        }
    }

    fn midnight_timestamp(&self, date: NaiveDate) -> i64 {
        date.and_hms_opt(0, 0, 0)
            .and_then(|dt| self.tz.from_local_datetime(&dt).earliest())
            .map(|dt| dt.timestamp())
            .unwrap_or_else(|| date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc().timestamp())
    }

    async fn fetch_symbol(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, DataError> {
        let url = format!(
            "{}/v8/finance/chart/{}?period1={}&period2={}&interval=1d&events=history&includeAdjustedClose=true",
            self.base_url,
            symbol,
            self.midnight_timestamp(start),
            self.midnight_timestamp(end)
        );

        let http_err = |e: reqwest::Error| DataError::Http {
            symbol: symbol.to_string(),
            reason: e.to_string(),
        };

        let resp = self
            .client
            .get(&url)
            .header("User-Agent", "Mozilla/5.0")
            .timeout(std::time::Duration::from_secs(15))
            .send()
            .await
            .map_err(http_err)?;

        let status = resp.status();
        let body = resp.text().await.map_err(http_err)?;
        let parsed: YahooChartResponse = serde_json::from_str(&body).map_err(|e| {
            if status.is_success() {
                DataError::Decode {
                    symbol: symbol.to_string(),
                    reason: e.to_string(),
                }
            } else {
                DataError::Provider {
                    symbol: symbol.to_string(),
                    reason: format!("HTTP {}", status),
                }
            }
        })?;

        let points = parse_chart(symbol, parsed, self.tz)?;
        Ok(points
            .into_iter()
            .filter(|(date, _)| *date >= start && *date < end)
            .collect())
    }
}

/// Extracts (exchange-local date, adjusted close) pairs from a chart response.
/// Falls back to the raw close when no adjusted series is present.
fn parse_chart(symbol: &str, response: YahooChartResponse, tz: Tz) -> Result<Vec<(NaiveDate, f64)>, DataError> {
    if let Some(err) = response.chart.error {
        return Err(DataError::Provider {
            symbol: symbol.to_string(),
            reason: err
                .description
                .or(err.code)
                .unwrap_or_else(|| "unknown error".to_string()),
        });
    }

    let result = response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| DataError::EmptyResult {
            symbol: symbol.to_string(),
        })?;

    let YahooIndicators { quote, adjclose } = result.indicators;
    let closes = adjclose
        .into_iter()
        .next()
        .map(|a| a.adjclose)
        .filter(|a| a.iter().any(Option::is_some))
        .or_else(|| quote.into_iter().next().map(|q| q.close))
        .unwrap_or_default();

    let points: Vec<(NaiveDate, f64)> = result
        .timestamp
        .iter()
        .zip(closes)
        .filter_map(|(&ts, close)| {
            let close = close?;
            let date = Utc.timestamp_opt(ts, 0).single()?.with_timezone(&tz).date_naive();
            Some((date, close))
        })
        .collect();

    if points.is_empty() {
        return Err(DataError::EmptyResult {
            symbol: symbol.to_string(),
        });
    }
    Ok(points)
}

#[async_trait]
impl PriceProvider for YahooProvider {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    /// A symbol that fails contributes an all-missing column; the fetch only
    /// fails when every symbol does.
    async fn fetch(&self, request: &FetchRequest) -> Result<PriceTable, DataError> {
        let mut columns = Vec::with_capacity(request.symbols.len());
        let mut last_err: Option<DataError> = None;
        let mut failures = 0;

        for symbol in &request.symbols {
            match self.fetch_symbol(symbol, request.start, request.end).await {
                Ok(points) => {
                    info!("Fetched {} daily closes for {}", points.len(), symbol);
                    columns.push((symbol.clone(), points));
                }
                Err(e) => {
                    warn!("Yahoo fetch failed for {}: {}", symbol, e);
                    failures += 1;
                    last_err = Some(e);
                    columns.push((symbol.clone(), Vec::new()));
                }
            }
        }

        if failures > 0 && failures == request.symbols.len() {
            return Err(DataError::AllSymbolsFailed {
                count: failures,
                last: last_err.map(|e| e.to_string()).unwrap_or_default(),
            });
        }

        Ok(PriceTable::from_columns(columns))
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Fixtures
// ──────────────────────────────────────────────────────────────────────────────

enum FixtureSource {
    #[cfg(test)]
    Table(PriceTable),
    RandomWalk { seed: u64 },
}

/// Offline provider: generates a seeded random walk of weekday closes for any
/// symbol asked for. Tests can also serve a fixed table.
pub struct FixtureProvider {
    source: FixtureSource,
}

impl FixtureProvider {
    #[cfg(test)]
    pub fn new(table: PriceTable) -> Self {
        Self {
            source: FixtureSource::Table(table),
        }
    }

    pub fn random_walk(seed: u64) -> Self {
        Self {
            source: FixtureSource::RandomWalk { seed },
        }
    }
}

fn symbol_seed(seed: u64, symbol: &str) -> u64 {
    symbol
        .bytes()
        .fold(seed ^ 0xcbf2_9ce4_8422_2325, |h, b| (h ^ b as u64).wrapping_mul(0x0100_0000_01b3))
}

/// Weekday closes starting near 100 with ~2% daily noise.
pub fn mock_closes(symbol: &str, start: NaiveDate, end: NaiveDate, seed: u64) -> Vec<(NaiveDate, f64)> {
    let mut rng = StdRng::seed_from_u64(symbol_seed(seed, symbol));
    let Ok(noise) = Normal::new(0.0004, 0.02) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let mut price: f64 = 100.0;
    let mut date = start;
    while date < end {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            let step: f64 = noise.sample(&mut rng);
            price *= 1.0 + step.clamp(-0.09, 0.09);
            out.push((date, price));
        }
        date += Duration::days(1);
    }
    out
}

#[async_trait]
impl PriceProvider for FixtureProvider {
    fn name(&self) -> &'static str {
        "fixture"
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<PriceTable, DataError> {
        let table = match &self.source {
            #[cfg(test)]
            FixtureSource::Table(table) => table.select(request.symbols.as_slice()).window(request.start, request.end),
            FixtureSource::RandomWalk { seed } => PriceTable::from_columns(
                request
                    .symbols
                    .iter()
                    .map(|s| (s.clone(), mock_closes(s, request.start, request.end, *seed)))
                    .collect(),
            ),
        };

        if table.is_empty() {
            return Err(DataError::EmptyResult {
                symbol: request.symbols.join(","),
            });
        }
        Ok(table)
    }
}
