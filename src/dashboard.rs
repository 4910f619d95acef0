use crate::config::AppConfig;
use crate::data::{FetchRequest, PriceProvider, fetch_or_empty};
use crate::engine::{
    CumulativeMode, compounded_return, compounded_returns_by_column, cumulative_return,
    daily_returns, equal_weight_aggregate, growth_index, rank_top_k, rebase,
};
use crate::prices::{PriceTable, Series};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// One date on the comparison chart. Values are growth of 100 invested at the
/// window start; `None` where a series has no observation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartRow {
    pub date: NaiveDate,
    pub selected: Option<f64>,
    pub top_k: Option<f64>,
    pub benchmark: Option<f64>,
}

/// The four summary cards. Returns are fractions (0.12 = 12%).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricCards {
    pub selected_return: Option<f64>,
    pub top_k_return: Option<f64>,
    /// Top-K return minus the selection's.
    pub top_k_delta: Option<f64>,
    pub benchmark_return: Option<f64>,
    /// Selection's return minus the benchmark's.
    pub benchmark_delta: Option<f64>,
    pub fx_return: Option<f64>,
    pub deposit_rate: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub selected: Vec<String>,
    pub top_k: Vec<String>,
    pub benchmark: String,
    pub fx: String,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub chart: Vec<ChartRow>,
    pub metrics: MetricCards,
}

impl DashboardSnapshot {
    pub fn has_data(&self) -> bool {
        !self.chart.is_empty()
    }
}

/// Upper-cases, de-duplicates and keeps only universe members, preserving the
/// user's order.
pub fn normalize_selection<S: AsRef<str>>(config: &AppConfig, selection: &[S]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for raw in selection {
        let symbol = raw.as_ref().trim().to_uppercase();
        if symbol.is_empty() {
            continue;
        }
        if !config.is_known_symbol(&symbol) {
            warn!("{} is not in the universe; ignored", symbol);
            continue;
        }
        if seen.insert(symbol.clone()) {
            out.push(symbol);
        }
    }
    out
}

fn scaled(series: &Series, date: NaiveDate) -> Option<f64> {
    series.get(date).map(|v| v * 100.0)
}

fn delta(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(a? - b?)
}

/// Price-ratio return of one instrument over its present closes.
fn single_return(prices: &PriceTable, symbol: &str) -> Option<f64> {
    let closes: Vec<f64> = prices.column(symbol)?.into_iter().flatten().collect();
    cumulative_return(&closes, CumulativeMode::PriceRatio)
}

/// Builds the dashboard for a selection. `None` when nothing valid is selected;
/// unavailable data shows up as empty chart rows and `None` metrics.
pub async fn analyze_selection<S: AsRef<str>>(
    provider: &dyn PriceProvider,
    config: &AppConfig,
    selection: &[S],
    today: NaiveDate,
) -> Option<DashboardSnapshot> {
    let selected = normalize_selection(config, selection);
    if selected.is_empty() {
        return None;
    }

    let (start, end) = config.analysis_window(today);
    info!("Analyzing {:?} over [{} .. {})", selected, start, end);

    let prices = fetch_or_empty(provider, &FetchRequest::new(selected.as_slice(), start, end)).await;
    let universe_prices =
        fetch_or_empty(provider, &FetchRequest::new(config.universe.as_slice(), start, end)).await;
    let benchmark_prices = fetch_or_empty(provider, &FetchRequest::single(&config.benchmark, start, end)).await;
    let fx_prices = fetch_or_empty(provider, &FetchRequest::single(&config.fx, start, end)).await;

    let portfolio_daily = equal_weight_aggregate(&daily_returns(&prices), selected.as_slice());
    let selected_return = cumulative_return(&portfolio_daily.values(), CumulativeMode::Compounded);

    let universe_returns = daily_returns(&universe_prices);
    let top_k = rank_top_k(&compounded_returns_by_column(&universe_returns), config.top_k);
    let top_k_daily = if top_k.is_empty() {
        Series::default()
    } else {
        equal_weight_aggregate(&universe_returns, top_k.as_slice())
    };
    let top_k_return = compounded_return(&top_k_daily.values());

    let benchmark_return = single_return(&benchmark_prices, &config.benchmark);
    let fx_return = single_return(&fx_prices, &config.fx);

    let selected_curve = growth_index(&portfolio_daily);
    let top_k_curve = growth_index(&top_k_daily);
    let benchmark_curve = rebase(&benchmark_prices, &config.benchmark);

    let dates: BTreeSet<NaiveDate> = selected_curve
        .points
        .iter()
        .chain(&top_k_curve.points)
        .chain(&benchmark_curve.points)
        .map(|(d, _)| *d)
        .collect();

    let chart = dates
        .into_iter()
        .map(|date| ChartRow {
            date,
            selected: scaled(&selected_curve, date),
            top_k: scaled(&top_k_curve, date),
            benchmark: scaled(&benchmark_curve, date),
        })
        .collect();

    Some(DashboardSnapshot {
        selected,
        top_k,
        benchmark: config.benchmark.clone(),
        fx: config.fx.clone(),
        window_start: start,
        window_end: end,
        chart,
        metrics: MetricCards {
            selected_return,
            top_k_return,
            top_k_delta: delta(top_k_return, selected_return),
            benchmark_return,
            benchmark_delta: delta(selected_return, benchmark_return),
            fx_return,
            deposit_rate: config.deposit_rate,
        },
    })
}

/// "% 12.34" for a fraction of 0.1234; "% -" when undefined.
pub fn format_pct(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("% {:.2}", v * 100.0),
        _ => "% -".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FixtureProvider;
    use crate::prices::PriceTable;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn config() -> AppConfig {
        AppConfig {
            universe: vec!["AAA.IS".into(), "BBB.IS".into(), "CCC.IS".into(), "DDD.IS".into()],
            benchmark: "XU030.IS".into(),
            fx: "USDTRY=X".into(),
            top_k: 2,
            lookback_days: 30,
            ..AppConfig::default()
        }
    }

    fn series(prices: &[f64]) -> Vec<(NaiveDate, f64)> {
        prices.iter().enumerate().map(|(i, p)| (d(i as u32 + 3), *p)).collect()
    }

    fn fixture() -> FixtureProvider {
        FixtureProvider::new(PriceTable::from_columns(vec![
            ("AAA.IS".into(), series(&[100.0, 110.0, 121.0])),
            ("BBB.IS".into(), series(&[200.0, 190.0, 209.0])),
            ("CCC.IS".into(), series(&[50.0, 60.0, 66.0])),
            ("DDD.IS".into(), series(&[10.0, 9.0, 8.0])),
            ("XU030.IS".into(), series(&[1000.0, 1050.0, 1100.0])),
            ("USDTRY=X".into(), series(&[32.0, 32.5, 33.6])),
        ]))
    }

    fn close(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|a| (a - b).abs() < 1e-9)
    }

    #[tokio::test]
    async fn test_snapshot_metrics() {
        let provider = fixture();
        let snap = analyze_selection(&provider, &config(), &["aaa.is", "BBB.IS"], d(20))
            .await
            .unwrap();

        assert_eq!(snap.selected, vec!["AAA.IS", "BBB.IS"]);
        assert_eq!(snap.top_k, vec!["CCC.IS", "AAA.IS"]);

        let m = &snap.metrics;
        // mean daily returns 0.025 and 0.10
        assert!(close(m.selected_return, 1.025 * 1.1 - 1.0));
        // CCC: 0.2, 0.1; AAA: 0.1, 0.1
        assert!(close(m.top_k_return, 1.15 * 1.1 - 1.0));
        assert!(close(m.top_k_delta, (1.15 * 1.1) - (1.025 * 1.1)));
        assert!(close(m.benchmark_return, 0.1));
        assert!(close(m.benchmark_delta, 1.025 * 1.1 - 1.0 - 0.1));
        assert!(close(m.fx_return, 0.05));
        assert_eq!(m.deposit_rate, 0.45);
    }

    #[tokio::test]
    async fn test_chart_rows_start_benchmark_at_100() {
        let provider = fixture();
        let snap = analyze_selection(&provider, &config(), &["AAA.IS"], d(20)).await.unwrap();

        assert_eq!(snap.chart.len(), 3);
        let first = &snap.chart[0];
        assert_eq!(first.date, d(3));
        assert_eq!(first.benchmark, Some(100.0));
        assert_eq!(first.selected, None);

        let last = snap.chart.last().unwrap();
        assert!(close(last.selected, 121.0));
        assert!(close(last.benchmark, 110.0));
    }

    #[tokio::test]
    async fn test_empty_or_unknown_selection_is_rejected() {
        let provider = fixture();
        let none: [&str; 0] = [];
        assert!(analyze_selection(&provider, &config(), &none, d(20)).await.is_none());
        assert!(analyze_selection(&provider, &config(), &["AAPL"], d(20)).await.is_none());
    }

    #[tokio::test]
    async fn test_top_k_ignores_symbols_without_returns() {
        let mut config = config();
        config.top_k = 3;
        let provider = FixtureProvider::new(PriceTable::from_columns(vec![
            ("AAA.IS".into(), series(&[100.0, 110.0, 121.0])),
            ("BBB.IS".into(), series(&[200.0, 190.0, 209.0])),
            ("CCC.IS".into(), series(&[50.0, 60.0, 66.0])),
            ("XU030.IS".into(), series(&[1000.0, 1050.0, 1100.0])),
        ]));

        // DDD.IS has no prices, so the universe has no complete return row
        let snap = analyze_selection(&provider, &config, &["AAA.IS"], d(20)).await.unwrap();
        assert!(snap.top_k.is_empty());
        assert_eq!(snap.metrics.top_k_return, None);
        assert_eq!(snap.metrics.top_k_delta, None);
        assert!(close(snap.metrics.selected_return, 0.21));
        assert!(close(snap.metrics.benchmark_return, 0.1));
    }

    #[tokio::test]
    async fn test_unavailable_data_renders_blank() {
        let provider = FixtureProvider::new(PriceTable::empty());
        let snap = analyze_selection(&provider, &config(), &["AAA.IS"], d(20)).await.unwrap();
        assert!(!snap.has_data());
        assert!(snap.top_k.is_empty());
        assert_eq!(snap.metrics.selected_return, None);
        assert_eq!(snap.metrics.benchmark_delta, None);
        assert_eq!(snap.metrics.fx_return, None);
    }

    #[test]
    fn test_format_pct() {
        assert_eq!(format_pct(Some(0.1234)), "% 12.34");
        assert_eq!(format_pct(Some(-0.05)), "% -5.00");
        assert_eq!(format_pct(None), "% -");
    }
}
