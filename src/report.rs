use crate::config::AppConfig;
use crate::data::{FetchRequest, PriceProvider, fetch_or_empty};
use crate::engine::{
    CorrelationMatrix, annualized_volatility, correlation_matrix, daily_returns,
    price_ratio_return, price_ratio_returns_by_column, sort_descending,
};
use chrono::NaiveDate;
use tracing::info;

/// One-off analysis of the whole universe plus the report indices.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchReport {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    /// One-year return in percent, best first; indices included.
    pub returns: Vec<(String, Option<f64>)>,
    /// Annualized volatility in percent, riskiest first.
    pub volatility: Vec<(String, Option<f64>)>,
    pub correlation: CorrelationMatrix,
}

fn percent(value: Option<f64>) -> Option<f64> {
    value.map(|v| v * 100.0)
}

pub async fn build_report(provider: &dyn PriceProvider, config: &AppConfig, today: NaiveDate) -> BatchReport {
    let (start, end) = config.analysis_window(today);
    info!(
        "Building report for {} symbols and {} indices over [{} .. {})",
        config.universe.len(),
        config.report_indices.len(),
        start,
        end
    );

    let universe = fetch_or_empty(provider, &FetchRequest::new(config.universe.as_slice(), start, end)).await;
    let indices = fetch_or_empty(provider, &FetchRequest::new(config.report_indices.as_slice(), start, end)).await;

    let mut returns: Vec<(String, Option<f64>)> = price_ratio_returns_by_column(&universe)
        .into_iter()
        .map(|(s, r)| (s, percent(r)))
        .collect();
    for index in &config.report_indices {
        let r = indices.column(index).and_then(|c| price_ratio_return(&c));
        returns.push((index.clone(), percent(r)));
    }
    sort_descending(&mut returns);

    let daily = daily_returns(&universe);
    let mut volatility: Vec<(String, Option<f64>)> = annualized_volatility(&daily)
        .into_iter()
        .map(|(s, v)| (s, percent(v)))
        .collect();
    sort_descending(&mut volatility);

    BatchReport {
        window_start: start,
        window_end: end,
        returns,
        volatility,
        correlation: correlation_matrix(&daily),
    }
}

fn short_name(symbol: &str) -> &str {
    symbol.strip_suffix(".IS").unwrap_or(symbol)
}

fn cell(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.*}", precision, v),
        _ => "NaN".to_string(),
    }
}

const RULE: &str = "----------------------------------------------------";

fn banner(title: &str) -> Vec<String> {
    vec![String::new(), RULE.to_string(), title.to_string(), RULE.to_string()]
}

fn finish(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn ranked_rows(lines: &mut Vec<String>, values: &[(String, Option<f64>)]) {
    lines.extend(
        values
            .iter()
            .map(|(symbol, value)| format!("{:<12} {:>10}", symbol, cell(*value, 2))),
    );
}

pub fn render_returns(report: &BatchReport) -> String {
    let mut lines = banner(&format!(
        "1-YEAR RETURNS (%)  {} .. {}",
        report.window_start, report.window_end
    ));
    lines.push(format!("{:<12} {:>10}", "Symbol", "Return %"));
    ranked_rows(&mut lines, &report.returns);
    finish(lines)
}

pub fn render_volatility(report: &BatchReport) -> String {
    let mut lines = banner("ANNUALIZED VOLATILITY (%)");
    ranked_rows(&mut lines, &report.volatility);
    finish(lines)
}

pub fn render_correlation(report: &BatchReport) -> String {
    let mut lines = banner("CORRELATION MATRIX (daily returns)");

    let matrix = &report.correlation;
    if matrix.is_empty() {
        lines.push("(no data)".to_string());
        return finish(lines);
    }

    let header: String = matrix
        .symbols()
        .iter()
        .map(|symbol| format!(" {:>7}", short_name(symbol)))
        .collect();
    lines.push(format!("{:<8}{}", "", header));

    for (symbol, row) in matrix.symbols().iter().zip(matrix.rows()) {
        let cells: String = row.iter().map(|value| format!(" {:>7}", cell(*value, 3))).collect();
        lines.push(format!("{:<8}{}", short_name(symbol), cells));
    }
    finish(lines)
}

/// Writes the three tables to stdout.
pub fn print_report(report: &BatchReport) {
    print!("{}", render_returns(report));
    print!("{}", render_volatility(report));
    print!("{}", render_correlation(report));
}

pub async fn run_report(provider: &dyn PriceProvider, config: &AppConfig) -> BatchReport {
    println!("Fetching BIST-30 and index prices...");
    let report = build_report(provider, config, config.today()).await;
    print_report(&report);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FixtureProvider;
    use crate::prices::PriceTable;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, day).unwrap()
    }

    fn series(prices: &[f64]) -> Vec<(NaiveDate, f64)> {
        prices.iter().enumerate().map(|(i, p)| (d(i as u32 + 2), *p)).collect()
    }

    fn config() -> AppConfig {
        AppConfig {
            universe: vec!["AAA.IS".into(), "BBB.IS".into(), "CCC.IS".into()],
            report_indices: vec!["XU100.IS".into(), "XU030.IS".into()],
            lookback_days: 60,
            ..AppConfig::default()
        }
    }

    fn provider() -> FixtureProvider {
        FixtureProvider::new(PriceTable::from_columns(vec![
            ("AAA.IS".into(), series(&[100.0, 102.0, 101.0, 105.0])),
            ("BBB.IS".into(), series(&[50.0, 55.0, 49.0, 60.0])),
            ("CCC.IS".into(), series(&[20.0, 19.0, 18.5, 18.0])),
            ("XU100.IS".into(), series(&[9000.0, 9100.0, 9150.0, 9270.0])),
            ("XU030.IS".into(), series(&[10000.0, 10100.0, 10200.0, 10400.0])),
        ]))
    }

    #[tokio::test]
    async fn test_returns_table_includes_indices_sorted() {
        let report = build_report(&provider(), &config(), d(30)).await;
        let order: Vec<&str> = report.returns.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(order, vec!["BBB.IS", "AAA.IS", "XU030.IS", "XU100.IS", "CCC.IS"]);

        let bbb = report.returns[0].1.unwrap();
        assert!((bbb - 20.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_volatility_ranking_and_correlation() {
        let report = build_report(&provider(), &config(), d(30)).await;
        assert_eq!(report.volatility[0].0, "BBB.IS");
        assert_eq!(report.volatility.last().unwrap().0, "CCC.IS");
        assert_eq!(report.correlation.len(), 3);
        assert_eq!(report.correlation.get("CCC.IS", "CCC.IS"), Some(1.0));
    }

    #[tokio::test]
    async fn test_unavailable_data_renders_placeholders() {
        let empty = FixtureProvider::new(PriceTable::empty());
        let report = build_report(&empty, &config(), d(30)).await;
        assert!(report.volatility.is_empty());
        assert!(report.correlation.is_empty());
        assert!(report.returns.iter().all(|(_, v)| v.is_none()));
        assert!(render_correlation(&report).contains("(no data)"));
        assert!(render_returns(&report).contains("NaN"));
    }

    #[tokio::test]
    async fn test_render_correlation_layout() {
        let report = build_report(&provider(), &config(), d(30)).await;
        let text = render_correlation(&report);
        let lines: Vec<&str> = text.lines().filter(|l| !l.is_empty()).collect();
        // banner (3 lines) + header + one row per symbol
        assert_eq!(lines.len(), 3 + 1 + 3);
        assert!(lines[3].contains("AAA") && lines[3].contains("CCC"));
        assert!(lines[4].starts_with("AAA") && lines[4].contains("1.000"));
    }
}
