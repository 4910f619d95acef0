use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Daily adjusted closing prices for a set of instruments on a shared date axis.
///
/// Dates are ascending and unique. A cell is `None` when the instrument has no
/// usable close on that date; non-positive or non-finite prices are stored as
/// missing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PriceTable {
    symbols: Vec<String>,
    dates: Vec<NaiveDate>,
    rows: Vec<Vec<Option<f64>>>,
}

fn sanitize(price: Option<f64>) -> Option<f64> {
    price.filter(|p| p.is_finite() && *p > 0.0)
}

impl PriceTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a table from date-keyed rows. Rows are sorted by date; when a
    /// date appears more than once the last row wins.
    #[cfg(test)]
    pub fn from_rows(symbols: Vec<String>, rows: Vec<(NaiveDate, Vec<Option<f64>>)>) -> Self {
        let width = symbols.len();
        let mut by_date: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
        for (date, mut cells) in rows {
            cells.resize(width, None);
            by_date.insert(date, cells.into_iter().map(sanitize).collect());
        }

        let (dates, rows) = by_date.into_iter().unzip();
        Self { symbols, dates, rows }
    }

    /// Outer-joins independent per-instrument series on date.
    pub fn from_columns(columns: Vec<(String, Vec<(NaiveDate, f64)>)>) -> Self {
        let width = columns.len();
        let mut by_date: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
        let mut symbols = Vec::with_capacity(width);

        for (j, (symbol, points)) in columns.into_iter().enumerate() {
            symbols.push(symbol);
            for (date, price) in points {
                let row = by_date.entry(date).or_insert_with(|| vec![None; width]);
                row[j] = sanitize(Some(price));
            }
        }

        let (dates, rows) = by_date.into_iter().unzip();
        Self { symbols, dates, rows }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub(crate) fn raw_rows(&self) -> &[Vec<Option<f64>>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// True when there is nothing to analyse: no rows, no instruments, or no
    /// present price anywhere.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
            || self.rows.iter().all(|row| row.iter().all(Option::is_none))
    }

    pub fn column_index(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s.eq_ignore_ascii_case(symbol))
    }

    /// Prices of one instrument in date order, missing cells included.
    pub fn column(&self, symbol: &str) -> Option<Vec<Option<f64>>> {
        let j = self.column_index(symbol)?;
        Some(self.rows.iter().map(|row| row[j]).collect())
    }

    #[cfg(test)]
    pub fn value(&self, date: NaiveDate, symbol: &str) -> Option<f64> {
        let j = self.column_index(symbol)?;
        let i = self.dates.binary_search(&date).ok()?;
        self.rows[i][j]
    }

    /// Restricts the table to the given instruments, in the given order.
    /// Unknown instruments become all-missing columns. Rows left with no
    /// present value are dropped.
    pub fn select<S: AsRef<str>>(&self, symbols: &[S]) -> Self {
        let indices: Vec<Option<usize>> = symbols
            .iter()
            .map(|s| self.column_index(s.as_ref()))
            .collect();

        let mut dates = Vec::new();
        let mut rows = Vec::new();
        for (date, row) in self.dates.iter().zip(&self.rows) {
            let picked: Vec<Option<f64>> = indices
                .iter()
                .map(|idx| idx.and_then(|j| row[j]))
                .collect();
            if picked.iter().any(Option::is_some) {
                dates.push(*date);
                rows.push(picked);
            }
        }

        Self {
            symbols: symbols.iter().map(|s| s.as_ref().to_string()).collect(),
            dates,
            rows,
        }
    }

    /// Keeps the rows whose date lies in `[start, end)`.
    pub fn window(&self, start: NaiveDate, end: NaiveDate) -> Self {
        let (dates, rows) = self
            .dates
            .iter()
            .zip(&self.rows)
            .filter(|(date, _)| **date >= start && **date < end)
            .map(|(date, row)| (*date, row.clone()))
            .unzip();

        Self {
            symbols: self.symbols.clone(),
            dates,
            rows,
        }
    }
}

/// Simple daily returns. Every row is complete: rows with an undefined cell
/// are dropped when the table is built.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReturnTable {
    symbols: Vec<String>,
    dates: Vec<NaiveDate>,
    rows: Vec<Vec<f64>>,
}

impl ReturnTable {
    pub(crate) fn from_parts(symbols: Vec<String>, dates: Vec<NaiveDate>, rows: Vec<Vec<f64>>) -> Self {
        Self { symbols, dates, rows }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.symbols.is_empty()
    }

    pub fn column_index(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s.eq_ignore_ascii_case(symbol))
    }

    #[cfg(test)]
    pub fn column(&self, symbol: &str) -> Option<Vec<f64>> {
        let j = self.column_index(symbol)?;
        Some(self.column_at(j))
    }

    pub(crate) fn column_at(&self, j: usize) -> Vec<f64> {
        self.rows.iter().map(|row| row[j]).collect()
    }
}

/// A single dated series, e.g. an equal-weight portfolio's daily returns.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Series {
    pub points: Vec<(NaiveDate, f64)>,
}

impl Series {
    pub fn new(points: Vec<(NaiveDate, f64)>) -> Self {
        Self { points }
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|(_, v)| *v).collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |(d, _)| *d)
            .ok()
            .map(|i| self.points[i].1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn test_from_rows_sorts_and_dedups_dates() {
        let table = PriceTable::from_rows(
            vec!["A".into()],
            vec![
                (d(3), vec![Some(3.0)]),
                (d(1), vec![Some(1.0)]),
                (d(3), vec![Some(30.0)]),
            ],
        );
        assert_eq!(table.dates(), &[d(1), d(3)]);
        assert_eq!(table.value(d(3), "A"), Some(30.0));
    }

    #[test]
    fn test_from_columns_outer_joins_on_date() {
        let table = PriceTable::from_columns(vec![
            ("A".into(), vec![(d(1), 10.0), (d(2), 11.0)]),
            ("B".into(), vec![(d(2), 20.0), (d(3), 21.0)]),
        ]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.column("A").unwrap(), vec![Some(10.0), Some(11.0), None]);
        assert_eq!(table.column("b").unwrap(), vec![None, Some(20.0), Some(21.0)]);
    }

    #[test]
    fn test_non_positive_prices_are_missing() {
        let table = PriceTable::from_rows(
            vec!["A".into()],
            vec![(d(1), vec![Some(0.0)]), (d(2), vec![Some(f64::NAN)])],
        );
        assert!(table.is_empty());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_select_and_window() {
        let table = PriceTable::from_columns(vec![
            ("A".into(), vec![(d(1), 10.0), (d(2), 11.0), (d(3), 12.0)]),
            ("B".into(), vec![(d(3), 20.0)]),
        ]);

        let only_b = table.select(&["B"]);
        assert_eq!(only_b.symbols(), &["B".to_string()]);
        assert_eq!(only_b.dates(), &[d(3)]);

        let windowed = table.window(d(2), d(3));
        assert_eq!(windowed.dates(), &[d(2)]);
        assert_eq!(windowed.symbols().len(), 2);
    }

    #[test]
    fn test_series_lookup() {
        let s = Series::new(vec![(d(1), 1.0), (d(4), 4.0)]);
        assert_eq!(s.get(d(4)), Some(4.0));
        assert_eq!(s.get(d(2)), None);
    }
}
