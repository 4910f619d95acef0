//! Return & risk computations over aligned daily price tables.
//!
//! Every function here is pure and total: empty or all-missing input produces
//! an empty series or `None`, never a panic, so callers can render "nothing to
//! show" without special casing.

use crate::prices::{PriceTable, ReturnTable, Series};
use tracing::warn;

/// Trading days per year used for annualization.
pub const TRADING_DAYS: f64 = 252.0;

/// How a cumulative return over a window is measured.
///
/// The two modes agree only when the series has no gaps. `Compounded` is
/// applied to multi-asset aggregates, `PriceRatio` to single index/FX series.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CumulativeMode {
    /// Product of (1 + daily return) minus one; input is a return series.
    Compounded,
    /// Last price over first price minus one; input is a price series.
    PriceRatio,
}

/// Percentage change between consecutive rows.
///
/// The first row has no predecessor and is dropped, as is any row where a
/// return is undefined because either price is missing.
pub fn daily_returns(prices: &PriceTable) -> ReturnTable {
    let symbols = prices.symbols().to_vec();
    if symbols.is_empty() || prices.len() < 2 {
        return ReturnTable::from_parts(symbols, Vec::new(), Vec::new());
    }

    let mut dates = Vec::with_capacity(prices.len() - 1);
    let mut rows = Vec::with_capacity(prices.len() - 1);

    for (pair, date) in prices.raw_rows().windows(2).zip(&prices.dates()[1..]) {
        let row: Option<Vec<f64>> = pair[0]
            .iter()
            .zip(&pair[1])
            .map(|(prev, cur)| match (prev, cur) {
                (Some(p), Some(c)) => Some(c / p - 1.0),
                _ => None,
            })
            .collect();

        if let Some(row) = row {
            dates.push(*date);
            rows.push(row);
        }
    }

    ReturnTable::from_parts(symbols, dates, rows)
}

/// Cumulative return of `values` under `mode`. `values` are daily returns for
/// [`CumulativeMode::Compounded`] and prices for [`CumulativeMode::PriceRatio`].
pub fn cumulative_return(values: &[f64], mode: CumulativeMode) -> Option<f64> {
    match mode {
        CumulativeMode::Compounded => compounded_return(values),
        CumulativeMode::PriceRatio => {
            let prices: Vec<Option<f64>> = values.iter().copied().map(Some).collect();
            price_ratio_return(&prices)
        }
    }
}

/// Π(1 + r) − 1 over the whole window. `None` for an empty window.
pub fn compounded_return(returns: &[f64]) -> Option<f64> {
    if returns.is_empty() {
        return None;
    }
    let growth: f64 = returns.iter().map(|r| 1.0 + r).product();
    growth.is_finite().then(|| growth - 1.0)
}

/// Last price / first price − 1, using the first and last present observation.
pub fn price_ratio_return(prices: &[Option<f64>]) -> Option<f64> {
    let present = || prices.iter().flatten().copied().filter(|p| p.is_finite() && *p > 0.0);
    let first = present().next()?;
    let last = present().last()?;
    Some(last / first - 1.0)
}

/// Compounded cumulative return of every column of a return table.
pub fn compounded_returns_by_column(returns: &ReturnTable) -> Vec<(String, Option<f64>)> {
    returns
        .symbols()
        .iter()
        .enumerate()
        .map(|(j, symbol)| (symbol.clone(), compounded_return(&returns.column_at(j))))
        .collect()
}

/// Price-ratio cumulative return of every column of a price table.
pub fn price_ratio_returns_by_column(prices: &PriceTable) -> Vec<(String, Option<f64>)> {
    prices
        .symbols()
        .iter()
        .map(|symbol| {
            let column = prices.column(symbol).unwrap_or_default();
            (symbol.clone(), price_ratio_return(&column))
        })
        .collect()
}

/// Row-wise arithmetic mean of the selected instruments' daily returns.
///
/// The selection must name at least one column of `returns`; otherwise the
/// result is empty and a warning is logged.
pub fn equal_weight_aggregate<S: AsRef<str>>(returns: &ReturnTable, subset: &[S]) -> Series {
    if subset.is_empty() {
        warn!("Equal-weight aggregate requested for an empty selection");
        return Series::default();
    }

    let mut indices = Vec::with_capacity(subset.len());
    for symbol in subset {
        match returns.column_index(symbol.as_ref()) {
            Some(j) => indices.push(j),
            None => warn!("{} has no return column; left out of the aggregate", symbol.as_ref()),
        }
    }

    if indices.is_empty() {
        return Series::default();
    }

    let weight = indices.len() as f64;
    let points = returns
        .dates()
        .iter()
        .zip(returns.rows())
        .map(|(date, row)| {
            let sum: f64 = indices.iter().map(|&j| row[j]).sum();
            (*date, sum / weight)
        })
        .collect();

    Series::new(points)
}

/// Sorts (identifier, value) pairs by value, largest first. Ties keep their
/// order of appearance; undefined values go last.
pub fn sort_descending(values: &mut [(String, Option<f64>)]) {
    values.sort_by(|a, b| match (a.1, b.1) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

/// The `k` identifiers with the largest cumulative return, best first.
///
/// Identifiers with an undefined return are not candidates. Asking for more
/// than remain returns all of them.
pub fn rank_top_k(cumulative_returns: &[(String, Option<f64>)], k: usize) -> Vec<String> {
    let mut ranked: Vec<(String, Option<f64>)> = cumulative_returns
        .iter()
        .filter(|(_, r)| r.is_some_and(f64::is_finite))
        .cloned()
        .collect();
    sort_descending(&mut ranked);
    ranked.into_iter().take(k).map(|(s, _)| s).collect()
}

/// Sample standard deviation (n − 1) of daily returns scaled by √252.
pub fn volatility(returns: &[f64]) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt() * TRADING_DAYS.sqrt())
}

/// Annualized volatility per instrument, in column order.
pub fn annualized_volatility(returns: &ReturnTable) -> Vec<(String, Option<f64>)> {
    returns
        .symbols()
        .iter()
        .enumerate()
        .map(|(j, symbol)| (symbol.clone(), volatility(&returns.column_at(j))))
        .collect()
}

/// Pearson correlation matrix of daily returns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CorrelationMatrix {
    symbols: Vec<String>,
    values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn rows(&self) -> &[Vec<Option<f64>>] {
        &self.values
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.symbols.iter().position(|s| s.eq_ignore_ascii_case(a))?;
        let j = self.symbols.iter().position(|s| s.eq_ignore_ascii_case(b))?;
        self.values[i][j]
    }
}

fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some((cov / denom).clamp(-1.0, 1.0))
}

/// Pairwise Pearson correlation over the common rows of each pair.
/// The diagonal is exactly 1 and the matrix is symmetric by construction.
pub fn correlation_matrix(returns: &ReturnTable) -> CorrelationMatrix {
    if returns.is_empty() {
        return CorrelationMatrix::default();
    }

    let n = returns.symbols().len();
    let columns: Vec<Vec<f64>> = (0..n).map(|j| returns.column_at(j)).collect();
    let mut values = vec![vec![None; n]; n];

    for i in 0..n {
        values[i][i] = Some(1.0);
        for j in (i + 1)..n {
            let rho = pearson(&columns[i], &columns[j]);
            values[i][j] = rho;
            values[j][i] = rho;
        }
    }

    CorrelationMatrix {
        symbols: returns.symbols().to_vec(),
        values,
    }
}

/// Running Π(1 + r): the growth of one unit invested at the window start.
pub fn growth_index(returns: &Series) -> Series {
    let mut level = 1.0;
    let points = returns
        .points
        .iter()
        .map(|(date, r)| {
            level *= 1.0 + r;
            (*date, level)
        })
        .collect();
    Series::new(points)
}

/// One instrument's prices divided by its first present price.
pub fn rebase(prices: &PriceTable, symbol: &str) -> Series {
    let Some(column) = prices.column(symbol) else {
        return Series::default();
    };
    let Some(base) = column.iter().flatten().copied().next() else {
        return Series::default();
    };

    let points = prices
        .dates()
        .iter()
        .zip(column)
        .filter_map(|(date, price)| price.map(|p| (*date, p / base)))
        .collect();
    Series::new(points)
}
