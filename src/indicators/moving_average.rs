/// Calculate Simple Moving Average (SMA) of the trailing `period` prices
///
/// Returns `None` until at least `period` prices are available.
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}
