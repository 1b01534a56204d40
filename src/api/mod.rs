pub mod binance;

pub use binance::{sign_query, AccountSummary, BinanceClient, BINANCE_API_BASE, MAX_KLINE_LIMIT};
