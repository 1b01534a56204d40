use crate::error::{BotError, Result};
use crate::models::Candle;
use crate::secrets::Credentials;
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use hmac::{Hmac, Mac};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use std::num::NonZeroU32;
use std::time::Duration;

pub const BINANCE_API_BASE: &str = "https://api.binance.com";
const KLINES_PATH: &str = "/api/v3/klines";
const ACCOUNT_PATH: &str = "/api/v3/account";
const API_KEY_HEADER: &str = "X-MBX-APIKEY";
const REQUESTS_PER_MINUTE: u32 = 600; // Well under Binance's 6000 weight/min
const RECV_WINDOW_MS: u64 = 5000;
pub const MAX_KLINE_LIMIT: u32 = 1000;

type HmacSha256 = Hmac<Sha256>;

type BinanceRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Binance spot REST client for market data
///
/// Owns the credentials it was built from. Failures are reported as
/// `BotError::DataFetch` and never retried.
pub struct BinanceClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
    rate_limiter: BinanceRateLimiter,
}

/// Response from /api/v3/account
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    can_trade: bool,
    #[serde(default)]
    balances: Vec<BalanceEntry>,
}

#[derive(Debug, Deserialize)]
struct BalanceEntry {
    asset: String,
    free: String,
    locked: String,
}

/// What a signed account lookup tells us about the key pair
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSummary {
    pub can_trade: bool,
    pub funded_assets: Vec<String>,
}

struct Kline {
    candle: Candle,
    close_time: DateTime<Utc>,
}

impl BinanceClient {
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_base_url(credentials, BINANCE_API_BASE)
    }

    pub fn with_base_url(credentials: Credentials, base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BotError::DataFetch(format!("failed to build HTTP client: {}", e)))?;

        let quota =
            Quota::per_minute(NonZeroU32::new(REQUESTS_PER_MINUTE).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            rate_limiter: RateLimiter::direct(quota),
        })
    }

    /// Fetch the most recent klines, oldest first. The last one may still be open.
    pub async fn get_klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Candle>> {
        let klines = self.fetch_klines(symbol, interval, limit).await?;
        Ok(klines.into_iter().map(|k| k.candle).collect())
    }

    /// Fetch the most recent klines whose interval has closed before `now`
    pub async fn get_closed_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        let candles: Vec<Candle> = self
            .fetch_klines(symbol, interval, limit)
            .await?
            .into_iter()
            .filter(|k| k.close_time < now)
            .map(|k| k.candle)
            .collect();

        if candles.is_empty() {
            return Err(BotError::DataFetch(format!(
                "no closed klines for {} {}",
                symbol, interval
            )));
        }

        Ok(candles)
    }

    /// Signed account lookup, used to reject bad keys before trading
    pub async fn verify_credentials(&self) -> Result<AccountSummary> {
        let query = format!(
            "recvWindow={}&timestamp={}",
            RECV_WINDOW_MS,
            Utc::now().timestamp_millis()
        );
        let signature = sign_query(self.credentials.api_secret(), &query)?;
        let url = format!(
            "{}{}?{}&signature={}",
            self.base_url, ACCOUNT_PATH, query, signature
        );

        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, self.credentials.api_key())
            .send()
            .await
            .map_err(request_error)?;
        let response = ensure_success(response).await?;

        let account: AccountResponse = response.json().await.map_err(|e| {
            BotError::DataFetch(format!("malformed account payload: {}", e.without_url()))
        })?;

        let funded_assets: Vec<String> = account
            .balances
            .into_iter()
            .filter(|b| {
                let free = b.free.parse::<f64>().unwrap_or(0.0);
                let locked = b.locked.parse::<f64>().unwrap_or(0.0);
                free + locked > 0.0
            })
            .map(|b| b.asset)
            .collect();

        tracing::info!(
            can_trade = account.can_trade,
            funded_assets = funded_assets.len(),
            "Binance credentials verified"
        );

        Ok(AccountSummary {
            can_trade: account.can_trade,
            funded_assets,
        })
    }

    async fn fetch_klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Kline>> {
        let limit = limit.clamp(1, MAX_KLINE_LIMIT);
        let url = format!("{}{}", self.base_url, KLINES_PATH);

        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, self.credentials.api_key())
            .query(&[
                ("symbol", symbol.to_uppercase()),
                ("interval", interval.to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await
            .map_err(request_error)?;
        let response = ensure_success(response).await?;

        let rows: Vec<Vec<Value>> = response.json().await.map_err(|e| {
            BotError::DataFetch(format!("malformed klines payload: {}", e.without_url()))
        })?;

        if rows.is_empty() {
            return Err(BotError::DataFetch(format!(
                "no klines returned for {} {}",
                symbol, interval
            )));
        }

        let klines = rows
            .iter()
            .map(|row| parse_kline(row))
            .collect::<std::result::Result<Vec<_>, String>>()
            .map_err(BotError::DataFetch)?;

        tracing::debug!(
            symbol = %symbol,
            interval = %interval,
            count = klines.len(),
            "Fetched klines"
        );

        Ok(klines)
    }
}

/// HMAC-SHA256 signature of a query string, hex encoded
pub fn sign_query(secret: &str, query: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| BotError::DataFetch(format!("invalid signing key: {}", e)))?;
    mac.update(query.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn request_error(e: reqwest::Error) -> BotError {
    BotError::DataFetch(format!("request to Binance failed: {}", e.without_url()))
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(200).collect();
    Err(BotError::DataFetch(format!(
        "Binance returned {}: {}",
        status, body
    )))
}

/// Kline rows are `[open_time, open, high, low, close, volume, close_time, ...]`
/// with prices and volume encoded as strings.
fn parse_kline(row: &[Value]) -> std::result::Result<Kline, String> {
    if row.len() < 7 {
        return Err(format!(
            "kline row has {} fields, expected at least 7",
            row.len()
        ));
    }

    Ok(Kline {
        candle: Candle {
            timestamp: timestamp_field(&row[0], "open time")?,
            open: number_field(&row[1], "open")?,
            high: number_field(&row[2], "high")?,
            low: number_field(&row[3], "low")?,
            close: number_field(&row[4], "close")?,
            volume: number_field(&row[5], "volume")?,
        },
        close_time: timestamp_field(&row[6], "close time")?,
    })
}

fn number_field(value: &Value, name: &str) -> std::result::Result<f64, String> {
    match value {
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| format!("{} is not a number: {:?}", name, s)),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("{} is not a number: {}", name, n)),
        other => Err(format!("{} has unexpected type: {}", name, other)),
    }
}

fn timestamp_field(value: &Value, name: &str) -> std::result::Result<DateTime<Utc>, String> {
    let millis = value
        .as_i64()
        .ok_or_else(|| format!("{} is not an integer: {}", name, value))?;
    DateTime::from_timestamp_millis(millis).ok_or_else(|| format!("{} out of range: {}", name, millis))
}
