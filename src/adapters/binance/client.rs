//! Binance Spot REST Client
//!
//! Public ticker prices, signed account queries and signed market orders.
//! Signed requests carry `timestamp`, `recvWindow` and an HMAC-SHA256
//! `signature` over the query string, plus the `X-MBX-APIKEY` header.

use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::{Client, RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

use crate::ports::{ExecutionError, MarketDataError};

type HmacSha256 = Hmac<Sha256>;

/// Binance client configuration
#[derive(Debug, Clone)]
pub struct BinanceConfig {
    /// Base URL for the REST API
    pub api_base_url: String,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub recv_window_ms: u64,
    /// Request timeout
    pub timeout: Duration,
    /// Number of attempts for idempotent requests
    pub max_retries: u32,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.binance.com".to_string(),
            api_key: None,
            api_secret: None,
            recv_window_ms: 5000,
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BinanceError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Binance error {code}: {msg}")]
    Api { code: i64, msg: String },
    #[error("Failed to parse response: {0}")]
    Parse(String),
    #[error("Signing failed: {0}")]
    Signing(String),
    #[error("API key and secret are required for signed requests")]
    MissingCredentials,
}

impl From<BinanceError> for MarketDataError {
    fn from(err: BinanceError) -> Self {
        match err {
            BinanceError::Parse(msg) => MarketDataError::ParseError(msg),
            other => MarketDataError::RestError(other.to_string()),
        }
    }
}

impl From<BinanceError> for ExecutionError {
    fn from(err: BinanceError) -> Self {
        match err {
            BinanceError::Api { code, msg } => ExecutionError::Rejected { code, message: msg },
            BinanceError::Signing(msg) => ExecutionError::SigningError(msg),
            BinanceError::MissingCredentials => {
                ExecutionError::SigningError("missing API credentials".to_string())
            }
            other => ExecutionError::ApiError(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

/// Market order size: quote amount to spend or base quantity to sell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketAmount {
    QuoteQty(Decimal),
    Quantity(Decimal),
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    balances: Vec<AssetBalance>,
}

#[derive(Debug, Deserialize)]
struct AssetBalance {
    asset: String,
    free: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    filters: Vec<serde_json::Value>,
}

/// Result of a market order
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: u64,
    pub status: String,
    #[serde(default)]
    pub executed_qty: Option<Decimal>,
    #[serde(default)]
    pub cummulative_quote_qty: Option<Decimal>,
}

/// Hex HMAC-SHA256 of `payload` under `secret`
pub fn sign(secret: &str, payload: &str) -> Result<String, BinanceError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| BinanceError::Signing(format!("Failed to create HMAC: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn query_string(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Round `quantity` down to a multiple of `step`
pub fn floor_to_step(quantity: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return quantity;
    }
    ((quantity / step).floor() * step).normalize()
}

/// Binance Spot client
#[derive(Debug, Clone)]
pub struct BinanceClient {
    config: BinanceConfig,
    http: Client,
}

impl BinanceClient {
    pub fn new(config: BinanceConfig) -> Result<Self, BinanceError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BinanceError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, http })
    }

    pub fn api_base_url(&self) -> &str {
        &self.config.api_base_url
    }

    pub fn has_credentials(&self) -> bool {
        self.config.api_key.is_some() && self.config.api_secret.is_some()
    }

    /// Last traded price of `symbol`
    pub async fn ticker_price(&self, symbol: &str) -> Result<f64, BinanceError> {
        let url = format!("{}/api/v3/ticker/price", self.config.api_base_url);
        let response = self
            .send_with_retry(|| Ok(self.http.get(&url).query(&[("symbol", symbol)])))
            .await?;
        let ticker: TickerPrice = Self::handle_response(response).await?;

        ticker
            .price
            .parse::<f64>()
            .map_err(|e| BinanceError::Parse(format!("price '{}' for {}: {}", ticker.price, symbol, e)))
    }

    /// LOT_SIZE step of `symbol`, if the exchange publishes one
    pub async fn lot_step(&self, symbol: &str) -> Result<Option<Decimal>, BinanceError> {
        let url = format!("{}/api/v3/exchangeInfo", self.config.api_base_url);
        let response = self
            .send_with_retry(|| Ok(self.http.get(&url).query(&[("symbol", symbol)])))
            .await?;
        let info: ExchangeInfo = Self::handle_response(response).await?;

        let step = info
            .symbols
            .iter()
            .find(|s| s.symbol == symbol)
            .and_then(|s| {
                s.filters
                    .iter()
                    .find(|f| f.get("filterType").and_then(|t| t.as_str()) == Some("LOT_SIZE"))
            })
            .and_then(|f| f.get("stepSize").and_then(|v| v.as_str()))
            .and_then(|v| v.parse::<Decimal>().ok());

        Ok(step)
    }

    /// Free (unlocked) balance of `asset`; zero when the account has none
    pub async fn free_balance(&self, asset: &str) -> Result<Decimal, BinanceError> {
        let url = format!("{}/api/v3/account", self.config.api_base_url);
        let response = self
            .send_with_retry(|| self.signed(self.http.get(&url), Vec::new()))
            .await?;
        let account: AccountInfo = Self::handle_response(response).await?;

        Ok(account
            .balances
            .into_iter()
            .find(|b| b.asset == asset)
            .map(|b| b.free)
            .unwrap_or(Decimal::ZERO))
    }

    /// Place a market order. Sent once: a POST is never retried.
    pub async fn market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        amount: MarketAmount,
    ) -> Result<OrderResponse, BinanceError> {
        let url = format!("{}/api/v3/order", self.config.api_base_url);
        let mut params = vec![
            ("symbol", symbol.to_string()),
            ("side", side.as_str().to_string()),
            ("type", "MARKET".to_string()),
        ];
        match amount {
            MarketAmount::QuoteQty(q) => params.push(("quoteOrderQty", q.normalize().to_string())),
            MarketAmount::Quantity(q) => params.push(("quantity", q.normalize().to_string())),
        }
        params.push(("newOrderRespType", "RESULT".to_string()));

        let request = self.signed(self.http.post(&url), params)?;
        let response = request
            .send()
            .await
            .map_err(|e| BinanceError::Http(e.to_string()))?;

        Self::handle_response(response).await
    }

    /// Attach timestamp, recvWindow, signature and API key header
    fn signed(
        &self,
        request: RequestBuilder,
        mut params: Vec<(&str, String)>,
    ) -> Result<RequestBuilder, BinanceError> {
        let (key, secret) = match (&self.config.api_key, &self.config.api_secret) {
            (Some(key), Some(secret)) => (key, secret),
            _ => return Err(BinanceError::MissingCredentials),
        };

        params.push(("recvWindow", self.config.recv_window_ms.to_string()));
        params.push(("timestamp", chrono::Utc::now().timestamp_millis().to_string()));
        let query = query_string(&params);
        let signature = sign(secret, &query)?;
        params.push(("signature", signature));

        Ok(request.header("X-MBX-APIKEY", key).query(&params))
    }

    /// Execute an idempotent request with retry on 429 and 5xx
    async fn send_with_retry<F>(&self, build: F) -> Result<reqwest::Response, BinanceError>
    where
        F: Fn() -> Result<RequestBuilder, BinanceError>,
    {
        let mut last_error = None;
        let attempts = self.config.max_retries.max(1);

        for attempt in 0..attempts {
            match build()?.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        let backoff = Duration::from_millis(500 * 2u64.pow(attempt));
                        tracing::warn!(
                            "Binance returned {}, backing off for {:?} (attempt {}/{})",
                            status,
                            backoff,
                            attempt + 1,
                            attempts
                        );
                        last_error = Some(BinanceError::Http(format!("Server returned {}", status)));
                        if attempt + 1 < attempts {
                            tokio::time::sleep(backoff).await;
                        }
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) => {
                    tracing::warn!("Binance request failed: {} (attempt {}/{})", e, attempt + 1, attempts);
                    last_error = Some(BinanceError::Http(e.to_string()));
                    if attempt + 1 < attempts {
                        tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| BinanceError::Http("Max retries exceeded".into())))
    }

    /// Handle API response and deserialize
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, BinanceError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BinanceError::Http(e.to_string()))?;

        if !status.is_success() {
            if let Ok(api) = serde_json::from_str::<ApiErrorBody>(&body) {
                return Err(BinanceError::Api {
                    code: api.code,
                    msg: api.msg,
                });
            }
            return Err(BinanceError::Http(format!("API error {}: {}", status, body)));
        }

        serde_json::from_str(&body).map_err(|e| BinanceError::Parse(e.to_string()))
    }
}
