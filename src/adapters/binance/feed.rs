use async_trait::async_trait;
use chrono::Utc;

use super::client::BinanceClient;
use crate::domain::PricePair;
use crate::ports::{MarketDataError, PriceFeed};

/// Live feed polling the spot ticker of both legs
#[derive(Debug, Clone)]
pub struct BinanceFeed {
    client: BinanceClient,
    symbol_a: String,
    symbol_b: String,
}

impl BinanceFeed {
    pub fn new(client: BinanceClient, symbol_a: impl Into<String>, symbol_b: impl Into<String>) -> Self {
        Self {
            client,
            symbol_a: symbol_a.into(),
            symbol_b: symbol_b.into(),
        }
    }
}

#[async_trait]
impl PriceFeed for BinanceFeed {
    fn describe(&self) -> String {
        format!(
            "Binance ticker {}/{} ({})",
            self.symbol_a,
            self.symbol_b,
            self.client.api_base_url()
        )
    }

    async fn next_pair(&mut self) -> Result<Option<PricePair>, MarketDataError> {
        let (price_a, price_b) = tokio::try_join!(
            self.client.ticker_price(&self.symbol_a),
            self.client.ticker_price(&self.symbol_b),
        )?;

        Ok(Some(PricePair::new(Utc::now(), price_a, price_b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::binance::BinanceConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_ticker(server: &MockServer, symbol: &str, price: &str) {
        Mock::given(method("GET"))
            .and(path("/api/v3/ticker/price"))
            .and(query_param("symbol", symbol))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"symbol": symbol, "price": price})),
            )
            .mount(server)
            .await;
    }

    fn feed(server: &MockServer) -> BinanceFeed {
        let client = BinanceClient::new(BinanceConfig {
            api_base_url: server.uri(),
            max_retries: 1,
            ..BinanceConfig::default()
        })
        .unwrap();
        BinanceFeed::new(client, "BTCUSDT", "ETHUSDT")
    }

    #[tokio::test]
    async fn test_fetches_both_legs() {
        let server = MockServer::start().await;
        mount_ticker(&server, "BTCUSDT", "60000.00").await;
        mount_ticker(&server, "ETHUSDT", "3000.00").await;

        let mut feed = feed(&server);
        let first = feed.next_pair().await.unwrap().unwrap();
        assert_eq!(first.price_a, 60000.0);
        assert_eq!(first.price_b, 3000.0);

        let second = feed.next_pair().await.unwrap().unwrap();
        assert!(second.timestamp >= first.timestamp);
    }

    #[tokio::test]
    async fn test_unparseable_price_is_parse_error() {
        let server = MockServer::start().await;
        mount_ticker(&server, "BTCUSDT", "not-a-number").await;
        mount_ticker(&server, "ETHUSDT", "3000.00").await;

        let err = feed(&server).next_pair().await.unwrap_err();
        assert!(matches!(err, MarketDataError::ParseError(_)));
    }

    #[tokio::test]
    async fn test_missing_leg_is_rest_error() {
        let server = MockServer::start().await;
        mount_ticker(&server, "BTCUSDT", "60000.00").await;

        let err = feed(&server).next_pair().await.unwrap_err();
        assert!(matches!(err, MarketDataError::RestError(_)));
    }
}
