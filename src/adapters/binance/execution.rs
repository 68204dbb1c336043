use async_trait::async_trait;
use rust_decimal::Decimal;

use super::client::{floor_to_step, BinanceClient, MarketAmount, OrderSide};
use crate::domain::{Leg, OrderAction, OrderIntent, OrderSize};
use crate::ports::{ExecutionError, ExecutionPort, ExecutionReport};

/// Spot symbol and the asset it delivers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotMarket {
    pub symbol: String,
    pub base_asset: String,
}

impl SpotMarket {
    pub fn new(symbol: impl Into<String>, base_asset: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            base_asset: base_asset.into(),
        }
    }
}

/// Live execution with market orders.
///
/// Acquire spends the intent's quote amount; release sells the entire free
/// balance of the held asset, rounded down to the lot step.
#[derive(Debug, Clone)]
pub struct BinanceExecution {
    client: BinanceClient,
    market_a: SpotMarket,
    market_b: SpotMarket,
}

impl BinanceExecution {
    pub fn new(client: BinanceClient, market_a: SpotMarket, market_b: SpotMarket) -> Self {
        Self {
            client,
            market_a,
            market_b,
        }
    }

    fn market(&self, leg: Leg) -> &SpotMarket {
        match leg {
            Leg::A => &self.market_a,
            Leg::B => &self.market_b,
        }
    }

    async fn sell_quantity(&self, market: &SpotMarket) -> Result<Decimal, ExecutionError> {
        let free = self.client.free_balance(&market.base_asset).await?;
        let step = self.client.lot_step(&market.symbol).await?;
        let quantity = match step {
            Some(step) => floor_to_step(free, step),
            None => free,
        };

        if quantity <= Decimal::ZERO {
            return Err(ExecutionError::InsufficientBalance(market.base_asset.clone()));
        }
        Ok(quantity)
    }
}

/// A market order counts only when something was bought or sold. Binance
/// answers HTTP 200 for EXPIRED and REJECTED orders too.
fn is_filled(status: &str, executed_qty: Option<Decimal>) -> bool {
    match status {
        "FILLED" => true,
        "PARTIALLY_FILLED" => executed_qty.map_or(false, |q| q > Decimal::ZERO),
        _ => false,
    }
}

#[async_trait]
impl ExecutionPort for BinanceExecution {
    fn is_simulated(&self) -> bool {
        false
    }

    async fn execute(&self, intent: &OrderIntent) -> Result<ExecutionReport, ExecutionError> {
        let market = self.market(intent.leg);

        let (side, amount) = match (intent.action, intent.size) {
            (OrderAction::Acquire, OrderSize::Quote(quote)) => {
                if quote <= Decimal::ZERO {
                    return Err(ExecutionError::InvalidParameters(format!(
                        "quote amount must be > 0, got {}",
                        quote
                    )));
                }
                (OrderSide::Buy, MarketAmount::QuoteQty(quote))
            }
            (OrderAction::Release, OrderSize::EntireHolding) => {
                let quantity = self.sell_quantity(market).await?;
                (OrderSide::Sell, MarketAmount::Quantity(quantity))
            }
            (action, size) => {
                return Err(ExecutionError::InvalidParameters(format!(
                    "unsupported order: {} with {}",
                    action, size
                )))
            }
        };

        tracing::info!("Placing market {:?} on {}: {:?}", side, market.symbol, amount);
        let order = self.client.market_order(&market.symbol, side, amount).await?;
        tracing::info!(
            "Order {} {} on {} (qty {:?}, quote {:?})",
            order.order_id,
            order.status,
            market.symbol,
            order.executed_qty,
            order.cummulative_quote_qty
        );

        if !is_filled(&order.status, order.executed_qty) {
            return Err(ExecutionError::NotFilled {
                order_id: order.order_id.to_string(),
                status: order.status,
            });
        }

        Ok(ExecutionReport {
            order_id: order.order_id.to_string(),
            filled_qty: order.executed_qty,
            quote_qty: order.cummulative_quote_qty,
            simulated: false,
        })
    }
}
