//! Alpaca trading API (v2) over the blocking reqwest client.
//!
//! Alpaca has no separate "create" step, so `create_order` only assigns a
//! client order id; the order goes out in `submit_order`.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::{BrokerError, MarketData, OrderExecution};
use crate::credentials::{http_client, AlpacaCredentials, DATA_BASE_URL};
use crate::domain::{AckStatus, Order, OrderHandle, OrderId, OrderKind, SubmissionAck};

#[derive(Debug, Deserialize)]
struct Account {
    cash: String,
}

#[derive(Debug, Deserialize)]
struct LatestTrade {
    trade: Trade,
}

#[derive(Debug, Deserialize)]
struct Trade {
    #[serde(rename = "p")]
    price: f64,
}

#[derive(Debug, Deserialize)]
struct Clock {
    timestamp: DateTime<FixedOffset>,
}

#[derive(Debug, Serialize)]
struct LimitPrice {
    limit_price: String,
}

#[derive(Debug, Serialize)]
struct StopPrice {
    stop_price: String,
}

#[derive(Debug, Serialize)]
struct OrderRequest<'a> {
    symbol: &'a str,
    qty: String,
    side: &'static str,
    #[serde(rename = "type")]
    order_type: &'static str,
    time_in_force: &'static str,
    client_order_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    take_profit: Option<LimitPrice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_loss: Option<StopPrice>,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    status: String,
    filled_avg_price: Option<String>,
}

/// Alpaca wants bracket legs quoted in cents.
fn cents(price: f64) -> String {
    format!("{:.2}", (price * 100.0).round() / 100.0)
}

impl<'a> OrderRequest<'a> {
    fn new(handle: &'a OrderHandle) -> Self {
        let order = &handle.order;
        let legs = match order.order_type {
            OrderKind::Market => None,
            OrderKind::Bracket => order.bracket_levels(),
        };
        Self {
            symbol: &order.symbol,
            qty: order.quantity.to_string(),
            side: order.side.as_str(),
            order_type: "market",
            time_in_force: if legs.is_some() { "gtc" } else { "day" },
            client_order_id: &handle.id.0,
            order_class: legs.map(|_| "bracket"),
            take_profit: legs.map(|l| LimitPrice {
                limit_price: cents(l.take_profit_price),
            }),
            stop_loss: legs.map(|l| StopPrice {
                stop_price: cents(l.stop_loss_price),
            }),
        }
    }
}

pub struct AlpacaBroker {
    client: reqwest::blocking::Client,
    credentials: AlpacaCredentials,
    data_url: String,
    next_id: AtomicU64,
}

impl AlpacaBroker {
    pub fn new(credentials: AlpacaCredentials) -> Result<Self, BrokerError> {
        Ok(Self {
            client: http_client(Duration::from_secs(30))?,
            credentials,
            data_url: DATA_BASE_URL.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn credentials(&self) -> &AlpacaCredentials {
        &self.credentials
    }

    fn trading_url(&self, path: &str) -> String {
        format!("{}{path}", self.credentials.base_url)
    }

    fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<T, BrokerError> {
        let resp = self
            .credentials
            .authorize(request)
            .send()
            .map_err(|e| BrokerError::Request(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(match status.as_u16() {
                403 | 422 => BrokerError::Rejected(body),
                code => BrokerError::Status { status: code, body },
            });
        }
        resp.json::<T>().map_err(|e| BrokerError::Parse(e.to_string()))
    }

    fn client_order_id(&self, symbol: &str) -> OrderId {
        let seq = self.next_id.fetch_add(1, Ordering::Relaxed);
        let millis = chrono::Utc::now().timestamp_millis();
        OrderId(format!("st-{symbol}-{millis}-{seq}"))
    }
}

impl MarketData for AlpacaBroker {
    fn cash(&self) -> Result<f64, BrokerError> {
        let account: Account = self.send(self.client.get(self.trading_url("/v2/account")))?;
        account
            .cash
            .parse::<f64>()
            .map_err(|e| BrokerError::Parse(format!("account cash {:?}: {e}", account.cash)))
    }

    fn last_price(&self, symbol: &str) -> Result<f64, BrokerError> {
        let url = format!("{}/v2/stocks/{symbol}/trades/latest", self.data_url);
        let latest: LatestTrade = self.send(self.client.get(url))?;
        if !latest.trade.price.is_finite() {
            return Err(BrokerError::NoPrice {
                symbol: symbol.to_string(),
            });
        }
        Ok(latest.trade.price)
    }

    /// Exchange-local date from the market clock.
    fn current_date(&self) -> Result<NaiveDate, BrokerError> {
        let clock: Clock = self.send(self.client.get(self.trading_url("/v2/clock")))?;
        Ok(clock.timestamp.date_naive())
    }
}

impl OrderExecution for AlpacaBroker {
    fn create_order(&mut self, order: Order) -> Result<OrderHandle, BrokerError> {
        if order.quantity == 0 {
            return Err(BrokerError::Rejected("quantity must be positive".into()));
        }
        Ok(OrderHandle {
            id: self.client_order_id(&order.symbol),
            order,
        })
    }

    fn submit_order(&mut self, handle: &OrderHandle) -> Result<SubmissionAck, BrokerError> {
        let body = OrderRequest::new(handle);
        tracing::debug!(client_order_id = %handle.id, order = %handle.order, "submitting alpaca order");
        let resp: OrderResponse =
            self.send(self.client.post(self.trading_url("/v2/orders")).json(&body))?;
        let status = match resp.status.as_str() {
            "filled" => AckStatus::Filled,
            "rejected" | "canceled" | "expired" => {
                return Err(BrokerError::Rejected(format!("order {} {}", resp.id, resp.status)))
            }
            _ => AckStatus::Accepted,
        };
        Ok(SubmissionAck {
            order_id: OrderId(resp.id),
            status,
            fill_price: resp.filled_avg_price.and_then(|p| p.parse().ok()),
        })
    }

    fn liquidate_all(&mut self, symbol: &str) -> Result<(), BrokerError> {
        let url = self.trading_url(&format!("/v2/positions/{symbol}"));
        let resp = self
            .credentials
            .authorize(self.client.delete(url))
            .send()
            .map_err(|e| BrokerError::Request(e.to_string()))?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(symbol, "no open position to liquidate");
            return Ok(());
        }
        if !status.is_success() {
            return Err(BrokerError::Status {
                status: status.as_u16(),
                body: resp.text().unwrap_or_default(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BracketLevels, OrderSide};

    fn handle(order: Order) -> OrderHandle {
        OrderHandle {
            id: OrderId::new("st-SPY-1"),
            order,
        }
    }

    #[test]
    fn market_request_body() {
        let h = handle(Order::market("SPY", 13, OrderSide::Buy));
        let json = serde_json::to_value(OrderRequest::new(&h)).unwrap();
        assert_eq!(json["qty"], "13");
        assert_eq!(json["side"], "buy");
        assert_eq!(json["type"], "market");
        assert_eq!(json["time_in_force"], "day");
        assert!(json.get("order_class").is_none());
        assert!(json.get("take_profit").is_none());
    }

    #[test]
    fn bracket_request_body_quotes_cents() {
        let levels = BracketLevels::for_entry(OrderSide::Sell, 412.347, 0.20, 0.05);
        let h = handle(Order::bracket("SPY", 5, OrderSide::Sell, levels));
        let json = serde_json::to_value(OrderRequest::new(&h)).unwrap();
        assert_eq!(json["order_class"], "bracket");
        assert_eq!(json["time_in_force"], "gtc");
        assert_eq!(json["take_profit"]["limit_price"], "329.88");
        assert_eq!(json["stop_loss"]["stop_price"], "432.96");
        assert_eq!(json["client_order_id"], "st-SPY-1");
    }

    #[test]
    fn zero_quantity_never_gets_an_id() {
        let mut broker = AlpacaBroker::new(AlpacaCredentials::new("k", "s")).unwrap();
        let err = broker
            .create_order(Order::market("SPY", 0, OrderSide::Buy))
            .unwrap_err();
        assert!(matches!(err, BrokerError::Rejected(_)));
    }

    #[test]
    fn client_order_ids_are_unique() {
        let mut broker = AlpacaBroker::new(AlpacaCredentials::new("k", "s")).unwrap();
        let a = broker.create_order(Order::market("SPY", 1, OrderSide::Buy)).unwrap();
        let b = broker.create_order(Order::market("SPY", 1, OrderSide::Buy)).unwrap();
        assert_ne!(a.id, b.id);
    }
}
