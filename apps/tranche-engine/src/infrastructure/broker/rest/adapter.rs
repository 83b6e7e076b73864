//! REST broker adapter implementing `BrokerPort`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;

use crate::application::ports::{
    BrokerError, BrokerPort, OrderSnapshot, SubmitOrderRequest, Ticker,
};
use crate::domain::shared::{ExternalOrderId, InstrumentId, Timestamp};
use crate::domain::trade_execution::OrderSide;
use crate::infrastructure::gateway::is_retryable_status;

use super::api_types::{
    AccountResponse, ErrorResponse, LatestTradesResponse, OrderRequest, OrderResponse,
    PositionResponse, pair_symbol,
};
use super::config::RestBrokerConfig;

/// Brokerage adapter over an Alpaca-compatible REST API.
#[derive(Debug, Clone)]
pub struct RestBrokerAdapter {
    client: Client,
    config: RestBrokerConfig,
}

impl RestBrokerAdapter {
    /// Build the HTTP client.
    ///
    /// # Errors
    ///
    /// `AuthenticationFailed` when credentials are empty, `ConnectionError`
    /// when the client cannot be built.
    pub fn new(config: RestBrokerConfig) -> Result<Self, BrokerError> {
        if config.api_key.is_empty() || config.api_secret.is_empty() {
            return Err(BrokerError::AuthenticationFailed);
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BrokerError::ConnectionError {
                message: e.to_string(),
            })?;
        Ok(Self { client, config })
    }

    fn to_order_request(request: &SubmitOrderRequest) -> OrderRequest {
        OrderRequest {
            symbol: pair_symbol(&request.instrument),
            notional: request.notional.amount().normalize().to_string(),
            side: match request.side {
                OrderSide::Buy => "buy",
                OrderSide::Sell => "sell",
            },
            order_type: "market",
            time_in_force: "gtc",
            client_order_id: request.client_order_id.as_str().to_string(),
        }
    }

    fn authorised(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("APCA-API-KEY-ID", &self.config.api_key)
            .header("APCA-API-SECRET-KEY", &self.config.api_secret)
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, BrokerError> {
        let response = self.authorised(builder).send().await.map_err(|e| {
            if e.is_timeout() {
                BrokerError::Timeout
            } else {
                BrokerError::ConnectionError {
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| BrokerError::ConnectionError {
                    message: e.to_string(),
                })?;
            return serde_json::from_str(&body).map_err(|e| BrokerError::InvalidResponse {
                message: e.to_string(),
            });
        }

        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map_or(body, |err| err.message);

        Err(map_status(status, message, retry_after))
    }
}

/// Map a non-success HTTP status to a broker error.
fn map_status(status: StatusCode, message: String, retry_after: Option<Duration>) -> BrokerError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => BrokerError::RateLimited { retry_after },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BrokerError::AuthenticationFailed,
        StatusCode::NOT_FOUND => BrokerError::OrderNotFound { order_id: message },
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            BrokerError::OrderRejected { reason: message }
        }
        s if is_retryable_status(s.as_u16()) => {
            BrokerError::ConnectionError {
                message: format!("{}: {message}", s.as_u16()),
            }
        }
        s => BrokerError::Unknown {
            message: format!("{}: {message}", s.as_u16()),
        },
    }
}

fn parse_decimal(raw: &str, field: &str) -> Result<Decimal, BrokerError> {
    raw.parse().map_err(|_| BrokerError::InvalidResponse {
        message: format!("unparseable {field}: {raw}"),
    })
}

#[async_trait]
impl BrokerPort for RestBrokerAdapter {
    async fn submit_order(
        &self,
        request: SubmitOrderRequest,
    ) -> Result<OrderSnapshot, BrokerError> {
        let body = Self::to_order_request(&request);
        tracing::info!(
            client_order_id = %request.client_order_id,
            symbol = %body.symbol,
            side = body.side,
            notional = %body.notional,
            "Submitting order"
        );
        let url = format!("{}/v2/orders", self.config.trading_base_url);
        let response: OrderResponse = self.send(self.client.post(url).json(&body)).await?;
        response.to_snapshot()
    }

    async fn get_order(&self, order_id: &ExternalOrderId) -> Result<OrderSnapshot, BrokerError> {
        let url = format!("{}/v2/orders/{}", self.config.trading_base_url, order_id);
        let response: OrderResponse = self
            .send(self.client.get(url))
            .await
            .map_err(|e| match e {
                BrokerError::OrderNotFound { .. } => BrokerError::OrderNotFound {
                    order_id: order_id.to_string(),
                },
                other => other,
            })?;
        response.to_snapshot()
    }

    async fn get_balance(&self, asset: &str) -> Result<Decimal, BrokerError> {
        // The account's cash is the USD balance; anything else is a position
        if asset.eq_ignore_ascii_case("USD") {
            let url = format!("{}/v2/account", self.config.trading_base_url);
            let account: AccountResponse = self.send(self.client.get(url)).await?;
            return parse_decimal(&account.cash, "cash");
        }

        let symbol = format!("{}USD", asset.to_uppercase());
        let url = format!("{}/v2/positions/{symbol}", self.config.trading_base_url);
        match self.send::<PositionResponse>(self.client.get(url)).await {
            Ok(position) => parse_decimal(&position.qty, "qty"),
            Err(BrokerError::OrderNotFound { .. }) => Ok(Decimal::ZERO),
            Err(e) => Err(e),
        }
    }

    async fn get_ticker(&self, instrument: &InstrumentId) -> Result<Ticker, BrokerError> {
        let symbol = pair_symbol(instrument);
        let url = format!(
            "{}/v1beta3/crypto/us/latest/trades",
            self.config.data_base_url
        );
        let response: LatestTradesResponse = self
            .send(self.client.get(url).query(&[("symbols", symbol.as_str())]))
            .await?;
        let trade = response
            .trades
            .get(&symbol)
            .ok_or_else(|| BrokerError::InvalidResponse {
                message: format!("no trade for {symbol}"),
            })?;
        let at = Timestamp::parse(&trade.time).map_err(|e| BrokerError::InvalidResponse {
            message: format!("bad trade timestamp: {e}"),
        })?;
        Ok(Ticker {
            instrument: instrument.clone(),
            price: trade.price,
            at,
        })
    }
}
