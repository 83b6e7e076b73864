//! REST brokerage adapter against a mock HTTP server.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use serde_json::json;
use tranche_engine::application::ports::{
    BrokerError, BrokerPort, CallPriority, ExchangeGateway, GatewayError, SubmitOrderRequest,
};
use tranche_engine::domain::shared::{ExternalOrderId, InstrumentId, Money, TradeId};
use tranche_engine::domain::trade_execution::{OrderSide, RemoteOrderState};
use tranche_engine::infrastructure::broker::{RestBrokerAdapter, RestBrokerConfig};
use tranche_engine::infrastructure::gateway::{GatewaySettings, RateLimitedGateway, RetryPolicy};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn adapter(server: &MockServer) -> RestBrokerAdapter {
    let mut config = RestBrokerConfig::paper("key", "secret");
    config.trading_base_url = server.uri();
    config.data_base_url = server.uri();
    config.timeout = Duration::from_secs(2);
    RestBrokerAdapter::new(config).unwrap()
}

fn order_json(status: &str, filled_qty: &str, price: Option<&str>) -> serde_json::Value {
    json!({
        "id": "ord-1",
        "client_order_id": "trade-1",
        "status": status,
        "filled_qty": filled_qty,
        "filled_avg_price": price,
    })
}

#[tokio::test]
async fn submits_notional_market_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/orders"))
        .and(header("APCA-API-KEY-ID", "key"))
        .and(header("APCA-API-SECRET-KEY", "secret"))
        .and(body_partial_json(json!({
            "symbol": "ETH/USD",
            "notional": "100",
            "side": "buy",
            "type": "market",
            "time_in_force": "gtc",
            "client_order_id": "trade-1",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(order_json("accepted", "0", None)))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = adapter(&server)
        .submit_order(SubmitOrderRequest {
            client_order_id: TradeId::new("trade-1"),
            instrument: InstrumentId::new("ETH-USD"),
            side: OrderSide::Buy,
            notional: Money::new(dec!(100)),
        })
        .await
        .unwrap();

    assert_eq!(snapshot.external_order_id, ExternalOrderId::new("ord-1"));
    assert_eq!(snapshot.state, RemoteOrderState::Open);
}

#[tokio::test]
async fn reads_filled_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/orders/ord-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(order_json("filled", "0.05", Some("2000"))),
        )
        .mount(&server)
        .await;

    let snapshot = adapter(&server)
        .get_order(&ExternalOrderId::new("ord-1"))
        .await
        .unwrap();
    assert_eq!(snapshot.state, RemoteOrderState::Filled);
    assert_eq!(snapshot.filled_units, dec!(0.05));
    assert_eq!(snapshot.average_fill_price, Some(dec!(2000)));
}

#[tokio::test]
async fn balances_come_from_account_and_positions() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/account"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "cash": "1234.50" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/positions/ETHUSD"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "qty": "0.75" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/positions/SOLUSD"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "message": "position does not exist" })),
        )
        .mount(&server)
        .await;

    let adapter = adapter(&server);
    assert_eq!(adapter.get_balance("USD").await.unwrap(), dec!(1234.50));
    assert_eq!(adapter.get_balance("ETH").await.unwrap(), dec!(0.75));
    assert_eq!(adapter.get_balance("SOL").await.unwrap(), dec!(0));
}

#[tokio::test]
async fn reads_latest_trade_price() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1beta3/crypto/us/latest/trades"))
        .and(query_param("symbols", "ETH/USD"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "trades": {
                "ETH/USD": { "p": 2012.5, "t": "2026-03-02T12:00:00Z" }
            }
        })))
        .mount(&server)
        .await;

    let ticker = adapter(&server)
        .get_ticker(&InstrumentId::new("ETH-USD"))
        .await
        .unwrap();
    assert_eq!(ticker.price, dec!(2012.5));
}

#[tokio::test]
async fn maps_error_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/orders"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "3")
                .set_body_json(json!({ "message": "too many requests" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/orders/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/account"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let adapter = adapter(&server);
    let err = adapter
        .submit_order(SubmitOrderRequest {
            client_order_id: TradeId::new("trade-1"),
            instrument: InstrumentId::new("ETH-USD"),
            side: OrderSide::Sell,
            notional: Money::new(dec!(50)),
        })
        .await
        .unwrap_err();
    assert_eq!(
        err,
        BrokerError::RateLimited {
            retry_after: Some(Duration::from_secs(3))
        }
    );

    let err = adapter.get_order(&ExternalOrderId::new("gone")).await.unwrap_err();
    assert!(matches!(err, BrokerError::OrderNotFound { order_id } if order_id == "gone"));

    let err = adapter.get_balance("USD").await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn gateway_retries_transient_remote_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/account"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/account"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "cash": "500" })))
        .mount(&server)
        .await;

    let gateway = RateLimitedGateway::new(
        Arc::new(adapter(&server)),
        GatewaySettings {
            retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(10),
                max_backoff: Duration::from_millis(50),
                backoff_multiplier: 2.0,
                jitter_factor: 0.0,
            },
            ..GatewaySettings::default()
        },
    );

    let balance = gateway.get_balance("USD", CallPriority::High).await.unwrap();
    assert_eq!(balance, dec!(500));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
}

#[tokio::test]
async fn gateway_does_not_retry_rejections() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/orders"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({ "message": "insufficient balance" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let gateway = RateLimitedGateway::new(Arc::new(adapter(&server)), GatewaySettings::default());
    let err = gateway
        .submit_order(
            SubmitOrderRequest {
                client_order_id: TradeId::new("trade-9"),
                instrument: InstrumentId::new("ETH-USD"),
                side: OrderSide::Buy,
                notional: Money::new(dec!(100)),
            },
            CallPriority::Critical,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GatewayError::Broker(BrokerError::OrderRejected { .. })
    ));
}
