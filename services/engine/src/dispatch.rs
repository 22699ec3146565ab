//! Request envelope dispatch
//!
//! Requests arrive as `{responseId, eventType, data}` envelopes and are
//! answered with `{responseId, status, message, retryable, data}`. A
//! payload that fails to decode is marked retryable so the caller can
//! resubmit after a schema mismatch clears; every business-rule
//! rejection is final.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use types::errors::{EngineError, LedgerError, RequestError};
use types::ids::{MarketId, Symbol, UserId};
use types::market::Overview;
use types::numeric::Price;

use crate::engine::{Engine, OrderRequest};

/// Inbound envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuePayload {
    pub response_id: String,
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

/// Outbound envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueResponse {
    pub response_id: String,
    pub status: ResponseStatus,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Value::is_null")]
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

impl QueueResponse {
    fn success(response_id: String, message: impl Into<String>, data: Value) -> Self {
        Self {
            response_id,
            status: ResponseStatus::Success,
            message: message.into(),
            retryable: false,
            data,
        }
    }

    fn failure(response_id: String, err: &EngineError) -> Self {
        Self {
            response_id,
            status: ResponseStatus::Error,
            message: err.to_string(),
            retryable: err.retryable(),
            data: diagnostic_data(err),
        }
    }
}

/// Structured detail for rejections the caller can surface to a user.
fn diagnostic_data(err: &EngineError) -> Value {
    match err {
        EngineError::Ledger(LedgerError::InsufficientFunds {
            required,
            available,
        }) => json!({ "required": required, "available": available }),
        EngineError::Ledger(LedgerError::InsufficientShares {
            required,
            available,
        }) => json!({ "required": required, "available": available }),
        _ => Value::Null,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserData {
    user_id: UserId,
    phone: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitBalanceData {
    user_id: UserId,
    amount: Decimal,
    #[serde(default)]
    locked: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AmountData {
    user_id: UserId,
    amount: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserData {
    user_id: UserId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerificationUpdate {
    user_id: UserId,
    #[serde(default)]
    kyc_status: Option<types::account::VerificationStatus>,
    #[serde(default)]
    payment_status: Option<types::account::VerificationStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateMarketData {
    market_id: MarketId,
    symbol: Symbol,
    #[serde(default)]
    title: String,
    #[serde(default)]
    category_id: String,
    #[serde(default)]
    thumbnail: String,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    source_of_truth: String,
    #[serde(default)]
    rules: String,
    #[serde(default)]
    eos: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolData {
    symbol: Symbol,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddLiquidityData {
    user_id: UserId,
    symbol: Symbol,
    price_yes: Price,
    price_no: Price,
    quantity_yes: u64,
    quantity_no: u64,
}

fn decode<T: serde::de::DeserializeOwned>(data: Value) -> Result<T, EngineError> {
    serde_json::from_value(data)
        .map_err(|err| RequestError::InvalidPayload(err.to_string()).into())
}

fn parse_date(field: &str, value: Option<String>) -> Result<Option<DateTime<Utc>>, EngineError> {
    match value {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|_| RequestError::InvalidDate(format!("{field}: {raw}")).into()),
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, EngineError> {
    serde_json::to_value(value).map_err(|err| EngineError::Internal {
        message: err.to_string(),
    })
}

/// Decode one raw envelope and dispatch it.
pub async fn dispatch_raw(engine: &Engine, raw: &str) -> QueueResponse {
    match serde_json::from_str::<QueuePayload>(raw) {
        Ok(payload) => dispatch(engine, payload).await,
        Err(err) => {
            warn!(%err, "Undecodable request envelope");
            QueueResponse::failure(
                String::new(),
                &RequestError::InvalidPayload(err.to_string()).into(),
            )
        }
    }
}

/// Route one decoded envelope to its operation.
pub async fn dispatch(engine: &Engine, payload: QueuePayload) -> QueueResponse {
    let QueuePayload {
        response_id,
        event_type,
        data,
    } = payload;

    info!(%response_id, %event_type, "Dispatching request");

    let result = route(engine, &event_type, data).await;
    match result {
        Ok((message, data)) => QueueResponse::success(response_id, message, data),
        Err(err) => {
            warn!(%response_id, %event_type, %err, "Request rejected");
            QueueResponse::failure(response_id, &err)
        }
    }
}

async fn route(
    engine: &Engine,
    event_type: &str,
    data: Value,
) -> Result<(String, Value), EngineError> {
    match event_type {
        "CREATE_USER" => {
            let req: CreateUserData = decode(data)?;
            engine.ledger().create_account(req.user_id, req.phone)?;
            Ok(("User created".to_string(), Value::Null))
        }
        "INIT_BALANCE" => {
            let req: InitBalanceData = decode(data)?;
            engine
                .ledger()
                .init_balance(&req.user_id, req.amount, req.locked)?;
            Ok(("Balance initialized".to_string(), Value::Null))
        }
        "DEPOSIT_BALANCE" => {
            let req: AmountData = decode(data)?;
            let balance = engine.ledger().deposit(&req.user_id, req.amount)?;
            Ok((
                "Deposit processed".to_string(),
                json!({ "balance": balance }),
            ))
        }
        "WITHDRAW_BALANCE" => {
            let req: AmountData = decode(data)?;
            let balance = engine.ledger().withdraw(&req.user_id, req.amount)?;
            Ok((
                "Withdrawal processed".to_string(),
                json!({ "balance": balance }),
            ))
        }
        "REFERRAL_CREDIT" => {
            let req: AmountData = decode(data)?;
            let balance = engine.ledger().credit_bonus(&req.user_id, req.amount)?;
            Ok((
                "Referral bonus credited".to_string(),
                json!({ "balance": balance }),
            ))
        }
        "VERIFICATION_STATUS_UPDATE" => {
            let req: VerificationUpdate = decode(data)?;
            engine
                .ledger()
                .set_verification(&req.user_id, req.kyc_status, req.payment_status)?;
            Ok(("Verification status updated".to_string(), Value::Null))
        }
        "GET_BALANCE" => {
            let req: UserData = decode(data)?;
            let wallet = engine.ledger().balance_of(&req.user_id)?;
            Ok(("Balance fetched".to_string(), to_value(&wallet)?))
        }
        "CREATE_MARKET" => {
            let req: CreateMarketData = decode(data)?;
            let overview = Overview {
                title: req.title,
                category_id: req.category_id,
                thumbnail: req.thumbnail,
                start_date: parse_date("startDate", req.start_date)?,
                end_date: parse_date("endDate", req.end_date)?,
                source_of_truth: req.source_of_truth,
                rules: req.rules,
                eos: req.eos,
            };
            engine.create_market(req.market_id, req.symbol, overview)?;
            Ok(("Market created".to_string(), Value::Null))
        }
        "GET_MARKET_WITH_SYMBOL" => {
            let req: SymbolData = decode(data)?;
            let details = engine.market_details(&req.symbol).await?;
            Ok(("Market fetched".to_string(), to_value(&details)?))
        }
        "PLACE_ORDER" => {
            let req: OrderRequest = decode(data)?;
            let ack = engine.place_order(req).await?;
            Ok(("Order processed".to_string(), to_value(&ack)?))
        }
        "ADD_LIQUIDITY" => {
            let req: AddLiquidityData = decode(data)?;
            let acks = engine
                .add_liquidity(
                    req.user_id,
                    req.symbol,
                    req.price_yes,
                    req.price_no,
                    req.quantity_yes,
                    req.quantity_no,
                )
                .await?;
            Ok(("Liquidity added".to_string(), to_value(&acks)?))
        }
        other => Err(RequestError::UnknownEventType(other.to_string()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::events::{EventSink, MemoryPublisher, MemorySink, StreamPublisher};
    use std::sync::Arc;

    fn engine() -> Engine {
        Engine::new(
            EngineConfig::default(),
            Arc::new(MemorySink::new()) as Arc<dyn EventSink>,
            Arc::new(MemoryPublisher::new()) as Arc<dyn StreamPublisher>,
        )
    }

    fn payload(event_type: &str, data: Value) -> QueuePayload {
        QueuePayload {
            response_id: "r-1".to_string(),
            event_type: event_type.to_string(),
            data,
        }
    }

    #[tokio::test]
    async fn test_create_user_then_deposit() {
        let engine = engine();

        let response = dispatch(
            &engine,
            payload("CREATE_USER", json!({ "userId": "u1", "phone": "+1555" })),
        )
        .await;
        assert_eq!(response.status, ResponseStatus::Success);

        let response = dispatch(
            &engine,
            payload("DEPOSIT_BALANCE", json!({ "userId": "u1", "amount": "100" })),
        )
        .await;
        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.data["balance"], json!("100"));
    }

    #[tokio::test]
    async fn test_malformed_payload_is_retryable() {
        let engine = engine();

        let response = dispatch(
            &engine,
            payload("CREATE_USER", json!({ "phone": "+1555" })),
        )
        .await;

        assert_eq!(response.status, ResponseStatus::Error);
        assert!(response.retryable);
    }

    #[tokio::test]
    async fn test_business_rejection_is_final_with_detail() {
        let engine = engine();
        dispatch(
            &engine,
            payload("CREATE_USER", json!({ "userId": "u1", "phone": "+1555" })),
        )
        .await;

        let response = dispatch(
            &engine,
            payload(
                "WITHDRAW_BALANCE",
                json!({ "userId": "u1", "amount": "50" }),
            ),
        )
        .await;

        // Unverified accounts cannot withdraw
        assert_eq!(response.status, ResponseStatus::Error);
        assert!(!response.retryable);
    }

    #[tokio::test]
    async fn test_insufficient_funds_carries_diagnostics() {
        let engine = engine();
        dispatch(
            &engine,
            payload("CREATE_USER", json!({ "userId": "u1", "phone": "+1555" })),
        )
        .await;
        dispatch(
            &engine,
            payload(
                "VERIFICATION_STATUS_UPDATE",
                json!({ "userId": "u1", "kycStatus": "VERIFIED", "paymentStatus": "VERIFIED" }),
            ),
        )
        .await;
        dispatch(
            &engine,
            payload("DEPOSIT_BALANCE", json!({ "userId": "u1", "amount": "20" })),
        )
        .await;

        let response = dispatch(
            &engine,
            payload(
                "WITHDRAW_BALANCE",
                json!({ "userId": "u1", "amount": "50" }),
            ),
        )
        .await;

        assert_eq!(response.status, ResponseStatus::Error);
        assert!(!response.retryable);
        assert_eq!(response.data["required"], json!("50"));
        assert_eq!(response.data["available"], json!("20"));
    }

    #[tokio::test]
    async fn test_unknown_event_type() {
        let engine = engine();
        let response = dispatch(&engine, payload("NOT_A_THING", Value::Null)).await;

        assert_eq!(response.status, ResponseStatus::Error);
        assert!(!response.retryable);
        assert!(response.message.contains("NOT_A_THING"));
    }

    #[tokio::test]
    async fn test_create_market_rejects_bad_date() {
        let engine = engine();
        let response = dispatch(
            &engine,
            payload(
                "CREATE_MARKET",
                json!({
                    "marketId": "mkt-1",
                    "symbol": "RAIN",
                    "startDate": "yesterday"
                }),
            ),
        )
        .await;

        assert_eq!(response.status, ResponseStatus::Error);
        assert!(!response.retryable);
        assert!(response.message.contains("yesterday"));
    }

    #[tokio::test]
    async fn test_full_order_round_trip() {
        let engine = engine();
        for (user, funds) in [("admin", "0"), ("alice", "500")] {
            dispatch(
                &engine,
                payload(
                    "CREATE_USER",
                    json!({ "userId": user, "phone": format!("+1555{user}") }),
                ),
            )
            .await;
            if funds != "0" {
                dispatch(
                    &engine,
                    payload(
                        "DEPOSIT_BALANCE",
                        json!({ "userId": user, "amount": funds }),
                    ),
                )
                .await;
            }
        }
        dispatch(
            &engine,
            payload(
                "CREATE_MARKET",
                json!({
                    "marketId": "mkt-1",
                    "title": "Will it rain tomorrow?",
                    "symbol": "RAIN",
                    "categoryId": "weather",
                    "thumbnail": "https://cdn.example.com/rain.png",
                    "startDate": "2026-01-01T00:00:00Z",
                    "sourceOfTruth": "weather service",
                    "rules": "resolves yes if it rains",
                    "eos": "end of day"
                }),
            ),
        )
        .await;
        dispatch(
            &engine,
            payload(
                "ADD_LIQUIDITY",
                json!({
                    "userId": "admin",
                    "symbol": "RAIN",
                    "priceYes": "6.0",
                    "priceNo": "4.0",
                    "quantityYes": 100,
                    "quantityNo": 100
                }),
            ),
        )
        .await;

        let response = dispatch(
            &engine,
            payload(
                "PLACE_ORDER",
                json!({
                    "userId": "alice",
                    "symbol": "RAIN",
                    "side": "YES",
                    "action": "BUY",
                    "orderType": "LIMIT",
                    "price": "6.0",
                    "quantity": 10
                }),
            ),
        )
        .await;

        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.data["filled"], json!(10));
        assert_eq!(response.data["remaining"], json!(0));

        let market = dispatch(
            &engine,
            payload("GET_MARKET_WITH_SYMBOL", json!({ "symbol": "RAIN" })),
        )
        .await;
        assert_eq!(market.status, ResponseStatus::Success);
        assert_eq!(market.data["totalTraders"], json!(2));
        assert_eq!(market.data["activities"].as_array().unwrap().len(), 1);
        assert_eq!(
            market.data["overview"]["title"],
            json!("Will it rain tomorrow?")
        );
        assert_eq!(market.data["overview"]["categoryId"], json!("weather"));
        assert_eq!(
            market.data["overview"]["thumbnail"],
            json!("https://cdn.example.com/rain.png")
        );
    }

    #[tokio::test]
    async fn test_place_order_accepts_documented_field_names() {
        let engine = engine();
        dispatch(
            &engine,
            payload("CREATE_USER", json!({ "userId": "u1", "phone": "+1555" })),
        )
        .await;
        dispatch(
            &engine,
            payload("DEPOSIT_BALANCE", json!({ "userId": "u1", "amount": "100" })),
        )
        .await;
        dispatch(
            &engine,
            payload("CREATE_MARKET", json!({ "marketId": "mkt-1", "symbol": "RAIN" })),
        )
        .await;

        let response = dispatch(
            &engine,
            payload(
                "PLACE_ORDER",
                json!({
                    "userId": "u1",
                    "marketId": "mkt-1",
                    "symbol": "RAIN",
                    "side": "NO",
                    "price": "3.5",
                    "action": "BUY",
                    "orderType": "LIMIT",
                    "quantity": 4,
                    "role": "USER"
                }),
            ),
        )
        .await;

        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.data["filled"], json!(0));
        assert_eq!(response.data["rested"], json!(true));
    }

    #[tokio::test]
    async fn test_undecodable_envelope() {
        let engine = engine();
        let response = dispatch_raw(&engine, "{not json").await;

        assert_eq!(response.status, ResponseStatus::Error);
        assert!(response.retryable);
        assert!(response.response_id.is_empty());
    }
}
