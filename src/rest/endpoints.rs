//! Endpoint-specific request/response shapes built on top of
//! [`super::RestClient`]. Each function maps one OKX v5 REST endpoint to
//! the crate's own types, so callers (the façade, the order pipeline, the
//! history fetcher, the synchronizer's baseline fetchers) never see raw
//! envelopes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::AccountMode;
use crate::error::{OkxError, Result};
use crate::rest::rate_limit::EndpointGroup;
use crate::rest::{OrderAck, RestClient};
use crate::types::account::{Balance, OpenOrderView, Position};
use crate::types::enums::{CandleResolution, OrderType, Side, TimeInForce};
use crate::types::instrument::ExchangeInstrument;
use crate::types::market::Candle;
use crate::types::orderbook::OrderbookFrame;
use crate::types::price_limit::PriceLimit;

/// Body of a place/amend-order request. `td_mode` is derived from the
/// gateway's configured [`AccountMode`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderBody {
    pub inst_id: String,
    pub td_mode: &'static str,
    pub side: Side,
    pub ord_type: &'static str,
    pub sz: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub px: Option<String>,
    pub cl_ord_id: String,
}

fn ord_type_wire(order_type: OrderType, time_in_force: TimeInForce) -> &'static str {
    match (order_type, time_in_force) {
        (_, TimeInForce::PostOnly) => "post_only",
        (OrderType::Market, _) => "market",
        (_, TimeInForce::ImmediateOrCancel) => "ioc",
        (_, TimeInForce::FillOrKill) => "fok",
        (OrderType::Limit, TimeInForce::GoodTilCanceled) => "limit",
        (OrderType::StopMarket, _) => "limit", // unreachable: rejected upstream
    }
}

impl PlaceOrderBody {
    pub fn new(
        inst_id: impl Into<String>,
        account_mode: AccountMode,
        side: Side,
        order_type: OrderType,
        time_in_force: TimeInForce,
        size: Decimal,
        price: Option<Decimal>,
        client_order_id: impl Into<String>,
    ) -> Self {
        Self {
            inst_id: inst_id.into(),
            td_mode: account_mode.trade_mode(),
            side,
            ord_type: ord_type_wire(order_type, time_in_force),
            sz: size.to_string(),
            px: price.map(|p| p.to_string()),
            cl_ord_id: client_order_id.into(),
        }
    }
}

pub async fn place_order(rest: &RestClient, body: &PlaceOrderBody) -> Result<OrderAck> {
    let acks: Vec<OrderAck> = rest
        .signed_post(EndpointGroup::Orders, "/api/v5/trade/order", body)
        .await?;
    acks.into_iter()
        .next()
        .ok_or_else(|| OkxError::Envelope {
            code: "0".into(),
            msg: "empty place-order response".into(),
        })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmendOrderBody {
    pub inst_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ord_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cl_ord_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_sz: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_px: Option<String>,
}

pub async fn amend_order(rest: &RestClient, body: &AmendOrderBody) -> Result<OrderAck> {
    let acks: Vec<OrderAck> = rest
        .signed_post(EndpointGroup::Orders, "/api/v5/trade/amend-order", body)
        .await?;
    acks.into_iter()
        .next()
        .ok_or_else(|| OkxError::Envelope {
            code: "0".into(),
            msg: "empty amend-order response".into(),
        })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderBody {
    pub inst_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ord_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cl_ord_id: Option<String>,
}

pub async fn cancel_order(rest: &RestClient, body: &CancelOrderBody) -> Result<OrderAck> {
    let acks: Vec<OrderAck> = rest
        .signed_post(EndpointGroup::Orders, "/api/v5/trade/cancel-order", body)
        .await?;
    acks.into_iter()
        .next()
        .ok_or_else(|| OkxError::Envelope {
            code: "0".into(),
            msg: "empty cancel-order response".into(),
        })
}

pub async fn get_open_orders(rest: &RestClient) -> Result<Vec<OpenOrderView>> {
    rest.signed_get(EndpointGroup::Account, "/api/v5/trade/orders-pending", &[])
        .await
}

pub async fn get_balances(rest: &RestClient) -> Result<Vec<Balance>> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct BalanceRow {
        details: Vec<Balance>,
    }
    let rows: Vec<BalanceRow> = rest
        .signed_get(EndpointGroup::Account, "/api/v5/account/balance", &[])
        .await?;
    Ok(rows.into_iter().flat_map(|r| r.details).collect())
}

pub async fn get_positions(rest: &RestClient) -> Result<Vec<Position>> {
    rest.signed_get(EndpointGroup::Account, "/api/v5/account/positions", &[])
        .await
}

/// Dynamically refreshes the instrument registry from the exchange's own
/// list.
pub async fn get_instruments(rest: &RestClient, inst_type: &str) -> Result<Vec<ExchangeInstrument>> {
    rest.public_get("/api/v5/public/instruments", &[("instType", inst_type)])
        .await
}

/// The REST baseline for the order-book synchronizer: a full-depth
/// snapshot, tagged as such regardless of what the wire frame's own
/// `FrameKind` would say (the REST endpoint doesn't carry one).
pub async fn get_orderbook_snapshot(rest: &RestClient, inst_id: &str, depth: u32) -> Result<OrderbookFrame> {
    let rows: Vec<OrderbookFrame> = rest
        .public_get("/api/v5/market/books", &[("instId", inst_id), ("sz", &depth.to_string())])
        .await?;
    rows.into_iter().next().ok_or_else(|| OkxError::InsufficientData(inst_id.to_string()))
}

pub async fn get_price_limit(rest: &RestClient, inst_id: &str) -> Result<PriceLimit> {
    let rows: Vec<PriceLimit> = rest
        .public_get("/api/v5/public/price-limit", &[("instId", inst_id)])
        .await?;
    Ok(rows.into_iter().next().unwrap_or_else(PriceLimit::disabled))
}

/// One paginated page of history candles. OKX returns rows newest-first;
/// `after` is an exclusive upper timestamp bound for the backward walk.
pub async fn get_history_candles(
    rest: &RestClient,
    inst_id: &str,
    resolution: CandleResolution,
    after: Option<i64>,
    limit: u16,
) -> Result<Vec<Candle>> {
    let bar = resolution.to_string();
    let limit_str = limit.to_string();
    let mut query = vec![("instId", inst_id), ("bar", bar.as_str()), ("limit", limit_str.as_str())];
    let after_str;
    if let Some(after) = after {
        after_str = after.to_string();
        query.push(("after", after_str.as_str()));
    }
    let rows: Vec<Vec<String>> = rest.public_get("/api/v5/market/history-candles", &query).await?;
    Ok(rows
        .iter()
        .filter_map(|row| Candle::from_wire_row(row, resolution))
        .collect())
}
