//! The engine-facing façade (C10): binds the REST transport, the
//! subscription manager, the order pipeline and the execution reconciler
//! into the single entry point an algorithmic-trading engine talks to.
//! A thin struct of collaborators plus delegate methods, in the same
//! shape as `nord::client::Nord`, generalized from Solana program
//! accounts to OKX's REST/WS surface.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::OkxConfig;
use crate::error::Result;
use crate::events::EventSinks;
use crate::history::{self, HistoryRequest};
use crate::market_state::MarketState;
use crate::pipeline::OrderPipeline;
use crate::reconciler::Reconciler;
use crate::rest::endpoints;
use crate::rest::RestClient;
use crate::subscription::{DataRequest, SubscriptionManager};
use crate::types::account::{AccountHolding, Balance, OpenOrderView, Position};
use crate::types::execution::{BrokerageMessage, ExecutionEvent};
use crate::types::instrument::{InstrumentInfo, InstrumentRecord, InstrumentRegistry};
use crate::types::market::Candle;
use crate::types::order::Order;
use crate::types::orderbook::{FrameKind, OrderbookFrame};
use crate::types::price_limit::PriceLimit;
use crate::ws::events::{OrderPush, WsArg};
use crate::ws::{ChannelHandler, Session};

/// Latest account-wide state observed over the private `account`/
/// `positions` channels, kept purely as a cache — the façade's
/// `get_cash_balance`/`get_account_holdings` read REST directly, matching
/// the "list" snapshot the engine expects, but callers that want the
/// latest push without a round-trip can read this instead.
#[derive(Debug, Default)]
struct AccountCache {
    balances: RwLock<Vec<Balance>>,
    positions: RwLock<Vec<Position>>,
}

/// The OKX gateway: one instance per credential set. Owns the REST
/// client, the shared market state (order-book + price-limit
/// synchronizers), the pooled public subscription manager, a single
/// private session, the order pipeline and the execution reconciler.
pub struct OkxGateway {
    rest: Arc<RestClient>,
    instruments: Arc<InstrumentRegistry>,
    market: Arc<MarketState>,
    subscriptions: SubscriptionManager,
    pipeline: OrderPipeline,
    reconciler: Arc<Reconciler>,
    events: EventSinks,
    account_cache: Arc<AccountCache>,
    private_session: Session,
    /// Cancelled by [`shutdown`](OkxGateway::shutdown); checked at the
    /// entry points that accept new engine work (`place_order`,
    /// `subscribe`) so a gateway mid-drain rejects new requests instead of
    /// racing the session teardown below it.
    shutdown: CancellationToken,
}

impl OkxGateway {
    /// Validates configuration, checks clock skew against the exchange,
    /// seeds the instrument registry (from a pre-parsed CSV database,
    /// enriched with a live refresh), and opens the private session used
    /// for order/account/position/price-limit pushes.
    pub async fn connect(
        config: OkxConfig,
        instrument_records: impl IntoIterator<Item = InstrumentRecord>,
    ) -> Result<Self> {
        let rest = Arc::new(RestClient::new(config.clone())?);
        rest.check_clock_skew().await?;

        let instruments = Arc::new(InstrumentRegistry::load_from(instrument_records));
        if let Ok(fetched) = endpoints::get_instruments(&rest, "SPOT").await {
            instruments.refresh(fetched);
        }

        let market = Arc::new(MarketState::new(rest.clone()));
        let events = EventSinks::new();
        let reconciler = Arc::new(Reconciler::new(events.clone()));
        let account_cache = Arc::new(AccountCache::default());
        let pipeline = OrderPipeline::new(
            rest.clone(),
            config.account_mode,
            market.clone(),
            "okx-gw-",
            events.clone(),
        );

        let subscriptions = SubscriptionManager::new(config.environment.ws_base_url());

        let mut private_session = Session::private(config.environment.ws_base_url(), config.clone());
        wire_private_handlers(&private_session, &market, &reconciler, &account_cache);
        private_session.connect();
        private_session.subscribe("orders", None)?;
        private_session.subscribe("account", None)?;
        private_session.subscribe("positions", None)?;

        Ok(Self {
            rest,
            instruments,
            market,
            subscriptions,
            pipeline,
            reconciler,
            events,
            account_cache,
            private_session,
            shutdown: CancellationToken::new(),
        })
    }

    /// Resolves a symbol's instrument properties (identity lean/brokerage
    /// mapping, round-tripped through the instrument registry).
    pub fn instrument(&self, symbol: &str) -> Result<InstrumentInfo> {
        self.instruments.resolve(symbol)
    }

    /// Always returns `true`; failures reach the caller only through the
    /// execution-event stream.
    pub async fn place_order(&self, order: &mut Order) -> bool {
        if self.shutdown.is_cancelled() {
            self.events.emit_message(BrokerageMessage {
                code: "GATEWAY_SHUTTING_DOWN".to_string(),
                message: "gateway is draining, no new orders accepted".to_string(),
                engine_order_id: Some(order.engine_order_id.clone()),
                recoverable: false,
            });
            return true;
        }
        let placed = self.pipeline.place_order(order).await;
        if let Some(exchange_order_id) = &order.exchange_order_id {
            self.reconciler.register_order(exchange_order_id, &order.engine_order_id);
            self.market.subscribe_orderbook(&order.symbol);
            self.ensure_price_limit_feed(&order.symbol);
        }
        placed
    }

    pub async fn update_order(&self, order: &Order, new_size: Option<Decimal>, new_price: Option<Decimal>) -> bool {
        self.pipeline.amend_order(order, new_size, new_price).await
    }

    pub async fn cancel_order(&self, order: &Order) -> bool {
        self.pipeline.cancel_order(order).await
    }

    pub async fn get_open_orders(&self) -> Result<Vec<OpenOrderView>> {
        endpoints::get_open_orders(&self.rest).await
    }

    pub async fn get_cash_balance(&self) -> Result<Vec<Balance>> {
        endpoints::get_balances(&self.rest).await
    }

    /// A mix of balances and positions, matching whichever the configured
    /// account mode actually carries (spot accounts hold no positions).
    pub async fn get_account_holdings(&self) -> Result<Vec<AccountHolding>> {
        let balances = endpoints::get_balances(&self.rest).await?;
        let positions = endpoints::get_positions(&self.rest).await?;
        Ok(balances
            .into_iter()
            .map(AccountHolding::Balance)
            .chain(positions.into_iter().map(AccountHolding::Position))
            .collect())
    }

    /// Returns `None` for requests `fetch_history` can't service (quote
    /// ticks and sub-minute bars).
    pub async fn get_history(&self, request: &HistoryRequest) -> Option<Vec<Candle>> {
        if !history::resolution_is_supported(request.resolution) {
            return None;
        }
        history::fetch_history(&self.rest, request).await.ok()
    }

    pub fn subscribe(&self, request: &DataRequest, handler: ChannelHandler) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(crate::error::OkxError::Validation(
                "gateway is shutting down, no new subscriptions accepted".into(),
            ));
        }
        let handler = if matches!(request.kind, crate::subscription::DataKind::OrderbookDepth) {
            self.market.subscribe_orderbook(&request.symbol);
            self.ensure_price_limit_feed(&request.symbol);
            self.feed_orderbook_ladder(handler)
        } else {
            handler
        };
        self.subscriptions.subscribe(request, handler)
    }

    /// Registers `symbol` with the price-limit synchronizer (REST
    /// baseline) and issues the `price-limit` WS subscribe for it on the
    /// private session, so the `wire_private_handlers` handler registered
    /// at `connect()` actually receives pushes — the private session only
    /// ever subscribes the fixed orders/account/positions set at connect
    /// time, since price-limit is instrument-scoped and the instrument
    /// isn't known until an order or subscription names one.
    /// `Session::subscribe` tracks live subscriptions in a `HashSet`, so a
    /// repeat call for a symbol already subscribed is a harmless no-op
    /// resend rather than a duplicate registration.
    fn ensure_price_limit_feed(&self, symbol: &str) {
        self.market.subscribe_price_limit(symbol);
        let _ = self.private_session.subscribe("price-limit", Some(symbol));
    }

    /// Wraps a caller's channel handler so every `books` push is also fed
    /// into the order-book synchronizer (C5) before the caller sees it,
    /// keeping the ladder the FOK transformation reads live without
    /// requiring the caller to do that wiring itself.
    fn feed_orderbook_ladder(&self, handler: ChannelHandler) -> ChannelHandler {
        let market = self.market.clone();
        std::sync::Arc::new(move |arg: WsArg, value: Value| {
            if let (Some(inst_id), Ok(frame)) = (
                arg.inst_id.clone(),
                serde_json::from_value::<OrderbookFrame>(value.clone()),
            ) {
                let is_snapshot = arg.action == Some(FrameKind::Snapshot);
                market.on_orderbook_push(&inst_id, frame, is_snapshot);
            }
            handler(arg, value);
        })
    }

    pub fn unsubscribe(&self, request: &DataRequest) -> Result<()> {
        self.subscriptions.unsubscribe(request)
    }

    pub fn subscribe_executions(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.events.subscribe_executions()
    }

    pub fn subscribe_messages(&self) -> broadcast::Receiver<BrokerageMessage> {
        self.events.subscribe_messages()
    }

    pub fn cached_balances(&self) -> Vec<Balance> {
        self.account_cache.balances.read().unwrap().clone()
    }

    pub fn cached_positions(&self) -> Vec<Position> {
        self.account_cache.positions.read().unwrap().clone()
    }

    /// Signals a graceful shutdown: cancels the token checked by
    /// `place_order`/`subscribe` so the gateway accepts no further engine
    /// work, waits up to `drain` for in-flight REST calls to settle, then
    /// tears down the private session and every pooled public connection.
    /// Mirrors the background-task cancellation in `AccountStream`, driven
    /// here from the façade the engine actually holds rather than from
    /// inside each session.
    pub async fn shutdown(&mut self, drain: Duration) {
        self.shutdown.cancel();
        tokio::time::sleep(drain).await;
        self.private_session.close();
        self.subscriptions.close_all();
    }
}

fn wire_private_handlers(
    session: &Session,
    market: &Arc<MarketState>,
    reconciler: &Arc<Reconciler>,
    account_cache: &Arc<AccountCache>,
) {
    let reconciler = reconciler.clone();
    session.on_channel(
        "orders",
        Arc::new(move |_arg: WsArg, value: Value| {
            if let Ok(push) = serde_json::from_value::<OrderPush>(value) {
                reconciler.handle(push);
            }
        }),
    );

    let account_cache_for_balance = account_cache.clone();
    session.on_channel(
        "account",
        Arc::new(move |_arg: WsArg, value: Value| {
            if let Ok(balance) = serde_json::from_value::<Balance>(value) {
                let mut balances = account_cache_for_balance.balances.write().unwrap();
                balances.retain(|b| b.currency != balance.currency);
                balances.push(balance);
            }
        }),
    );

    let account_cache_for_positions = account_cache.clone();
    session.on_channel(
        "positions",
        Arc::new(move |_arg: WsArg, value: Value| {
            if let Ok(position) = serde_json::from_value::<Position>(value) {
                let mut positions = account_cache_for_positions.positions.write().unwrap();
                positions.retain(|p| p.symbol != position.symbol);
                positions.push(position);
            }
        }),
    );

    let market_for_price_limit = market.clone();
    session.on_channel(
        "price-limit",
        Arc::new(move |arg: WsArg, value: Value| {
            let Some(inst_id) = arg.inst_id else { return };
            if let Ok(limit) = serde_json::from_value::<PriceLimit>(value) {
                market_for_price_limit.on_price_limit_push(&inst_id, limit);
            }
        }),
    );
}
