//! A client library bridging an algorithmic-trading engine to OKX's v5
//! REST and WebSocket APIs: signed request transport, a checksummed
//! order-book ladder, a generic REST-baseline/WS-delta synchronizer, the
//! order pipeline (including the market-buy-as-FOK transformation), the
//! execution reconciler, history retrieval and the subscription manager,
//! bound together by [`client::OkxGateway`].

pub mod book;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod market_state;
pub mod pipeline;
pub mod reconciler;
pub mod rest;
pub mod subscription;
pub mod sync;
pub mod types;
pub mod wire;
pub mod ws;

// ---- Top-level re-exports for ergonomic usage ----

pub use client::OkxGateway;
pub use config::{AccountMode, Environment, OkxConfig, OkxConfigBuilder};
pub use error::{OkxError, Result};

pub use book::{DepthView, Ladder};
pub use events::EventSinks;
pub use history::{fetch_history, HistoryRequest};
pub use market_state::MarketState;
pub use pipeline::{market_buy_fok, OrderPipeline};
pub use reconciler::Reconciler;
pub use rest::{Envelope, OrderAck, RestClient};
pub use subscription::{DataKind, DataRequest, SubscriptionManager, TickType};
pub use sync::{ChangeEvent, ResyncPolicy, SyncDelta, SyncPhase, SyncState, Synchronizer};

pub use types::{
    AccountHolding, Balance, BookLevel, BrokerageMessage, CandleResolution, ClientOrderIdFactory,
    ExecutionEvent, ExecutionStatus, InstrumentInfo, InstrumentRecord, InstrumentRegistry, Order,
    OrderMutation, OrderType, OrderbookFrame, OpenOrderView, PageResult, PagedQuery, PriceLimit,
    SecurityCategory, Side, Ticker, Trade, TimeInForce,
};

pub use ws::events::{OrderPush, WsArg, WsEvent};
pub use ws::{ChannelHandler, Session};
