//! The subscription manager (C8): maps an engine-side data request to an
//! OKX channel and shares a pool of WebSocket connections across many
//! instruments, opening a new connection only once the pool is saturated.

use std::sync::Mutex;

use crate::error::{OkxError, Result};
use crate::types::enums::CandleResolution;
use crate::ws::subscriber::ConnectionSlots;
use crate::ws::{ChannelHandler, Session};

/// Which side of a tick-by-tick feed the engine wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickType {
    Quote,
    Trade,
}

/// An engine-side market-data request: `(instrument, resolution, tick-type)`
/// collapsed into one of three shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataKind {
    Tick(TickType),
    OrderbookDepth,
    Bar(CandleResolution),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRequest {
    pub symbol: String,
    pub kind: DataKind,
}

/// Maps a request to its OKX channel name.
pub fn pick_channel(kind: &DataKind) -> String {
    match kind {
        DataKind::Tick(TickType::Quote) => "tickers".to_string(),
        DataKind::Tick(TickType::Trade) => "trades".to_string(),
        DataKind::OrderbookDepth => "books".to_string(),
        DataKind::Bar(resolution) => format!("candle{resolution}"),
    }
}

const DEFAULT_CONNECTION_CAPACITY: usize = 50;

struct PoolEntry {
    session: Session,
    slots: ConnectionSlots,
}

/// Owns a pool of public-endpoint [`Session`]s, each capped at `M`
/// subscriptions (default 50). New subscriptions reuse a connection with
/// room before opening another.
pub struct SubscriptionManager {
    ws_base_url: String,
    capacity_per_connection: usize,
    pool: Mutex<Vec<PoolEntry>>,
}

impl SubscriptionManager {
    pub fn new(ws_base_url: impl Into<String>) -> Self {
        Self {
            ws_base_url: ws_base_url.into(),
            capacity_per_connection: DEFAULT_CONNECTION_CAPACITY,
            pool: Mutex::new(Vec::new()),
        }
    }

    #[cfg(test)]
    fn with_capacity(ws_base_url: impl Into<String>, capacity: usize) -> Self {
        Self {
            ws_base_url: ws_base_url.into(),
            capacity_per_connection: capacity,
            pool: Mutex::new(Vec::new()),
        }
    }

    /// Subscribes `handler` to `request`, reusing a pooled connection with
    /// spare capacity or opening a new one.
    pub fn subscribe(&self, request: &DataRequest, handler: ChannelHandler) -> Result<()> {
        let channel = pick_channel(&request.kind);
        let mut pool = self.pool.lock().unwrap();

        for entry in pool.iter_mut() {
            if entry.slots.try_add(&channel, &request.symbol) {
                entry.session.on_channel(channel.clone(), handler);
                entry.session.subscribe(&channel, Some(&request.symbol))?;
                return Ok(());
            }
        }

        let mut session = Session::public(self.ws_base_url.clone());
        session.connect();
        let mut slots = ConnectionSlots::new(self.capacity_per_connection);
        if !slots.try_add(&channel, &request.symbol) {
            return Err(OkxError::Validation(
                "new connection could not accept a single subscription".into(),
            ));
        }
        session.on_channel(channel.clone(), handler);
        session.subscribe(&channel, Some(&request.symbol))?;
        pool.push(PoolEntry { session, slots });
        Ok(())
    }

    pub fn unsubscribe(&self, request: &DataRequest) -> Result<()> {
        let channel = pick_channel(&request.kind);
        let mut pool = self.pool.lock().unwrap();
        for entry in pool.iter_mut() {
            if !entry.slots.contains(&channel, &request.symbol) {
                continue;
            }
            entry.session.unsubscribe(&channel, Some(&request.symbol))?;
            entry.slots.remove(&channel, &request.symbol);
        }
        Ok(())
    }

    pub fn connection_count(&self) -> usize {
        self.pool.lock().unwrap().len()
    }

    /// Closes every pooled connection. Called from
    /// [`OkxGateway::shutdown`](crate::client::OkxGateway::shutdown) once
    /// the drain window has elapsed.
    pub fn close_all(&self) {
        let mut pool = self.pool.lock().unwrap();
        for entry in pool.iter_mut() {
            entry.session.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn channel_table_matches_spec() {
        assert_eq!(pick_channel(&DataKind::Tick(TickType::Quote)), "tickers");
        assert_eq!(pick_channel(&DataKind::Tick(TickType::Trade)), "trades");
        assert_eq!(pick_channel(&DataKind::OrderbookDepth), "books");
        assert_eq!(pick_channel(&DataKind::Bar(CandleResolution::OneMinute)), "candle1m");
    }

    #[tokio::test]
    async fn saturated_connection_causes_a_new_one_to_open() {
        let manager = SubscriptionManager::with_capacity("ws://127.0.0.1:0", 1);
        let noop: ChannelHandler = Arc::new(|_, _| {});
        manager
            .subscribe(
                &DataRequest { symbol: "BTC-USDT".into(), kind: DataKind::Tick(TickType::Quote) },
                noop.clone(),
            )
            .unwrap();
        manager
            .subscribe(
                &DataRequest { symbol: "ETH-USDT".into(), kind: DataKind::Tick(TickType::Quote) },
                noop,
            )
            .unwrap();
        assert_eq!(manager.connection_count(), 2);
    }
}
