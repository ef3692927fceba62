//! Portfolio: per-ticker positions with frozen-volume accounting
//!
//! Two halves per instrument (long/short). Open orders grow the half on
//! their own side when they fill; close orders freeze volume on the
//! opposite half when sent, release it on cancel, and consume it on
//! fill. Only the risk manager's hooks and the query-trade replay
//! mutate this state, always under the engine lock.

pub mod account;

pub use account::Account;

use std::collections::HashMap;
use tracing::warn;

use crate::core::types::{Direction, Offset};

/// One half of a position.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionDetail {
    /// Lots currently held
    pub holdings: i32,
    /// Lots carried over from yesterday
    pub yd_holdings: i32,
    /// Average open price of the holdings
    pub cost_price: f64,
    /// Lots reserved by pending close orders
    pub frozen: i32,
    /// Unrealized PnL as reported by the gateway
    pub float_pnl: f64,
}

impl PositionDetail {
    /// Lots a close order may still claim.
    #[inline]
    pub fn closable(&self) -> i32 {
        self.holdings - self.frozen
    }
}

/// Long and short halves for one instrument.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub ticker_index: u32,
    pub long_pos: PositionDetail,
    pub short_pos: PositionDetail,
}

impl Position {
    pub fn new(ticker_index: u32) -> Self {
        Self {
            ticker_index,
            ..Self::default()
        }
    }

    /// The half an order with this direction/offset acts on: open acts
    /// on its own side, close reduces the opposite side.
    pub fn half(&self, direction: Direction, offset: Offset) -> &PositionDetail {
        match effective_side(direction, offset) {
            Direction::Buy => &self.long_pos,
            Direction::Sell => &self.short_pos,
        }
    }

    pub fn half_mut(&mut self, direction: Direction, offset: Offset) -> &mut PositionDetail {
        match effective_side(direction, offset) {
            Direction::Buy => &mut self.long_pos,
            Direction::Sell => &mut self.short_pos,
        }
    }
}

#[inline]
fn effective_side(direction: Direction, offset: Offset) -> Direction {
    if offset.is_close() {
        direction.opposite()
    } else {
        direction
    }
}

/// All positions of one account.
#[derive(Default)]
pub struct Portfolio {
    account_id: u64,
    positions: HashMap<u32, Position>,
}

impl Portfolio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_account(&mut self, account_id: u64) {
        self.account_id = account_id;
    }

    pub fn account_id(&self) -> u64 {
        self.account_id
    }

    /// Install a position wholesale (bootstrap query path).
    pub fn set_position(&mut self, position: Position) {
        self.positions.insert(position.ticker_index, position);
    }

    pub fn get(&self, ticker_index: u32) -> Option<&Position> {
        self.positions.get(&ticker_index)
    }

    fn entry(&mut self, ticker_index: u32) -> &mut Position {
        self.positions
            .entry(ticker_index)
            .or_insert_with(|| Position::new(ticker_index))
    }

    /// Lots a close order in this direction may still claim.
    pub fn closable(&self, ticker_index: u32, direction: Direction, offset: Offset) -> i32 {
        self.positions
            .get(&ticker_index)
            .map(|p| p.half(direction, offset).closable())
            .unwrap_or(0)
    }

    /// Adjust the frozen volume a pending close order holds. Positive
    /// delta on send, negative on cancel/reject.
    pub fn update_pending(
        &mut self,
        ticker_index: u32,
        direction: Direction,
        offset: Offset,
        volume_delta: i32,
    ) {
        if !offset.is_close() {
            return;
        }
        let detail = self.entry(ticker_index).half_mut(direction, offset);
        let next = detail.frozen + volume_delta;
        if next < 0 {
            warn!(
                "portfolio: frozen underflow on ticker {} ({} {} delta {})",
                ticker_index, direction, offset, volume_delta
            );
        }
        detail.frozen = next.max(0);
    }

    /// Apply a fill: open fills grow holdings and refresh the average
    /// cost, close fills consume frozen volume and shrink holdings.
    pub fn update_traded(
        &mut self,
        ticker_index: u32,
        direction: Direction,
        offset: Offset,
        volume: i32,
        price: f64,
    ) {
        let detail = self.entry(ticker_index).half_mut(direction, offset);
        if offset.is_close() {
            detail.frozen = (detail.frozen - volume).max(0);
            if detail.holdings < volume {
                warn!(
                    "portfolio: close fill over holdings on ticker {} ({} of {})",
                    ticker_index, volume, detail.holdings
                );
            }
            detail.holdings = (detail.holdings - volume).max(0);
            detail.yd_holdings = detail.yd_holdings.min(detail.holdings);
        } else {
            let old = detail.holdings;
            detail.holdings += volume;
            if detail.holdings > 0 {
                detail.cost_price = (detail.cost_price * old as f64 + price * volume as f64)
                    / detail.holdings as f64;
            }
        }
    }

    /// Replay one of today's fills during bootstrap, before the
    /// portfolio goes live. Prices are unknown here; only volumes move.
    pub fn update_on_query_trade(
        &mut self,
        ticker_index: u32,
        direction: Direction,
        offset: Offset,
        volume: i32,
    ) {
        let detail = self.entry(ticker_index).half_mut(direction, offset);
        if offset.is_close() {
            detail.holdings = (detail.holdings - volume).max(0);
            detail.yd_holdings = detail.yd_holdings.min(detail.holdings);
        } else {
            detail.holdings += volume;
        }
    }
}
