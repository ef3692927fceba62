//! Latest-tick snapshot cache
//!
//! One entry per ticker index, replaced wholesale on every tick. The
//! risk gate reads it on the pre-trade path; the tick path never takes
//! the engine lock, so this map has its own lock.

use parking_lot::RwLock;
use std::collections::HashMap;

use super::tick::TickData;

/// Latest tick per ticker index.
#[derive(Default)]
pub struct MdSnapshot {
    ticks: RwLock<HashMap<u32, TickData>>,
}

impl MdSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for the tick's instrument.
    pub fn update(&self, tick: TickData) {
        self.ticks.write().insert(tick.ticker_index, tick);
    }

    /// Latest tick for an instrument, if one has arrived this session.
    pub fn get(&self, ticker_index: u32) -> Option<TickData> {
        self.ticks.read().get(&ticker_index).copied()
    }

    pub fn len(&self) -> usize {
        self.ticks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_replaces_wholesale() {
        let snapshot = MdSnapshot::new();

        let mut tick = TickData {
            ticker_index: 2,
            last_price: 100.0,
            ..TickData::default()
        };
        tick.bid[0] = 99.0;
        snapshot.update(tick);

        let mut newer = TickData {
            ticker_index: 2,
            last_price: 101.0,
            ..TickData::default()
        };
        newer.ask[0] = 102.0;
        snapshot.update(newer);

        let seen = snapshot.get(2).unwrap();
        assert_eq!(seen.last_price, 101.0);
        // Old bid must not leak through: replacement, not merge
        assert_eq!(seen.bid[0], 0.0);
        assert!(snapshot.get(9).is_none());
    }
}
