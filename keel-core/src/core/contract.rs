//! Contract descriptors and the ticker-index directory
//!
//! Contracts are owned externally (the gateway serves the master table
//! during bootstrap); the engine only resolves them. The directory hands
//! out `Arc<Contract>` so order records can hold the descriptor without
//! copying instrument metadata per order.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Instrument metadata needed by the risk gate.
#[derive(Debug, Clone, PartialEq)]
pub struct Contract {
    /// Dense index assigned by the directory; the key used on the wire
    pub index: u32,
    /// Human ticker, e.g. "cu2512"
    pub ticker: String,
    /// Display name
    pub name: String,
    /// Listing exchange
    pub exchange: String,
    /// Contract multiplier (value of one point of price per lot)
    pub size: f64,
    /// Minimum price increment
    pub price_tick: f64,
    /// Smallest order volume in lots
    pub min_volume: i32,
    /// Largest order volume in lots, 0 = unbounded
    pub max_volume: i32,
}

/// Ticker-index <-> contract lookup.
///
/// Indices are dense and assigned in insertion order, so `by_index` is a
/// plain slot lookup. Re-inserting a known ticker refreshes the
/// descriptor in place and keeps its index.
#[derive(Default)]
pub struct ContractDirectory {
    inner: RwLock<DirectoryInner>,
}

#[derive(Default)]
struct DirectoryInner {
    slots: Vec<Arc<Contract>>,
    tickers: HashMap<String, u32>,
}

impl ContractDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a contract, assigning its dense index. Returns the index.
    pub fn insert(&self, mut contract: Contract) -> u32 {
        let mut inner = self.inner.write();
        if let Some(&index) = inner.tickers.get(&contract.ticker) {
            contract.index = index;
            inner.slots[index as usize] = Arc::new(contract);
            return index;
        }
        let index = inner.slots.len() as u32;
        contract.index = index;
        inner.tickers.insert(contract.ticker.clone(), index);
        inner.slots.push(Arc::new(contract));
        index
    }

    pub fn by_index(&self, index: u32) -> Option<Arc<Contract>> {
        self.inner.read().slots.get(index as usize).cloned()
    }

    pub fn by_ticker(&self, ticker: &str) -> Option<Arc<Contract>> {
        let inner = self.inner.read();
        let index = *inner.tickers.get(ticker)?;
        inner.slots.get(index as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().slots.is_empty()
    }
}
