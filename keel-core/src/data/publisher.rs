//! Market-data egress
//!
//! Ticks the gateway delivers are forwarded under the human ticker
//! name. The publisher is a seam: the engine only needs `publish`, and
//! downstream transport (process-local channel here, external bus in a
//! deployment) stays out of the tick path's way.

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::trace;

use super::tick::TickData;

/// Tick egress seam.
pub trait MdPublisher: Send + Sync {
    fn publish(&self, ticker: &str, tick: &TickData);
}

/// Publisher that drops everything. Default when nothing subscribes.
#[derive(Default)]
pub struct NullPublisher;

impl MdPublisher for NullPublisher {
    fn publish(&self, _ticker: &str, _tick: &TickData) {}
}

/// Channel-backed publisher for in-process consumers (monitors, tests).
pub struct ChannelPublisher {
    tx: Sender<(String, TickData)>,
}

impl ChannelPublisher {
    /// Create a publisher and the receiving end of its stream.
    pub fn channel() -> (Self, Receiver<(String, TickData)>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }
}

impl MdPublisher for ChannelPublisher {
    fn publish(&self, ticker: &str, tick: &TickData) {
        trace!("publish tick {} last={}", ticker, tick.last_price);
        // A gone consumer must not stall the tick path
        let _ = self.tx.try_send((ticker.to_string(), *tick));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_publisher_delivers() {
        let (publisher, rx) = ChannelPublisher::channel();
        let tick = TickData {
            ticker_index: 1,
            last_price: 55.0,
            ..TickData::default()
        };
        publisher.publish("cu2512", &tick);

        let (ticker, seen) = rx.try_recv().unwrap();
        assert_eq!(ticker, "cu2512");
        assert_eq!(seen.last_price, 55.0);
    }

    #[test]
    fn test_publish_survives_dropped_consumer() {
        let (publisher, rx) = ChannelPublisher::channel();
        drop(rx);
        publisher.publish("cu2512", &TickData::default());
    }
}
