//! Market data: tick structure, latest-tick snapshot, egress publisher.

pub mod publisher;
pub mod snapshot;
pub mod tick;

pub use publisher::{ChannelPublisher, MdPublisher, NullPublisher};
pub use snapshot::MdSnapshot;
pub use tick::{TickData, TICK_DEPTH};
