pub mod multi_partition;
pub mod session;

pub use multi_partition::{event_channel, ConsumerEvent, ConsumerHandle, MultiPartitionConsumer};
pub use session::{format_bytes, parse_start_offset, ConsumerSession};
