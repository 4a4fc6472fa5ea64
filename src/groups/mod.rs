pub mod lag;
pub mod snapshot;

pub use lag::{LagCalculator, PartitionOffsetPair};
pub use snapshot::{ConsumerGroupSnapshot, GroupInspector};
