pub mod acl;
pub mod admin;
pub mod driver;
pub mod duration;
pub mod memory;
pub mod types;

pub use admin::ClusterAdmin;
pub use driver::{ClusterDriver, PartitionCursor};
pub use memory::MemoryCluster;
pub use types::{ConsumedMessage, StartOffset};
