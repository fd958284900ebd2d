pub mod graph;
pub mod index;
pub mod snapshot;
pub mod store;

pub use graph::{Graph, GraphError};
pub use snapshot::{GraphSnapshot, SnapshotError};
pub use store::GraphStore;
