pub mod graph;

pub use graph::Edge;
pub use graph::InMemoryGraphStore;
pub use graph::Vertex;
