pub mod graph;
pub mod meta;

pub use graph::{Edge, Graph, Node, ValidationError};
pub use meta::GraphMeta;
