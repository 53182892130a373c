//! Vector collection and the versioned active index

pub mod index;
pub mod store;

pub use index::{ActiveIndex, EmbedderFactory, IndexHandle};
pub use store::{HnswParams, VectorStore};
