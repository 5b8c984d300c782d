//! The on-disk data catalog: where each dataset lives and how its files
//! are named.

pub mod facets;
pub mod filename;
pub mod listing;
pub mod naming;
pub mod traverse;

pub use facets::{experiment, Aggregation, Facets, Level, Product};
pub use filename::DatasetFileName;
pub use traverse::{Leaf, Traversal};
