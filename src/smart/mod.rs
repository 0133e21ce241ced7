//! Heuristics that turn free-form content into a note of a concrete type.

pub mod inference;
pub mod mapping;

pub use inference::infer_best_type;
pub use mapping::map_content;
