pub mod action;
pub mod chunk;
pub mod client;
pub mod types;

#[cfg(test)]
pub mod fake;

pub use client::{quote_query_term, AnkiClient};
pub use types::{
    is_cloze_model, CardInfo, ContentMap, FieldMap, ModelInfo, NewNote, NoteInfo, BASIC_MODEL,
    CLOZE_MODEL,
};
