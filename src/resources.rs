//! Decks exposed as readable resources under `anki://deck/<name>`.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;

use crate::anki::{quote_query_term, AnkiClient};
use crate::error::GatewayError;
use crate::tools::query::format_note;

const DECK_URI_PREFIX: &str = "anki://deck/";
const MIME_TYPE: &str = "text/plain";

/// Characters left as-is in a URI component.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    pub uri: String,
    pub name: String,
    pub description: String,
    pub mime_type: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContent {
    pub uri: String,
    pub mime_type: &'static str,
    pub text: String,
}

pub fn deck_uri(deck_name: &str) -> String {
    format!("{}{}", DECK_URI_PREFIX, utf8_percent_encode(deck_name, COMPONENT))
}

/// Deck name addressed by `uri`, or `None` when it is not a deck URI.
pub fn deck_from_uri(uri: &str) -> Option<String> {
    let encoded = uri.strip_prefix(DECK_URI_PREFIX)?;
    if encoded.is_empty() {
        return None;
    }
    percent_decode_str(encoded)
        .decode_utf8()
        .ok()
        .map(|name| name.into_owned())
}

pub async fn list_decks(client: &AnkiClient) -> Result<Vec<ResourceInfo>, GatewayError> {
    let decks = client.deck_names().await?;
    Ok(decks
        .into_iter()
        .map(|deck| ResourceInfo {
            uri: deck_uri(&deck),
            description: format!("Anki deck: {}", deck),
            name: deck,
            mime_type: MIME_TYPE,
        })
        .collect())
}

/// Render every note of a deck as plain text.
pub async fn read_deck(client: &AnkiClient, uri: &str, deck_name: &str) -> Result<ResourceContent, GatewayError> {
    let note_ids = client
        .find_notes(&format!("deck:{}", quote_query_term(deck_name)))
        .await?;
    log::debug!("Found {} notes in deck {}", note_ids.len(), deck_name);

    let body = if note_ids.is_empty() {
        "No notes found in this deck.".to_string()
    } else {
        let notes = client.notes_info(&note_ids).await?;
        notes
            .iter()
            .map(|note| format_note(note, None))
            .collect::<Vec<_>>()
            .join("\n\n---\n\n")
    };

    Ok(ResourceContent {
        uri: uri.to_string(),
        mime_type: MIME_TYPE,
        text: format!("Deck: {}\n\n{}", deck_name, body),
    })
}
