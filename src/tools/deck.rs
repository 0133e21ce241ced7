use async_trait::async_trait;
use serde::Deserialize;

use super::schema::{Field, Kind, Schema};
use super::Tool;
use crate::anki::AnkiClient;
use crate::error::GatewayError;

pub struct CreateDeck;

#[derive(Debug, Deserialize)]
pub struct CreateDeckInput {
    pub name: String,
}

#[async_trait]
impl Tool for CreateDeck {
    type Input = CreateDeckInput;

    fn name(&self) -> &'static str {
        "create-deck"
    }

    fn description(&self) -> &'static str {
        "Create a new Anki deck"
    }

    fn schema(&self) -> &'static Schema {
        static SCHEMA: Schema = Schema::new(&[
            Field::required("name", Kind::Str, "Name of the deck to create").non_empty(),
        ]);
        &SCHEMA
    }

    async fn run(&self, client: &AnkiClient, input: CreateDeckInput) -> Result<String, GatewayError> {
        client.create_deck(&input.name).await?;
        Ok(format!("Successfully created new deck \"{}\"", input.name))
    }
}

pub struct DeleteDeck;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteDeckInput {
    pub deck_name: String,
}

#[async_trait]
impl Tool for DeleteDeck {
    type Input = DeleteDeckInput;

    fn name(&self) -> &'static str {
        "delete-deck"
    }

    fn description(&self) -> &'static str {
        "Delete a deck and all cards in it. This is irreversible; confirm with the user first."
    }

    fn schema(&self) -> &'static Schema {
        static SCHEMA: Schema = Schema::new(&[
            Field::required("deckName", Kind::Str, "Name of the deck to delete").non_empty(),
        ]);
        &SCHEMA
    }

    async fn run(&self, client: &AnkiClient, input: DeleteDeckInput) -> Result<String, GatewayError> {
        client.delete_decks(&[input.deck_name.clone()]).await?;
        Ok(format!(
            "Successfully requested deletion for deck \"{}\". This action is irreversible.",
            input.deck_name
        ))
    }
}

pub struct RenameDeck;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameDeckInput {
    pub current_deck_name: String,
    pub new_deck_name: String,
}

#[async_trait]
impl Tool for RenameDeck {
    type Input = RenameDeckInput;

    fn name(&self) -> &'static str {
        "rename-deck"
    }

    fn description(&self) -> &'static str {
        "Rename a deck by moving its cards to a deck with the new name and deleting the old one"
    }

    fn schema(&self) -> &'static Schema {
        static SCHEMA: Schema = Schema::new(&[
            Field::required("currentDeckName", Kind::Str, "Current name of the deck").non_empty(),
            Field::required("newDeckName", Kind::Str, "New name for the deck").non_empty(),
        ]);
        &SCHEMA
    }

    async fn run(&self, client: &AnkiClient, input: RenameDeckInput) -> Result<String, GatewayError> {
        if input.current_deck_name == input.new_deck_name {
            return Ok("Current deck name and new deck name are the same. No action taken.".to_string());
        }

        let moved = client
            .rename_deck(&input.current_deck_name, &input.new_deck_name)
            .await?;

        Ok(format!(
            "Successfully renamed deck \"{}\" to \"{}\" ({} card(s) moved).",
            input.current_deck_name, input.new_deck_name, moved
        ))
    }
}

pub struct GetDeckStats;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetDeckStatsInput {
    pub deck_name: String,
}

#[async_trait]
impl Tool for GetDeckStats {
    type Input = GetDeckStatsInput;

    fn name(&self) -> &'static str {
        "get-deck-stats"
    }

    fn description(&self) -> &'static str {
        "Get card counts (new, learning, due) for a deck"
    }

    fn schema(&self) -> &'static Schema {
        static SCHEMA: Schema = Schema::new(&[
            Field::required("deckName", Kind::Str, "Name of the deck").non_empty(),
        ]);
        &SCHEMA
    }

    async fn run(&self, client: &AnkiClient, input: GetDeckStatsInput) -> Result<String, GatewayError> {
        let stats = client.deck_stats(&[input.deck_name.clone()]).await?;

        // Keyed by deck ID, so look the deck up by name.
        let deck = stats
            .values()
            .find(|s| s.name == input.deck_name)
            .ok_or_else(|| {
                GatewayError::Operation(format!(
                    "Could not retrieve stats for deck \"{}\".",
                    input.deck_name
                ))
            })?;

        Ok(format!(
            "Stats for deck \"{}\":\n- Total Cards: {}\n- New Cards: {}\n- Learning Cards: {}\n- Due Cards (Reviews): {}",
            input.deck_name,
            deck.total(),
            deck.new_count,
            deck.learn_count,
            deck.review_count
        ))
    }
}
