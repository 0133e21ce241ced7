use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::cloze::check_cloze_fields;
use super::schema::{Field, Kind, Schema};
use super::{parse_args_at, truncate_chars, Tool};
use crate::anki::{AnkiClient, ContentMap, FieldMap, NewNote};
use crate::error::GatewayError;
use crate::smart::{infer_best_type, map_content};

/// Shared creation path: cloze rule, then a write checked against the live field list.
async fn create_note(client: &AnkiClient, note: &NewNote) -> Result<u64, GatewayError> {
    check_cloze_fields(&note.model_name, &note.fields)?;
    client.add_note_validated(note).await
}

const DYNAMIC_CARD_FIELDS: &[Field] = &[
    Field::required("deckName", Kind::Str, "The deck to add the card to").non_empty(),
    Field::required("modelName", Kind::Str, "The note type to use").non_empty(),
    Field::required("fields", Kind::StrMap, "Field names of the note type mapped to their values")
        .non_empty(),
    Field::optional("tags", Kind::StrList, "Optional tags for the note"),
];

static DYNAMIC_CARD: Schema = Schema::new(DYNAMIC_CARD_FIELDS);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicCardInput {
    pub deck_name: String,
    pub model_name: String,
    pub fields: FieldMap,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl DynamicCardInput {
    fn into_note(self) -> NewNote {
        NewNote {
            deck_name: self.deck_name,
            model_name: self.model_name,
            fields: self.fields,
            tags: self.tags,
        }
    }
}

async fn create_dynamic(client: &AnkiClient, note: NewNote) -> Result<String, GatewayError> {
    let note_id = create_note(client, &note).await?;

    let processed: Vec<String> = note
        .fields
        .iter()
        .map(|(name, value)| format!("{}: \"{}\"", name, truncate_chars(value, 50)))
        .collect();

    Ok(format!(
        "Successfully created \"{}\" card in deck \"{}\" with note ID: {}.\nFields processed: {}.",
        note.model_name,
        note.deck_name,
        note_id,
        if processed.is_empty() { "None".to_string() } else { processed.join(", ") }
    ))
}

pub struct CreateDynamicCard;

#[async_trait]
impl Tool for CreateDynamicCard {
    type Input = DynamicCardInput;

    fn name(&self) -> &'static str {
        "create-dynamic-card"
    }

    fn description(&self) -> &'static str {
        "Create a note of any type by naming the note type and supplying its fields. Use get-model-info first to learn the field names."
    }

    fn schema(&self) -> &'static Schema {
        &DYNAMIC_CARD
    }

    async fn run(&self, client: &AnkiClient, input: DynamicCardInput) -> Result<String, GatewayError> {
        create_dynamic(client, input.into_note()).await
    }
}

pub struct CreateCardsBatch;

#[derive(Debug, Deserialize)]
pub struct CardsBatchInput {
    pub cards: Vec<Value>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase", rename_all_fields = "camelCase")]
enum BatchOutcome {
    Success {
        input_card_index: usize,
        note_id: u64,
        model_name_used: String,
        deck_name: String,
    },
    Error {
        input_card_index: usize,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        model_name_attempted: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        deck_name: Option<String>,
    },
}

impl BatchOutcome {
    fn is_success(&self) -> bool {
        matches!(self, BatchOutcome::Success { .. })
    }
}

async fn create_batch_item(client: &AnkiClient, index: usize, raw: Value) -> BatchOutcome {
    let attempted = |key: &str| raw.get(key).and_then(Value::as_str).map(String::from);
    let model_name_attempted = attempted("modelName");
    let deck_name = attempted("deckName");

    let prefix = format!("cards[{}]", index);
    let note = match parse_args_at::<DynamicCardInput>(&prefix, raw, &DYNAMIC_CARD) {
        Ok(input) => input.into_note(),
        Err(e) => {
            return BatchOutcome::Error {
                input_card_index: index,
                message: e.to_string(),
                model_name_attempted,
                deck_name,
            }
        }
    };

    match create_note(client, &note).await {
        Ok(note_id) => BatchOutcome::Success {
            input_card_index: index,
            note_id,
            model_name_used: note.model_name,
            deck_name: note.deck_name,
        },
        Err(e) => {
            log::warn!("Batch card {} failed: {}", index, e);
            BatchOutcome::Error {
                input_card_index: index,
                message: e.to_string(),
                model_name_attempted: Some(note.model_name),
                deck_name: Some(note.deck_name),
            }
        }
    }
}

#[async_trait]
impl Tool for CreateCardsBatch {
    type Input = CardsBatchInput;

    fn name(&self) -> &'static str {
        "create-cards-batch"
    }

    fn description(&self) -> &'static str {
        "Create several notes in one call. Each card names its deck, note type and fields; a failing card does not stop the others."
    }

    fn schema(&self) -> &'static Schema {
        static SCHEMA: Schema = Schema::new(&[Field::required(
            "cards",
            Kind::Records(DYNAMIC_CARD_FIELDS),
            "Card definitions to create",
        )
        .non_empty()]);
        &SCHEMA
    }

    async fn run(&self, client: &AnkiClient, input: CardsBatchInput) -> Result<String, GatewayError> {
        let total = input.cards.len();
        let mut outcomes = Vec::with_capacity(total);
        for (index, raw) in input.cards.into_iter().enumerate() {
            outcomes.push(create_batch_item(client, index, raw).await);
        }

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        let details = serde_json::to_string_pretty(&outcomes)
            .map_err(|e| GatewayError::Operation(e.to_string()))?;

        Ok(format!(
            "Batch card creation complete. Processed {} card(s). Succeeded: {}, Failed: {}.\n\nDetails (JSON):\n{}",
            total,
            succeeded,
            total - succeeded,
            details
        ))
    }
}

pub struct SmartCreateCard;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartCreateInput {
    pub deck_name: String,
    pub content: ContentMap,
    pub suggested_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[async_trait]
impl Tool for SmartCreateCard {
    type Input = SmartCreateInput;

    fn name(&self) -> &'static str {
        "smart-create-card"
    }

    fn description(&self) -> &'static str {
        "Create a card from free-form content: infers the best note type (or uses the suggested one) and maps the content onto its fields"
    }

    fn schema(&self) -> &'static Schema {
        static SCHEMA: Schema = Schema::new(&[
            Field::required("deckName", Kind::Str, "The deck to add the card to").non_empty(),
            Field::required("content", Kind::StrMap, "Key-value pairs of content to map onto note fields"),
            Field::optional("suggestedType", Kind::Str, "Optional note type to use instead of inferring one"),
            Field::optional("tags", Kind::StrList, "Optional tags for the note"),
        ]);
        &SCHEMA
    }

    async fn run(&self, client: &AnkiClient, input: SmartCreateInput) -> Result<String, GatewayError> {
        let models = client.all_models_info().await?;
        if models.is_empty() {
            return Err(GatewayError::Operation(
                "No Anki models found. Cannot perform smart card creation.".to_string(),
            ));
        }

        let target_name = match input.suggested_type.filter(|s| !s.is_empty()) {
            Some(suggested) => {
                if !models.iter().any(|m| m.name == suggested) {
                    let available: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
                    return Ok(format!(
                        "Suggested note type \"{}\" not found. Available types: {}. Please try again or let the system infer the type.",
                        suggested,
                        available.join(", ")
                    ));
                }
                suggested
            }
            None => {
                let inferred = infer_best_type(&input.content, &models);
                log::info!("Inferred note type {} for smart card", inferred);
                inferred
            }
        };

        let target = models
            .iter()
            .find(|m| m.name == target_name)
            .ok_or_else(|| {
                GatewayError::Operation(format!(
                    "Could not determine or find a valid note type. Attempted type: \"{}\".",
                    target_name
                ))
            })?;

        let fields = map_content(&input.content, target);
        if fields.is_empty() {
            return Ok(format!(
                "Could not map any provided content to the fields of note type \"{}\". Please check content keys or try a different note type/content.",
                target.name
            ));
        }

        create_dynamic(
            client,
            NewNote {
                deck_name: input.deck_name,
                model_name: target.name.clone(),
                fields,
                tags: input.tags,
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anki::fake::FakeAnki;
    use crate::tools::DynTool;
    use serde_json::json;

    async fn seeded() -> (std::sync::Arc<FakeAnki>, AnkiClient) {
        let anki = FakeAnki::new();
        let client = anki.client();
        client.create_deck("Spanish").await.unwrap();
        (anki, client)
    }

    #[tokio::test]
    async fn test_batch_partial_failure() {
        let (anki, client) = seeded().await;
        let text = CreateCardsBatch
            .invoke(
                &client,
                json!({ "cards": [
                    { "deckName": "Spanish", "modelName": "Basic", "fields": { "Front": "uno", "Back": "one" } },
                    { "deckName": "Spanish", "modelName": "Basic", "fields": {} },
                    { "deckName": "Spanish", "modelName": "Cloze", "fields": { "Text": "{{c1::dos}} is two" } }
                ] }),
            )
            .await
            .unwrap();

        assert!(text.starts_with(
            "Batch card creation complete. Processed 3 card(s). Succeeded: 2, Failed: 1."
        ));
        let json_start = text.find('[').unwrap();
        let details: Value = serde_json::from_str(&text[json_start..]).unwrap();
        assert_eq!(details[1]["inputCardIndex"], 1);
        assert_eq!(details[1]["status"], "error");
        assert_eq!(details[1]["modelNameAttempted"], "Basic");
        assert!(details[1]["message"]
            .as_str()
            .unwrap()
            .starts_with("Invalid arguments: cards[1].fields: "));
        assert_eq!(details[0]["status"], "success");
        assert_eq!(details[2]["modelNameUsed"], "Cloze");
        assert_eq!(anki.note_count(), 2);
    }

    #[tokio::test]
    async fn test_batch_item_failures_come_from_every_layer() {
        let (_anki, client) = seeded().await;
        let text = CreateCardsBatch
            .invoke(
                &client,
                json!({ "cards": [
                    { "deckName": "Spanish", "modelName": "Cloze", "fields": { "Text": "plain" } },
                    { "deckName": "Spanish", "modelName": "Basic", "fields": { "Bogus": "x" } },
                    "not an object"
                ] }),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            text,
            GatewayError::Validation(ref issues) if issues.len() == 1 && issues[0].path == "cards[2]"
        ));

        let text = CreateCardsBatch
            .invoke(
                &client,
                json!({ "cards": [
                    { "deckName": "Spanish", "modelName": "Cloze", "fields": { "Text": "plain" } },
                    { "deckName": "Spanish", "modelName": "Basic", "fields": { "Bogus": "x" } },
                    { "deckName": "Nowhere", "modelName": "Basic", "fields": { "Front": "x" } }
                ] }),
            )
            .await
            .unwrap();
        assert!(text.contains("Succeeded: 0, Failed: 3."));
        assert!(text.contains("cloze deletion"));
        assert!(text.contains("Invalid fields for model"));
        assert!(text.contains("deck was not found: Nowhere"));
    }

    #[tokio::test]
    async fn test_dynamic_card_reports_truncated_fields() {
        let (anki, client) = seeded().await;
        let long = "x".repeat(80);
        let text = CreateDynamicCard
            .invoke(
                &client,
                json!({ "deckName": "Spanish", "modelName": "Basic", "fields": { "Front": long, "Back": "b" } }),
            )
            .await
            .unwrap();
        assert!(text.starts_with("Successfully created \"Basic\" card in deck \"Spanish\""));
        assert!(text.contains(&format!("Front: \"{}...\"", "x".repeat(50))));
        assert_eq!(anki.note_count(), 1);
    }

    #[tokio::test]
    async fn test_dynamic_cloze_fallback_to_any_field() {
        let (_anki, client) = seeded().await;
        let err = CreateDynamicCard
            .invoke(
                &client,
                json!({ "deckName": "Spanish", "modelName": "Cloze", "fields": { "Back Extra": "plain" } }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ClozeSyntax { ref field, .. } if field == "Text"));
    }

    #[tokio::test]
    async fn test_smart_create_infers_cloze() {
        let (anki, client) = seeded().await;
        let text = SmartCreateCard
            .invoke(
                &client,
                json!({ "deckName": "Spanish", "content": { "text": "The {{c1::answer}} is here" } }),
            )
            .await
            .unwrap();
        assert!(text.starts_with("Successfully created \"Cloze\" card"), "{}", text);
        assert_eq!(anki.note_count(), 1);
    }

    #[tokio::test]
    async fn test_smart_create_rejects_cloze_without_markers() {
        let (anki, client) = seeded().await;
        let err = SmartCreateCard
            .invoke(
                &client,
                json!({ "deckName": "Spanish", "content": { "text": "no markers here" } }),
            )
            .await
            .unwrap_err();
        assert!(
            matches!(err, GatewayError::ClozeSyntax { ref field, ref received } if field == "Text" && received == "no markers here"),
            "{err:?}"
        );
        assert!(!anki.actions().contains(&"addNote".to_string()));
    }

    #[tokio::test]
    async fn test_smart_create_maps_aliases() {
        let (anki, client) = seeded().await;
        let text = SmartCreateCard
            .invoke(
                &client,
                json!({ "deckName": "Spanish", "content": { "question": "Q", "answer": "A" }, "suggestedType": "Basic" }),
            )
            .await
            .unwrap();
        assert!(text.contains("Back: \"A\""));
        assert!(text.contains("Front: \"Q\""));
        assert_eq!(anki.note_count(), 1);
    }

    #[tokio::test]
    async fn test_smart_create_unknown_suggestion_lists_types() {
        let (anki, client) = seeded().await;
        let text = SmartCreateCard
            .invoke(
                &client,
                json!({ "deckName": "Spanish", "content": { "front": "x" }, "suggestedType": "Nope" }),
            )
            .await
            .unwrap();
        assert!(text.contains("Available types: Basic, Cloze"));
        assert_eq!(anki.note_count(), 0);
    }

    #[tokio::test]
    async fn test_smart_create_unmappable_content_is_not_written() {
        let (anki, client) = seeded().await;
        let text = SmartCreateCard
            .invoke(
                &client,
                json!({ "deckName": "Spanish", "content": { "color": "red" }, "suggestedType": "Basic" }),
            )
            .await
            .unwrap();
        assert!(text.starts_with("Could not map any provided content"));
        assert!(!anki.actions().contains(&"addNote".to_string()));
    }

    #[tokio::test]
    async fn test_smart_create_picks_custom_model() {
        let anki = FakeAnki::new().with_model("Vocabulary", &["Word", "Meaning"]);
        let client = anki.client();
        client.create_deck("Spanish").await.unwrap();

        let text = SmartCreateCard
            .invoke(
                &client,
                json!({ "deckName": "Spanish", "content": { "word": "perro", "meaning": "dog" } }),
            )
            .await
            .unwrap();
        assert!(text.starts_with("Successfully created \"Vocabulary\" card"), "{}", text);
        assert_eq!(anki.note_count(), 1);
    }

    #[tokio::test]
    async fn test_smart_create_without_models() {
        let anki = FakeAnki::new().without_models();
        let err = SmartCreateCard
            .invoke(&anki.client(), json!({ "deckName": "Default", "content": { "front": "x" } }))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("No Anki models found"));
    }
}
