use async_trait::async_trait;

use super::model::NoInput;
use super::schema::Schema;
use super::Tool;
use crate::anki::AnkiClient;
use crate::error::GatewayError;

const GUIDELINES: &str = r#"Operational guidelines for the Anki tools

Workflow for card creation:

1. Check the user's setup
   * Call `get-model-names` to see the available note types.
   * For specialised content, call `get-model-info` on the relevant custom types.
   * Tell the user which custom note types apply.

2. Pick the tool
   * Several cards from a document or list: `create-cards-batch`.
   * A single card: `create-dynamic-card` (note type given) or `smart-create-card` (note type inferred).
   * Plain Basic or Cloze cards when explicitly asked for: `create-card` or `create-cloze-card`.

3. Good practice
   * Split complex content into small, focused cards.
   * Map content onto the exact field names of custom note types (see `get-model-info`).
   * Tag cards so they can be found later.
   * Confirm the deck name when the user did not give one.
   * Summarise the plan before a large batch.

Key rules:
- Always check the available note types first (`get-model-names`).
- Prefer a specialised note type over Basic when one fits.
- Read a note type's fields with `get-model-info` before calling `create-dynamic-card` with it.
- Use `create-cards-batch` when creating more than one card.
- Cloze text must contain at least one deletion such as {{c1::answer}}.
- Confirm with the user before `delete-note`, `delete-deck` or `rename-deck`.
- Keep `query-cards` searches specific to avoid very broad results.
- Give `smart-create-card` as much structured content as possible.
- Report errors to the user together with a suggested fix.
"#;

pub struct GetOperationalGuidelines;

#[async_trait]
impl Tool for GetOperationalGuidelines {
    type Input = NoInput;

    fn name(&self) -> &'static str {
        "get-operational-guidelines"
    }

    fn description(&self) -> &'static str {
        "Return the usage guidelines for these tools. Call this once before creating cards."
    }

    fn schema(&self) -> &'static Schema {
        static SCHEMA: Schema = Schema::new(&[]);
        &SCHEMA
    }

    async fn run(&self, _client: &AnkiClient, _input: NoInput) -> Result<String, GatewayError> {
        Ok(GUIDELINES.trim().to_string())
    }
}
