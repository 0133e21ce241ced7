pub mod card;
pub mod cloze;
pub mod create;
pub mod deck;
pub mod guidelines;
pub mod model;
pub mod query;
pub mod schema;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::anki::AnkiClient;
use crate::error::{GatewayError, Issue};
use schema::Schema;

/// An operation exposed to the orchestrator.
///
/// Arguments arrive as raw JSON and are checked against `schema()` before being
/// deserialized into `Input`. Tools are called through [`DynTool`] by the dispatcher.
#[async_trait]
pub trait Tool: Send + Sync {
    type Input: DeserializeOwned + Send;

    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn schema(&self) -> &'static Schema;

    /// Cross-field rules that the schema cannot express.
    fn check(&self, _input: &Self::Input) -> Vec<Issue> {
        Vec::new()
    }

    async fn run(&self, client: &AnkiClient, input: Self::Input) -> Result<String, GatewayError>;
}

/// Discovery metadata for one tool, as served by `tools/list`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Object-safe view of a [`Tool`]: takes raw JSON arguments.
#[async_trait]
pub trait DynTool: Send + Sync {
    fn spec(&self) -> ToolSpec;
    async fn invoke(&self, client: &AnkiClient, args: Value) -> Result<String, GatewayError>;
}

#[async_trait]
impl<T: Tool> DynTool for T {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.schema().json(),
        }
    }

    async fn invoke(&self, client: &AnkiClient, args: Value) -> Result<String, GatewayError> {
        let input: T::Input = parse_args(args, self.schema())?;

        let issues = self.check(&input);
        if !issues.is_empty() {
            return Err(GatewayError::Validation(issues));
        }

        log::info!("Running {}", self.name());
        self.run(client, input).await
    }
}

/// Validate raw arguments and deserialize them. Null arguments and null-valued keys count as absent.
pub fn parse_args<I: DeserializeOwned>(args: Value, schema: &Schema) -> Result<I, GatewayError> {
    parse_args_at("", args, schema)
}

/// [`parse_args`] for a nested object, reporting issue paths under `prefix`.
pub fn parse_args_at<I: DeserializeOwned>(
    prefix: &str,
    args: Value,
    schema: &Schema,
) -> Result<I, GatewayError> {
    let issues = schema.validate_at(prefix, &args)?;
    if !issues.is_empty() {
        return Err(GatewayError::Validation(issues));
    }

    serde_json::from_value(schema::without_nulls(&args))
        .map_err(|e| GatewayError::Validation(vec![Issue::new(prefix, e.to_string())]))
}

/// First `max` characters of `text`, with "..." appended when anything was cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Every tool, in listing order.
pub fn registry() -> Vec<Box<dyn DynTool>> {
    vec![
        Box::new(guidelines::GetOperationalGuidelines),
        Box::new(deck::CreateDeck),
        Box::new(card::CreateCard),
        Box::new(card::UpdateCard),
        Box::new(card::CreateClozeCard),
        Box::new(card::UpdateClozeCard),
        Box::new(create::CreateCardsBatch),
        Box::new(create::CreateDynamicCard),
        Box::new(create::SmartCreateCard),
        Box::new(card::DeleteNote),
        Box::new(query::QueryCards),
        Box::new(deck::DeleteDeck),
        Box::new(deck::RenameDeck),
        Box::new(deck::GetDeckStats),
        Box::new(card::SuspendCards),
        Box::new(card::UnsuspendCards),
        Box::new(card::GetCardInfo),
        Box::new(model::GetModelNames),
        Box::new(model::GetModelInfo),
    ]
}
