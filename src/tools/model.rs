use async_trait::async_trait;
use serde::Deserialize;

use super::schema::{Field, Kind, Schema};
use super::{truncate_chars, Tool};
use crate::anki::{AnkiClient, ModelInfo};
use crate::error::GatewayError;

#[derive(Debug, Deserialize)]
pub struct NoInput {}

pub struct GetModelNames;

#[async_trait]
impl Tool for GetModelNames {
    type Input = NoInput;

    fn name(&self) -> &'static str {
        "get-model-names"
    }

    fn description(&self) -> &'static str {
        "List the note types (models) available in the collection"
    }

    fn schema(&self) -> &'static Schema {
        static SCHEMA: Schema = Schema::new(&[]);
        &SCHEMA
    }

    async fn run(&self, client: &AnkiClient, _input: NoInput) -> Result<String, GatewayError> {
        let names = client.model_names().await?;
        if names.is_empty() {
            return Ok("No note types/models found in the Anki collection.".to_string());
        }

        let listing: Vec<String> = names.iter().map(|n| format!("• {}", n)).collect();
        Ok(format!(
            "Available note types/models ({}):\n{}",
            names.len(),
            listing.join("\n")
        ))
    }
}

pub struct GetModelInfo;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetModelInfoInput {
    pub model_name: String,
}

fn snippet(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        truncate_chars(text, limit - 3)
    } else {
        text.to_string()
    }
}

fn format_model(model: &ModelInfo) -> String {
    let mut out = format!(
        "Note Type/Model: {}\nType: {}\n\n",
        model.name,
        if model.is_cloze { "Cloze Deletion" } else { "Standard (Basic, etc.)" }
    );

    out.push_str(&format!("Fields ({}):\n", model.fields.len()));
    if model.fields.is_empty() {
        out.push_str("  (No fields defined for this model)\n\n");
    } else {
        for (i, field) in model.fields.iter().enumerate() {
            out.push_str(&format!("  {}. {}\n", i + 1, field));
        }
        out.push('\n');
    }

    out.push_str(&format!("Templates ({}):\n", model.templates.len()));
    if model.templates.is_empty() {
        out.push_str("  (No templates defined for this model)\n\n");
    } else {
        let templates: Vec<String> = model
            .templates
            .iter()
            .enumerate()
            .map(|(i, t)| {
                format!(
                    "  {}. Name: \"{}\"\n     Q-Format: {}\n     A-Format: {}",
                    i + 1,
                    t.name,
                    snippet(&t.question_format, 60),
                    snippet(&t.answer_format, 60)
                )
            })
            .collect();
        out.push_str(&templates.join("\n\n"));
        out.push_str("\n\n");
    }

    out.push_str("CSS Styling:\n");
    if model.css.trim().is_empty() {
        out.push_str("  (Uses default Anki styling - no custom CSS for this model)");
    } else {
        out.push_str(&format!("  {}", snippet(&model.css, 300)));
    }

    out.trim().to_string()
}

#[async_trait]
impl Tool for GetModelInfo {
    type Input = GetModelInfoInput;

    fn name(&self) -> &'static str {
        "get-model-info"
    }

    fn description(&self) -> &'static str {
        "Show the fields, card templates and styling of a note type"
    }

    fn schema(&self) -> &'static Schema {
        static SCHEMA: Schema = Schema::new(&[
            Field::required("modelName", Kind::Str, "Name of the note type").non_empty(),
        ]);
        &SCHEMA
    }

    async fn run(&self, client: &AnkiClient, input: GetModelInfoInput) -> Result<String, GatewayError> {
        let model = client.model_info(&input.model_name).await?;
        Ok(format_model(&model))
    }
}
