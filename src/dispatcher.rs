use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::anki::AnkiClient;
use crate::error::GatewayError;
use crate::tools::{self, DynTool, ToolSpec};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
}

/// The one reply shape every tool call produces, success or failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub content: Vec<ContentBlock>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            is_error: false,
        }
    }

    pub fn failure(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(text)
        }
    }

    pub fn first_text(&self) -> &str {
        match self.content.first() {
            Some(ContentBlock::Text { text }) => text.as_str(),
            None => "",
        }
    }
}

/// Routes tool calls by name. Built once at startup and shared between calls.
pub struct Dispatcher {
    client: AnkiClient,
    tools: Vec<Box<dyn DynTool>>,
    by_name: HashMap<String, usize>,
}

impl Dispatcher {
    pub fn new(client: AnkiClient) -> Self {
        Self::with_tools(client, tools::registry())
    }

    pub fn with_tools(client: AnkiClient, tools: Vec<Box<dyn DynTool>>) -> Self {
        let by_name = tools
            .iter()
            .enumerate()
            .map(|(i, tool)| (tool.spec().name, i))
            .collect();
        Self {
            client,
            tools,
            by_name,
        }
    }

    pub fn client(&self) -> &AnkiClient {
        &self.client
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    /// Run a tool. Never fails: errors become a `"<tool> failed: <reason>"` response.
    pub async fn dispatch(&self, name: &str, args: Value) -> ToolResponse {
        match self.try_dispatch(name, args).await {
            Ok(text) => ToolResponse::text(text),
            Err(e) => {
                log::error!("Tool {} failed: {}", name, e);
                ToolResponse::failure(format!("{} failed: {}", name, e))
            }
        }
    }

    async fn try_dispatch(&self, name: &str, args: Value) -> Result<String, GatewayError> {
        let tool = self
            .by_name
            .get(name)
            .and_then(|&i| self.tools.get(i))
            .ok_or_else(|| GatewayError::UnknownOperation(name.to_string()))?;
        tool.invoke(&self.client, args).await
    }
}
