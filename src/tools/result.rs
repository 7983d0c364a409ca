//! Tool execution results.

use serde::{Deserialize, Serialize};

use crate::types::ToolResultContent;

/// What a tool hands back to the agent loop.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub content: Vec<ToolResultContent>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolResultContent::text(text)],
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolResultContent::text(message)],
            is_error: true,
        }
    }

    /// Serialize a JSON value as the text payload.
    pub fn json(value: &serde_json::Value) -> Self {
        Self::text(value.to_string())
    }

    pub fn with_media(mut self, data: impl Into<String>, media_type: impl Into<String>) -> Self {
        self.content.push(ToolResultContent::Media {
            data: data.into(),
            media_type: media_type.into(),
        });
        self
    }

    /// Concatenated text items.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|item| match item {
                ToolResultContent::Text { text } => Some(text.as_str()),
                ToolResultContent::Media { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
