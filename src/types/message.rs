//! Message types for model communication.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelMessage {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

impl ModelMessage {
    /// Create a message from explicit parts.
    pub fn new(role: Role, content: Vec<ContentPart>) -> Self {
        Self { role, content }
    }

    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![ContentPart::text(text)])
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentPart::text(text)])
    }

    /// Create an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![ContentPart::text(text)])
    }

    /// Create a tool message carrying one or more results.
    pub fn tool(results: Vec<ToolResultPart>) -> Self {
        Self::new(
            Role::Tool,
            results.into_iter().map(ContentPart::ToolResult).collect(),
        )
    }

    /// Create a user message with an attached file or image.
    pub fn user_with_file(text: impl Into<String>, file: FileContent) -> Self {
        Self::new(
            Role::User,
            vec![ContentPart::text(text), ContentPart::File(file)],
        )
    }

    /// Extract the text content, concatenating all text parts.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Extract tool calls from this message.
    pub fn tool_calls(&self) -> Vec<&AgentToolCall> {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::ToolCall(tc) => Some(tc),
                _ => None,
            })
            .collect()
    }

    /// Extract tool results from this message.
    pub fn tool_results(&self) -> Vec<&ToolResultPart> {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::ToolResult(result) => Some(result),
                _ => None,
            })
            .collect()
    }
}

/// Conversation role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single part of message content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Reasoning { text: String },
    File(FileContent),
    ToolCall(AgentToolCall),
    ToolResult(ToolResultPart),
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Whether this part is an image attachment.
    pub fn is_image(&self) -> bool {
        matches!(self, Self::File(file) if file.is_image())
    }
}

/// File or image content embedded in a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileContent {
    /// Base64 payload or URL.
    pub data: String,
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl FileContent {
    pub fn new(data: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            media_type: media_type.into(),
            filename: None,
        }
    }

    /// Encode raw bytes as base64.
    pub fn from_bytes(bytes: &[u8], media_type: impl Into<String>) -> Self {
        use base64::Engine;
        Self::new(
            base64::engine::general_purpose::STANDARD.encode(bytes),
            media_type,
        )
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

impl AgentToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Arguments as a JSON value, parsing raw string arguments when needed.
    pub fn arguments_value(&self) -> serde_json::Value {
        match &self.arguments {
            serde_json::Value::String(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    serde_json::json!({})
                } else {
                    serde_json::from_str(trimmed).unwrap_or_else(|_| self.arguments.clone())
                }
            }
            serde_json::Value::Null => serde_json::json!({}),
            other => other.clone(),
        }
    }
}

/// The result of a tool call as it appears in a tool turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResultPart {
    pub tool_call_id: String,
    pub tool_name: String,
    pub output: ToolResultOutput,
}

/// Tool result payload shapes understood by the model boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResultOutput {
    Text { value: String },
    Json { value: serde_json::Value },
    ErrorText { value: String },
    Content { value: Vec<ToolResultContent> },
}

/// One item of multi-part tool output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResultContent {
    Text { text: String },
    Media { data: String, media_type: String },
}

impl ToolResultContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Media { media_type, .. } if media_type.starts_with("image/"))
    }
}

/// Check that every tool result answers an earlier call and every call is answered.
pub fn tool_pairing_is_consistent(messages: &[ModelMessage]) -> bool {
    let mut open: HashSet<&str> = HashSet::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for message in messages {
        for part in &message.content {
            match part {
                ContentPart::ToolCall(call) => {
                    open.insert(call.id.as_str());
                    seen.insert(call.id.as_str());
                }
                ContentPart::ToolResult(result) => {
                    if !seen.contains(result.tool_call_id.as_str()) {
                        return false;
                    }
                    open.remove(result.tool_call_id.as_str());
                }
                _ => {}
            }
        }
    }
    open.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_turn(id: &str) -> ModelMessage {
        ModelMessage::new(
            Role::Assistant,
            vec![ContentPart::ToolCall(AgentToolCall::new(
                id,
                "read",
                serde_json::json!({}),
            ))],
        )
    }

    fn result_turn(id: &str) -> ModelMessage {
        ModelMessage::tool(vec![ToolResultPart {
            tool_call_id: id.into(),
            tool_name: "read".into(),
            output: ToolResultOutput::Text { value: "ok".into() },
        }])
    }

    #[test]
    fn pairing_accepts_answered_calls() {
        let messages = vec![
            ModelMessage::user("go"),
            call_turn("c1"),
            result_turn("c1"),
        ];
        assert!(tool_pairing_is_consistent(&messages));
    }

    #[test]
    fn pairing_rejects_orphans() {
        assert!(!tool_pairing_is_consistent(&[call_turn("c1")]));
        assert!(!tool_pairing_is_consistent(&[result_turn("c1")]));
        assert!(!tool_pairing_is_consistent(&[result_turn("c1"), call_turn("c1")]));
    }

    #[test]
    fn string_arguments_are_parsed() {
        let call = AgentToolCall::new("c", "t", serde_json::json!("{\"a\":1}"));
        assert_eq!(call.arguments_value(), serde_json::json!({"a": 1}));
        let empty = AgentToolCall::new("c", "t", serde_json::json!(""));
        assert_eq!(empty.arguments_value(), serde_json::json!({}));
    }

    #[test]
    fn serde_tags_are_snake_case() {
        let part = ContentPart::File(FileContent::new("abc", "image/png"));
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "file");
        assert_eq!(json["media_type"], "image/png");
        assert!(part.is_image());
    }
}
