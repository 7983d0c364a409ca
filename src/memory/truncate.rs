//! Shrinks old media and oversized tool output in place.

use std::collections::HashMap;

use crate::config::HarperConfig;
use crate::types::{ContentPart, ModelMessage, Role, ToolResultContent, ToolResultOutput};
use crate::util::text::{char_len, sub};

const IMAGE_PLACEHOLDER: &str = "[image]";
const FILE_PLACEHOLDER: &str = "[file]";

/// Walk the history newest-first and degrade what the model no longer needs.
///
/// Only the `max_dialogue_img_file_num` most recent images (and, counted
/// separately, non-image files) stay live; older ones become `[image]` /
/// `[file]` text. For each tool, only its most recent text result longer than
/// `large_text_length` survives intact; older ones are cut to that length
/// plus `...`. Part counts never change.
pub fn handle_large_context_messages(messages: &mut [ModelMessage], config: &HarperConfig) {
    let max_live = config.max_dialogue_img_file_num;
    let limit = config.large_text_length;
    let mut image_num = 0usize;
    let mut file_num = 0usize;
    let mut long_text_tools: HashMap<String, usize> = HashMap::new();

    for message in messages.iter_mut().rev() {
        match message.role {
            Role::User => {
                for part in message.content.iter_mut() {
                    let is_image = match part {
                        ContentPart::File(file) => file.is_image(),
                        _ => continue,
                    };
                    if is_image {
                        image_num += 1;
                        if image_num > max_live {
                            *part = ContentPart::text(IMAGE_PLACEHOLDER);
                        }
                    } else {
                        file_num += 1;
                        if file_num > max_live {
                            *part = ContentPart::text(FILE_PLACEHOLDER);
                        }
                    }
                }
            }
            Role::Tool => {
                for part in message.content.iter_mut() {
                    let ContentPart::ToolResult(result) = part else {
                        continue;
                    };
                    let tool_name = result.tool_name.clone();
                    match &mut result.output {
                        ToolResultOutput::Content { value } => {
                            for item in value.iter_mut() {
                                if item.is_image() {
                                    image_num += 1;
                                    if image_num > max_live {
                                        *item = ToolResultContent::text(IMAGE_PLACEHOLDER);
                                    }
                                }
                            }
                            for item in value.iter_mut() {
                                if let ToolResultContent::Text { text } = item {
                                    shorten_if_stale(text, &tool_name, limit, &mut long_text_tools);
                                }
                            }
                        }
                        ToolResultOutput::Text { value } | ToolResultOutput::ErrorText { value } => {
                            shorten_if_stale(value, &tool_name, limit, &mut long_text_tools);
                        }
                        ToolResultOutput::Json { .. } => {}
                    }
                }
            }
            Role::System | Role::Assistant => {}
        }
    }
}

fn shorten_if_stale(
    text: &mut String,
    tool_name: &str,
    limit: usize,
    seen: &mut HashMap<String, usize>,
) {
    if char_len(text) <= limit {
        return;
    }
    let count = seen.entry(tool_name.to_string()).or_insert(0);
    *count += 1;
    if *count > 1 {
        *text = sub(text, limit, true);
    }
}
