//! Typed access to tool call arguments.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::HarperError;

/// Parsed arguments of one tool call.
#[derive(Debug, Clone, Default)]
pub struct ToolArguments {
    value: Value,
}

impl ToolArguments {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    pub fn raw(&self) -> &Value {
        &self.value
    }

    pub fn get_str(&self, key: &str) -> Result<&str, HarperError> {
        self.get_str_opt(key)
            .ok_or_else(|| missing("string", key))
    }

    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(Value::as_str)
    }

    pub fn get_bool_opt(&self, key: &str) -> Option<bool> {
        self.value.get(key).and_then(Value::as_bool)
    }

    /// Collect a string array; non-string items are skipped.
    pub fn get_str_array(&self, key: &str) -> Result<Vec<String>, HarperError> {
        let items = self
            .value
            .get(key)
            .and_then(Value::as_array)
            .ok_or_else(|| missing("array", key))?;
        Ok(items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect())
    }

    /// Collect an integer array, accepting numeric strings as well.
    pub fn get_u64_array(&self, key: &str) -> Result<Vec<u64>, HarperError> {
        let items = self
            .value
            .get(key)
            .and_then(Value::as_array)
            .ok_or_else(|| missing("array", key))?;
        Ok(items
            .iter()
            .filter_map(|item| match item {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .collect())
    }

    /// Deserialize the whole argument object into `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, HarperError> {
        serde_json::from_value(self.value.clone()).map_err(|e| {
            HarperError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
        })
    }
}

fn missing(kind: &str, key: &str) -> HarperError {
    HarperError::InvalidArgument(format!("Missing {kind} argument: {key}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_getters() {
        let args = ToolArguments::new(json!({
            "name": "x",
            "ids": [1, "2", "nope"],
            "flag": true,
        }));
        assert_eq!(args.get_str("name").unwrap(), "x");
        assert_eq!(args.get_u64_array("ids").unwrap(), vec![1, 2]);
        assert_eq!(args.get_bool_opt("flag"), Some(true));
        assert!(matches!(
            args.get_str("missing"),
            Err(HarperError::InvalidArgument(_))
        ));
    }
}
