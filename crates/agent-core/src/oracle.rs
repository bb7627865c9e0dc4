use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::AgentError;

/// Step budget used when an instruction does not set its own.
pub const DEFAULT_STEP_BUDGET: u32 = 30;

/// Shape the caller would like the oracle's answer to take.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseShape {
    Boolean,
    Json(Value),
}

impl ResponseShape {
    /// JSON schema handed to the oracle service.
    pub fn schema(&self) -> Value {
        match self {
            ResponseShape::Boolean => json!({ "type": "boolean" }),
            ResponseShape::Json(schema) => schema.clone(),
        }
    }
}

/// One natural-language instruction plus its response contract.
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub prompt: String,
    pub shape: Option<ResponseShape>,
    /// Upper bound on the number of browser actions the oracle may take.
    pub step_budget: u32,
}

impl Instruction {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            shape: None,
            step_budget: DEFAULT_STEP_BUDGET,
        }
    }

    /// Yes/no question answered against [`ResponseShape::Boolean`].
    pub fn question(prompt: impl Into<String>) -> Self {
        Self::new(prompt).with_shape(ResponseShape::Boolean)
    }

    pub fn with_shape(mut self, shape: ResponseShape) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn with_step_budget(mut self, steps: u32) -> Self {
        self.step_budget = steps.max(1);
        self
    }
}

/// What the oracle said back.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OracleReply {
    pub raw_text: String,
    /// Whether `parsed_value` conforms to the requested shape.
    pub matches_shape: bool,
    pub parsed_value: Option<Value>,
}

impl OracleReply {
    pub fn text(raw: impl Into<String>) -> Self {
        Self {
            raw_text: raw.into(),
            matches_shape: false,
            parsed_value: None,
        }
    }

    pub fn boolean(value: bool) -> Self {
        Self {
            raw_text: value.to_string(),
            matches_shape: true,
            parsed_value: Some(Value::Bool(value)),
        }
    }

    /// Shape-conforming boolean answer, if the oracle produced one.
    pub fn as_bool(&self) -> Option<bool> {
        if !self.matches_shape {
            return None;
        }
        self.parsed_value.as_ref().and_then(Value::as_bool)
    }
}

/// A live oracle session bound to one browser profile.
///
/// Sessions are never shared between tasks. `stop` must be called on every
/// exit path, including failures.
#[async_trait]
pub trait OracleSession: Send {
    fn id(&self) -> &str;

    async fn invoke(&mut self, instruction: &Instruction) -> Result<OracleReply, AgentError>;

    async fn stop(&mut self) -> Result<(), AgentError>;
}

/// Factory for oracle sessions.
#[async_trait]
pub trait OracleConnector: Send + Sync {
    /// Start a session whose browser opens at `starting_page`.
    async fn open(&self, starting_page: &str) -> Result<Box<dyn OracleSession>, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_reply_requires_shape_match() {
        assert_eq!(OracleReply::boolean(true).as_bool(), Some(true));
        let loose = OracleReply {
            raw_text: "true".into(),
            matches_shape: false,
            parsed_value: Some(Value::Bool(true)),
        };
        assert_eq!(loose.as_bool(), None);
    }

    #[test]
    fn question_uses_boolean_schema() {
        let q = Instruction::question("Is there a captcha?").with_step_budget(0);
        assert_eq!(q.step_budget, 1);
        assert_eq!(q.shape.unwrap().schema(), json!({ "type": "boolean" }));
    }
}
