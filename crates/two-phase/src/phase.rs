//! Phase names and wire messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A round of the two-phase-commit protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitPhase {
    Prepare,
    Commit,
    Abort,
}

impl CommitPhase {
    /// Parses a wire phase name; unknown names yield None.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "prepare" => Some(CommitPhase::Prepare),
            "commit" => Some(CommitPhase::Commit),
            "abort" => Some(CommitPhase::Abort),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommitPhase::Prepare => "prepare",
            CommitPhase::Commit => "commit",
            CommitPhase::Abort => "abort",
        }
    }
}

impl std::fmt::Display for CommitPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Body POSTed to a participant: `{ "phase": ..., "data": { ..., "ctx"? } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseMessage {
    pub phase: CommitPhase,
    pub data: Value,
}

impl PhaseMessage {
    /// Builds the message for one participant.
    ///
    /// Object-shaped data gets `ctx` merged in as a field. Any other shape is
    /// sent unchanged, or wrapped as `{ "value": data, "ctx": ctx }` when a
    /// context has to travel with it.
    pub fn new(phase: CommitPhase, data: Value, ctx: Option<&Value>) -> Self {
        let data = match (data, ctx) {
            (data, None) => data,
            (Value::Object(mut fields), Some(ctx)) => {
                fields.insert("ctx".to_string(), ctx.clone());
                Value::Object(fields)
            }
            (Value::Null, Some(ctx)) => serde_json::json!({ "ctx": ctx }),
            (value, Some(ctx)) => serde_json::json!({ "value": value, "ctx": ctx }),
        };
        Self { phase, data }
    }
}

/// A participant's answer to a phase message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctx: Option<Value>,
}

/// What a participant's local action reports back.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PhaseResult {
    pub success: bool,
    /// Optional context sent back to the orchestrator; a failing prepare's
    /// context is forwarded to every participant in the abort round.
    pub ctx: Option<Value>,
}

impl PhaseResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            ctx: None,
        }
    }

    pub fn failed() -> Self {
        Self {
            success: false,
            ctx: None,
        }
    }

    /// Attaches context to the result.
    pub fn with_ctx(mut self, ctx: Value) -> Self {
        self.ctx = Some(ctx);
        self
    }
}

impl From<bool> for PhaseResult {
    fn from(success: bool) -> Self {
        Self { success, ctx: None }
    }
}

impl From<PhaseResult> for PhaseReply {
    fn from(result: PhaseResult) -> Self {
        Self {
            success: result.success,
            ctx: result.ctx,
        }
    }
}
