//! Messages exchanged with the capture agent over the framed channel.

use crate::Request;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Inbound message from the capture agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlMessage {
    /// Older agents send a `type` field; it is accepted and ignored.
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default)]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Request>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<Vec<Request>>,
}

/// The operations a control message can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Add,
    Sync,
    Clear,
    Ping,
}

impl ControlAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlAction::Add => "add",
            ControlAction::Sync => "sync",
            ControlAction::Clear => "clear",
            ControlAction::Ping => "ping",
        }
    }
}

impl FromStr for ControlAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(ControlAction::Add),
            "sync" => Ok(ControlAction::Sync),
            "clear" => Ok(ControlAction::Clear),
            "ping" => Ok(ControlAction::Ping),
            other => Err(format!("unknown action: '{}'", other)),
        }
    }
}

impl ControlMessage {
    pub fn add(request: Request) -> Self {
        Self {
            action: "add".into(),
            request: Some(request),
            ..Default::default()
        }
    }

    pub fn sync(requests: Vec<Request>) -> Self {
        Self {
            action: "sync".into(),
            requests: Some(requests),
            ..Default::default()
        }
    }

    pub fn clear() -> Self {
        Self {
            action: "clear".into(),
            ..Default::default()
        }
    }

    pub fn ping() -> Self {
        Self {
            action: "ping".into(),
            ..Default::default()
        }
    }
}

/// Outbound reply to the capture agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlResponse {
    pub fn ok(action: &str) -> Self {
        Self {
            success: true,
            action: Some(action.to_string()),
            ..Default::default()
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Default::default()
        }
    }
}
