use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    ActionResult,
    Thoughts,
    HumanFeedback,
    Note,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
}

/// Conversation record of one loop run.
#[derive(Debug, Clone, Default)]
pub struct MessageHistory {
    messages: Vec<Message>,
}

impl MessageHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Role, kind: MessageKind, content: impl Into<String>) {
        self.messages.push(Message {
            role,
            content: content.into(),
            kind,
            created_at: Utc::now(),
        });
    }

    pub fn system(&mut self, kind: MessageKind, content: impl Into<String>) {
        self.push(Role::System, kind, content);
    }

    pub fn user(&mut self, content: impl Into<String>) {
        self.push(Role::User, MessageKind::HumanFeedback, content);
    }

    pub fn assistant(&mut self, content: impl Into<String>) {
        self.push(Role::Assistant, MessageKind::Thoughts, content);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The last `n` messages as `{role, content}` objects, oldest first.
    pub fn tail_json(&self, n: usize) -> Vec<Value> {
        let start = self.messages.len().saturating_sub(n);
        self.messages[start..]
            .iter()
            .map(|m| json!({ "role": m.role, "content": m.content }))
            .collect()
    }
}
