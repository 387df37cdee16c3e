//! Response items: the turn shape the orchestrator reads and writes.
//!
//! Items follow the Responses API layout: an optional role plus content that
//! is either a bare string or a list of typed parts.

use serde::{Deserialize, Serialize};

/// Role of a response item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemRole {
    /// End-user input.
    User,
    /// Model output.
    Assistant,
    /// System instructions.
    System,
    /// Developer-supplied context.
    Developer,
    /// Tool output.
    Tool,
}

impl ItemRole {
    /// Wire name of the role.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Developer => "developer",
            Self::Tool => "tool",
        }
    }
}

impl std::fmt::Display for ItemRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed part of an item's content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text supplied as input.
    InputText {
        /// Body.
        text: String,
    },
    /// Text produced by a model.
    OutputText {
        /// Body.
        text: String,
    },
    /// Untyped text.
    Text {
        /// Body.
        text: String,
    },
    /// Image reference.
    InputImage {
        /// Image location.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image_url: Option<String>,
    },
    /// Model refusal.
    Refusal {
        /// Refusal message.
        refusal: String,
    },
    /// Any part type this crate does not model.
    #[serde(other)]
    Unknown,
}

impl ContentPart {
    /// Text of a text-bearing part (`input_text`, `output_text`, `text`).
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::InputText { text } | Self::OutputText { text } | Self::Text { text } => {
                Some(text)
            }
            Self::InputImage { .. } | Self::Refusal { .. } | Self::Unknown => None,
        }
    }
}

/// Item content: a bare string or a list of parts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemContent {
    /// Plain text.
    Text(String),
    /// Typed parts.
    Parts(Vec<ContentPart>),
}

impl ItemContent {
    /// Content parts; a bare string has none.
    pub fn parts(&self) -> &[ContentPart] {
        match self {
            Self::Text(_) => &[],
            Self::Parts(parts) => parts,
        }
    }
}

/// A single conversation item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseItem {
    /// Role, when the producer supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<ItemRole>,
    /// Content.
    pub content: ItemContent,
}

impl ResponseItem {
    /// Item with an explicit role and a single part.
    pub fn new(role: ItemRole, part: ContentPart) -> Self {
        Self {
            role: Some(role),
            content: ItemContent::Parts(vec![part]),
        }
    }

    /// User item with `input_text` content.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(ItemRole::User, ContentPart::InputText { text: text.into() })
    }

    /// Assistant item with `output_text` content.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(ItemRole::Assistant, ContentPart::OutputText { text: text.into() })
    }

    /// Item without a role, carrying the given parts.
    pub fn unattributed(parts: Vec<ContentPart>) -> Self {
        Self {
            role: None,
            content: ItemContent::Parts(parts),
        }
    }

    /// First non-empty text in the item, if any.
    ///
    /// A bare string content is its own text; otherwise the first
    /// text-bearing part with a non-empty body wins.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            ItemContent::Text(text) => Some(text.as_str()).filter(|t| !t.is_empty()),
            ItemContent::Parts(parts) => parts
                .iter()
                .filter_map(ContentPart::text)
                .find(|t| !t.is_empty()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
