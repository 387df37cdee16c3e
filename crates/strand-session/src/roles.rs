//! Role and text normalization between response items and log entries.
//!
//! The log only knows a closed set of roles, so every item role collapses
//! to user-class or assistant-class on the way in, and reads expand them
//! back to `user` / `assistant`.

use strand_events::{Conversational, LogRole};

use crate::items::{ContentPart, ItemContent, ItemRole, ResponseItem};

/// Role of an item, inferring it from content shape when absent.
///
/// Any `output_text` part means assistant; otherwise any `input_text` part
/// means user; anything else defaults to assistant.
pub fn infer_role(item: &ResponseItem) -> ItemRole {
    if let Some(role) = item.role {
        return role;
    }
    let parts = item.content.parts();
    if parts
        .iter()
        .any(|p| matches!(p, ContentPart::OutputText { .. }))
    {
        ItemRole::Assistant
    } else if parts
        .iter()
        .any(|p| matches!(p, ContentPart::InputText { .. }))
    {
        ItemRole::User
    } else {
        ItemRole::Assistant
    }
}

/// Map an item role into the log vocabulary.
pub const fn to_log_role(role: ItemRole) -> LogRole {
    match role {
        ItemRole::User => LogRole::User,
        ItemRole::Assistant | ItemRole::System | ItemRole::Developer | ItemRole::Tool => {
            LogRole::Assistant
        }
    }
}

/// Map a log role back to an item role.
pub const fn from_log_role(role: LogRole) -> ItemRole {
    match role {
        LogRole::User => ItemRole::User,
        LogRole::Assistant | LogRole::Tool | LogRole::Other => ItemRole::Assistant,
    }
}

/// Content part matching how a role's text is presented.
pub fn content_part_for_role(role: ItemRole, text: impl Into<String>) -> ContentPart {
    let text = text.into();
    match role {
        ItemRole::User | ItemRole::System | ItemRole::Developer => ContentPart::InputText { text },
        ItemRole::Assistant | ItemRole::Tool => ContentPart::OutputText { text },
    }
}

/// Normalize an item into a log entry. Items without text yield `None`.
pub fn to_conversational(item: &ResponseItem) -> Option<Conversational> {
    let text = item.text()?;
    Some(Conversational::new(to_log_role(infer_role(item)), text))
}

/// Rebuild an item from a log entry. Entries without text yield `None`.
pub fn to_item(entry: &Conversational) -> Option<ResponseItem> {
    if entry.text.is_empty() {
        return None;
    }
    let role = from_log_role(entry.role);
    Some(ResponseItem {
        role: Some(role),
        content: ItemContent::Parts(vec![content_part_for_role(role, entry.text.clone())]),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
