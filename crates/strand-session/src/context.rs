//! Long-term memory context for a session.
//!
//! Retrieved facts are folded into one developer-role item so they read as
//! instructions rather than as an earlier assistant reply.

use strand_events::{EventScope, MemoryRecord, RetrieveMemoriesRequest};
use tracing::debug;

use crate::errors::Result;
use crate::items::{ContentPart, ItemRole, ResponseItem};
use crate::memory_session::MemorySession;

/// Heading of the rendered context item.
pub const CONTEXT_HEADING: &str = "Relevant facts from long-term memory:";

/// Substitute `{sessionId}` and `{actorId}` in a namespace template.
pub fn resolve_namespace(template: &str, scope: &EventScope) -> String {
    template
        .replace("{sessionId}", scope.session_id.as_str())
        .replace("{actorId}", scope.actor_id.as_str())
}

/// Render records as a single developer item, or `None` if none carry text.
pub fn render_context(records: &[MemoryRecord]) -> Option<ResponseItem> {
    let lines: Vec<String> = records
        .iter()
        .filter(|r| !r.text.is_empty())
        .map(|r| format!("• {}", r.text))
        .collect();
    if lines.is_empty() {
        return None;
    }
    let text = format!("{CONTEXT_HEADING}\n{}", lines.join("\n"));
    Some(ResponseItem::new(
        ItemRole::Developer,
        ContentPart::InputText { text },
    ))
}

impl MemorySession {
    /// Retrieve up to `top_k` long-term facts for `query` and render them as
    /// extra input items (zero or one item).
    pub async fn build_long_term_context(
        &self,
        namespace: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ResponseItem>> {
        let request = RetrieveMemoriesRequest {
            memory_id: self.scope().memory_id.clone(),
            namespace: resolve_namespace(namespace, self.scope()),
            query: query.to_string(),
            top_k,
        };
        let namespace = request.namespace.clone();
        let records = self
            .blocking(move |log| log.retrieve_memories(&request))
            .await?;
        debug!(
            session_id = %self.scope().session_id,
            namespace = %namespace,
            found = records.len(),
            "long-term memories retrieved"
        );
        Ok(render_context(&records).into_iter().collect())
    }
}
