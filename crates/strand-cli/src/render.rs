//! Plain-text rendering for terminal output.

use strand_events::BranchInfo;
use strand_session::ResponseItem;

/// `role: text` for one item.
pub fn render_item(item: &ResponseItem) -> String {
    let role = item.role.map_or("assistant", |r| r.as_str());
    format!("{role}: {}", item.text().unwrap_or_default())
}

/// One line per branch: name, fork root, head and last move.
pub fn render_branch(branch: &BranchInfo) -> String {
    format!(
        "{}  root={}  head={}  updated={}",
        branch.name,
        branch.root_event_id.as_deref().unwrap_or("origin"),
        branch.head_event_id.as_deref().unwrap_or("-"),
        branch.updated_at.format("%Y-%m-%d %H:%M:%S")
    )
}
