//! Generated branch names.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Default prefix for branches created by a pop.
pub const DEFAULT_BRANCH_PREFIX: &str = "fix";

/// `{prefix}-{UTC %Y%m%dT%H%M%S}-{6 hex}`, unique per call.
pub fn generate_branch_name(prefix: &str) -> String {
    branch_name_at(prefix, Utc::now())
}

fn branch_name_at(prefix: &str, at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}-{}", at.format("%Y%m%dT%H%M%S"), &suffix[..6])
}
