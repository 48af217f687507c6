//! ID generation utilities for Tasksmith
//!
//! Run identifiers double as artifact file stems, so they are filesystem safe.

use chrono::{DateTime, Local};
use uuid::Uuid;

/// Longest objective slug kept in a run ID
const MAX_SLUG_LEN: usize = 40;

/// Hex characters of the random suffix
const SUFFIX_LEN: usize = 8;

/// Generate a run ID from the current local time, the objective and a random suffix
///
/// Format: `{YYYY-mm-dd_HH-MM-SS}_{slug}_{suffix}`
/// Example: `2024-06-01_14-03-22_write-a-function-that-adds-two_3f9a1c07`
pub fn generate_run_id(objective: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", run_id_at(Local::now(), objective), &suffix[..SUFFIX_LEN])
}

/// Timestamp and slug part of a run ID
pub fn run_id_at(at: DateTime<Local>, objective: &str) -> String {
    let stamp = at.format("%Y-%m-%d_%H-%M-%S");
    let slug = slugify(objective);
    if slug.is_empty() {
        format!("{}_run", stamp)
    } else {
        format!("{}_{}", stamp, slug)
    }
}

/// Lowercase ASCII alphanumerics joined by single hyphens
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if slug.len() >= MAX_SLUG_LEN {
                break;
            }
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}
