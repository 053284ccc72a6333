//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init command and shared utilities (open_db, load_config)
//! - `import` - CSV import with layout detection and column overrides
//! - `classify` - Bulk classification of unassigned transactions
//! - `learn` - Pattern learning and maintenance
//! - `patterns` - Personal pattern listing
//! - `status` - Database and pattern store status

pub mod classify;
pub mod core;
pub mod import;
pub mod learn;
pub mod patterns;
pub mod status;

// Re-export command functions for main.rs
pub use classify::*;
pub use core::*;
pub use import::*;
pub use learn::*;
pub use patterns::*;
pub use status::*;

/// Truncate a string to a maximum number of characters, adding "..." if
/// truncated. Counts chars, not bytes, so accented merchant names never
/// split mid-character.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
