//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (open_db, open_engine, user lookup, dates) and init
//! - `users` - User management commands
//! - `profile` - Profile and preference commands
//! - `transactions` - Transaction commands (add, list)
//! - `analyze` - Suggestion generation commands
//! - `suggestions` - Suggestion listing, stats, interactions, refinement, expiry
//! - `dashboard` - Per-user dashboard summary

pub mod analyze;
pub mod core;
pub mod dashboard;
pub mod profile;
pub mod suggestions;
pub mod transactions;
pub mod users;

// Re-export command functions for main.rs
pub use analyze::*;
pub use core::*;
pub use dashboard::*;
pub use profile::*;
pub use suggestions::*;
pub use transactions::*;
pub use users::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
