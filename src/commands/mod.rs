pub mod catalog;
pub mod run;

// Re-export command functions for convenience
pub use catalog::issues;
pub use run::{check, run, sources};
