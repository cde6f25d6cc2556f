//! Split management
//!
//! Produces a reproducible held-out test set and stratified k-fold
//! assignment over case ids, and persists it as a JSON document:
//!
//! ```json
//! {
//!   "test": ["id", "..."],
//!   "train": { "fold_0": [["train ids"], ["validation ids"]] }
//! }
//! ```

mod assignment;
mod config;
mod store;

pub use assignment::{Assignment, CaseId, Fold, SplitAssignment};
pub use config::SplitConfig;
pub use store::SplitStore;
