//! Utility functions and types

pub mod data_loader;

pub use data_loader::{write_csv, DataLoader};

/// File-system safe form of a name: anything outside `[A-Za-z0-9_.-]`
/// becomes `_`
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.trim_matches('.') {
        "" => "_".to_string(),
        s => s.to_string(),
    }
}
