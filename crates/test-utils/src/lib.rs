//! Shared test utilities for the tile harvester workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic grayscale and RGB tile generators
//! - A temporary `images/` tree laid out the way the fetcher writes it
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{gray_from_counts, TileTree};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

/// Assert that a CSV manifest body has exactly the given data rows
/// (header excluded), in order.
///
/// # Usage
///
/// ```ignore
/// assert_manifest_rows!(csv_text, [
///     ("images/a.png", "clear", "land"),
/// ]);
/// ```
#[macro_export]
macro_rules! assert_manifest_rows {
    ($body:expr, [$(($path:expr, $weather:expr, $terrain:expr)),* $(,)?]) => {{
        let body: &str = &$body;
        let mut lines = body.lines();
        assert_eq!(lines.next(), Some("filepath,weather,terrain"), "missing manifest header");
        let rows: Vec<&str> = lines.collect();
        let expected: Vec<String> = vec![$(format!("\"{}\",{},{}", $path, $weather, $terrain)),*];
        let rows: Vec<String> = rows
            .iter()
            .map(|r| {
                // Paths only get quoted when they contain a comma; normalize.
                let (path, rest) = r.rsplit_once(',').and_then(|(head, terrain)| {
                    head.rsplit_once(',').map(|(p, w)| (p.to_string(), format!("{},{}", w, terrain)))
                }).unwrap_or((r.to_string(), String::new()));
                let path = path.trim_matches('"');
                format!("\"{}\",{}", path, rest)
            })
            .collect();
        assert_eq!(rows, expected);
    }};
}
