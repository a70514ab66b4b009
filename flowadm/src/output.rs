//! Table formatting helpers for CLI output.

use comfy_table::{ContentArrangement, Table};

/// Create a styled table with the given headers.
pub fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.load_preset(comfy_table::presets::NOTHING);
    table.set_header(headers);
    table
}

/// Format a digest for display: algorithm prefix plus the first 12 hex
/// characters.
pub fn short_digest(digest: &str) -> String {
    match digest.split_once(':') {
        Some((algorithm, hex)) => {
            let truncated = if hex.len() > 12 { &hex[..12] } else { hex };
            format!("{}:{}", algorithm, truncated)
        }
        None => {
            let truncated = if digest.len() > 12 {
                &digest[..12]
            } else {
                digest
            };
            truncated.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortens_prefixed_digests() {
        let digest = "sha256:f29dba55022eec8c0ce1cbfaaed45f2352ab3fbbb1cdcd5ea30ca3513deb70c9";
        assert_eq!(short_digest(digest), "sha256:f29dba55022e");
    }

    #[test]
    fn leaves_short_values_alone() {
        assert_eq!(short_digest("abc"), "abc");
        assert_eq!(short_digest("sha256:abc"), "sha256:abc");
    }
}
