use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};

/// Filter used when none is given on the command line.
pub const DEFAULT_FILTER: &str = "*.{jpg,jpeg,png,gif,webp}";

/// Find the files in `input_dir` matching the glob `filter`.
///
/// `{a,b}` alternations are expanded before matching and matching ignores
/// case. Results are absolute, de-duplicated and sorted. Non-regular files
/// are not filtered out here; the per-file checks report them.
pub fn discover_images(input_dir: &Path, filter: &str) -> Result<Vec<PathBuf>> {
    if !input_dir.is_dir() {
        return Err(anyhow::anyhow!(
            "Input directory does not exist: {}",
            input_dir.display()
        ));
    }

    let root = input_dir
        .canonicalize()
        .with_context(|| format!("Failed to resolve input directory: {}", input_dir.display()))?;
    let escaped_root = Pattern::escape(&root.to_string_lossy());

    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };

    let mut files = Vec::new();
    for pattern in expand_braces(filter) {
        let full_pattern = format!("{}/{}", escaped_root, pattern.trim_start_matches('/'));
        let entries = glob::glob_with(&full_pattern, options)
            .with_context(|| format!("Invalid filter pattern: {}", filter))?;

        // Entries glob could not stat are dropped
        files.extend(entries.filter_map(|entry| entry.ok()));
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Expand `{a,b}` alternations into separate patterns.
///
/// Nested and repeated groups are supported; an unmatched `{` is left as is.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };

    let mut depth = 0;
    let mut close = None;
    let mut splits = Vec::new();
    for (i, c) in pattern[open..].char_indices() {
        let i = open + i;
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(i);
                    break;
                }
            }
            ',' if depth == 1 => splits.push(i),
            _ => {}
        }
    }

    let Some(close) = close else {
        return vec![pattern.to_string()];
    };

    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];

    let mut bounds = vec![open];
    bounds.extend(&splits);
    bounds.push(close);

    bounds
        .windows(2)
        .flat_map(|w| {
            let alternative = &pattern[w[0] + 1..w[1]];
            expand_braces(&format!("{}{}{}", prefix, alternative, suffix))
        })
        .collect()
}
