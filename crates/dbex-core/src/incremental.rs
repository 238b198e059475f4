//! Incremental-mode file merging. A run with `--updated-since` only
//! re-emits recently changed resources; whatever already sits in the
//! target files must survive. Existing files are split into top-level
//! blocks by brace matching, re-emitted blocks replace their previous
//! version in place, and genuinely new blocks are appended.

/// One piece of an existing file: either a top-level block with its header
/// key (e.g. `resource "databricks_pipeline" "abc"`) or loose text
/// (comments, blank lines) carried through untouched.
#[derive(Debug, PartialEq)]
pub(crate) enum Segment {
    Block { key: String, text: String },
    Text(String),
}

/// Splits file content into top-level blocks and interstitial text. Brace
/// depth is tracked outside of quoted strings; malformed input degrades to
/// plain text segments rather than failing.
pub(crate) fn split_blocks(content: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut key: Option<String> = None;
    let mut depth = 0usize;

    for line in content.split_inclusive('\n') {
        let trimmed = line.trim();
        if depth == 0 {
            if trimmed.ends_with('{') && !trimmed.starts_with('#') {
                if !current.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut current)));
                }
                key = Some(trimmed.trim_end_matches('{').trim().to_string());
                current.push_str(line);
                depth = brace_delta_positive(trimmed);
                continue;
            }
            current.push_str(line);
            continue;
        }

        current.push_str(line);
        let (open, close) = brace_counts(trimmed);
        depth = depth.saturating_add(open).saturating_sub(close);
        if depth == 0 {
            segments.push(Segment::Block {
                key: key.take().unwrap_or_default(),
                text: std::mem::take(&mut current),
            });
        }
    }
    if !current.is_empty() {
        // Trailing text, or an unclosed block kept as text so nothing is lost.
        segments.push(Segment::Text(current));
    }
    segments
}

fn brace_delta_positive(line: &str) -> usize {
    let (open, close) = brace_counts(line);
    open.saturating_sub(close)
}

fn brace_counts(line: &str) -> (usize, usize) {
    let mut open = 0;
    let mut close = 0;
    let mut in_string = false;
    let mut escaped = false;
    for ch in line.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => open += 1,
            '}' if !in_string => close += 1,
            _ => {}
        }
    }
    (open, close)
}

/// Merges freshly rendered blocks into existing file content: existing
/// blocks that were re-emitted are replaced in place, untouched ones are
/// preserved, and new blocks are appended.
pub(crate) fn merge_blocks(existing: &str, new_blocks: &[(String, String)]) -> String {
    let mut consumed = vec![false; new_blocks.len()];
    let mut out = String::new();
    for segment in split_blocks(existing) {
        match segment {
            Segment::Block { key, text } => {
                match new_blocks.iter().position(|(new_key, _)| *new_key == key) {
                    Some(index) => {
                        consumed[index] = true;
                        out.push_str(&new_blocks[index].1);
                    }
                    None => out.push_str(&text),
                }
            }
            Segment::Text(text) => out.push_str(&text),
        }
    }
    for (index, (_, text)) in new_blocks.iter().enumerate() {
        if consumed[index] {
            continue;
        }
        if !out.is_empty() && !out.ends_with("\n\n") {
            out.push('\n');
        }
        out.push_str(text);
    }
    out
}

/// Line-level merge for import.sh: existing lines keep their order, new
/// lines not already present are appended.
pub(crate) fn merge_lines(existing: &str, new_lines: &[String]) -> String {
    let mut out: Vec<String> = existing
        .lines()
        .map(ToOwned::to_owned)
        .filter(|line| !line.is_empty())
        .collect();
    for line in new_lines {
        if !out.iter().any(|existing_line| existing_line == line) {
            out.push(line.clone());
        }
    }
    let mut merged = out.join("\n");
    merged.push('\n');
    merged
}
