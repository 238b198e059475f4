//! Conversion of arbitrary object labels into valid, collision-free
//! Terraform identifiers.
//!
//! The pipeline is deterministic end to end: the same raw label and the
//! same prior registry state always produce the same identifier, so
//! re-running an export against an unchanged workspace yields a stable
//! diff. Collisions are disambiguated with a short hash of the source id
//! rather than a counter for the same reason.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use sha2::{Digest, Sha256};

const MAX_NAME_LEN: usize = 64;
const HASH_NAME_LEN: usize = 11;
const SUFFIX_LEN: usize = 8;

/// Short stable hash of an arbitrary string: lowercase hex of SHA-256,
/// truncated to `len` characters.
pub fn short_hash(input: &str, len: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(len);
    hash
}

/// Per-export-run registry of assigned identifiers, namespaced by resource
/// kind so two kinds may reuse the same base name.
pub struct NameRegistry {
    guid_prefix: Regex,
    used: HashMap<String, HashSet<String>>,
}

impl Default for NameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NameRegistry {
    pub fn new() -> Self {
        // Object labels frequently embed a storage GUID prefix; dropping it
        // keeps the human-meaningful tail of the name.
        let guid_prefix = Regex::new(
            "^[0-9a-f]{8}[_-][0-9a-f]{4}[_-][0-9a-f]{4}[_-][0-9a-f]{4}[_-][0-9a-f]{12}[_-]",
        )
        .expect("static regex");
        Self {
            guid_prefix,
            used: HashMap::new(),
        }
    }

    /// Normalizes `raw` without consulting or touching the used-name sets.
    pub fn base_name(&self, raw: &str, fallback_id: &str) -> String {
        let source = if raw.is_empty() { fallback_id } else { raw };
        let lowered = source.to_lowercase();
        let stripped = self.guid_prefix.replace(&lowered, "");

        let mut out = String::with_capacity(stripped.len());
        let mut last_underscore = false;
        for ch in stripped.chars() {
            let mapped = if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
                ch
            } else {
                '_'
            };
            if mapped == '_' {
                if !last_underscore {
                    out.push('_');
                }
                last_underscore = true;
            } else {
                out.push(mapped);
                last_underscore = false;
            }
        }
        let mut name: String = out.trim_matches('_').to_string();
        name.truncate(MAX_NAME_LEN);
        let name = name.trim_end_matches('_').to_string();

        // Empty or digit-leading results are not valid identifiers; fall
        // back to a hash of the raw label so case differences that the
        // lowercasing folded away still produce distinct names.
        if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
            return format!("r{}", short_hash(source, HASH_NAME_LEN));
        }
        name
    }

    /// Returns the unique identifier for `raw` within `namespace`,
    /// recording it as used. `secondary_id` (typically the source-system
    /// id) seeds the collision suffix.
    pub fn assign(&mut self, namespace: &str, raw: &str, secondary_id: &str) -> String {
        let base = self.base_name(raw, secondary_id);
        let used = self.used.entry(namespace.to_string()).or_default();
        let name = if used.contains(&base) {
            format!("{base}_{}", short_hash(secondary_id, SUFFIX_LEN))
        } else {
            base
        };
        used.insert(name.clone());
        name
    }
}
