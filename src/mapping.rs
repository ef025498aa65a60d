//! Key derivation and header-to-metadata mapping
//!
//! Both transformations are pure: the object key is the configured prefix
//! plus the request path, and object metadata is a configured projection of
//! the request headers. Nothing here touches the network.

use axum::http::HeaderMap;
use std::collections::HashMap;

/// Derive the backend object key from the configured prefix and the request
/// path. Exactly one leading `/` is stripped from the path if present; no
/// other normalization is applied — the key is a plain concatenation, so the
/// key space stays prefix-isolated per gateway instance.
pub fn object_key(prefix: &str, path: &str) -> String {
    let path = path.strip_prefix('/').unwrap_or(path);
    format!("{}{}", prefix, path)
}

/// Configured mapping from incoming HTTP header names to backend metadata
/// keys, parsed once at startup from a `header1=meta1,header2=meta2` string.
#[derive(Debug, Clone, Default)]
pub struct HeaderMapping {
    /// Lower-cased header name -> backend metadata key.
    entries: HashMap<String, String>,
}

impl HeaderMapping {
    /// Parse a delimiter-separated mapping string. Pairs without a `=` are
    /// silently dropped; this is a startup-time configuration concern, not
    /// an operational error.
    pub fn parse(mapping: &str) -> Self {
        let mut entries = HashMap::new();
        for pair in mapping.split(',') {
            if let Some((header, meta)) = pair.split_once('=') {
                if !header.is_empty() {
                    entries.insert(header.to_ascii_lowercase(), meta.to_string());
                }
            }
        }
        Self { entries }
    }

    /// Number of configured header mappings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no header mappings are configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Project request headers onto backend metadata. Only headers whose
    /// lower-cased name appears in the mapping are forwarded, under the
    /// mapped target name; for multi-valued headers the first value wins.
    pub fn metadata_for(&self, headers: &HeaderMap) -> HashMap<String, String> {
        let mut metadata = HashMap::new();
        for (target, header) in self.entries.iter().filter_map(|(name, target)| {
            headers.get(name.as_str()).map(|value| (target, value))
        }) {
            if let Ok(value) = header.to_str() {
                metadata
                    .entry(target.clone())
                    .or_insert_with(|| value.to_string());
            }
        }
        metadata
    }
}
