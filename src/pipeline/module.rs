// src/pipeline/module.rs

use std::sync::{Arc, LazyLock};

use regex::Regex;

/// `require("x")` / `require('x')`
static REQUIRE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\brequire\s*\(\s*["']([^"'\n]+)["']\s*\)"#).unwrap_or_else(|e| {
        unreachable!("static require pattern failed to compile: {e}")
    })
});

/// `import "x"`, `import ... from "x"`, `export ... from "x"`
static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^\s*(?:import\s*["']([^"'\n]+)["']|(?:import|export)\b[^;'"]*\bfrom\s*["']([^"'\n]+)["'])"#,
    )
    .unwrap_or_else(|e| unreachable!("static import pattern failed to compile: {e}"))
});

/// A single source file of the script bundle.
///
/// Replaced wholesale when its content changes; never mutated in place.
#[derive(Debug, Clone)]
pub struct SourceModule {
    /// Project-relative path, `/`-separated. Unique id of the module.
    pub path: String,
    pub content: Arc<str>,
    pub content_hash: blake3::Hash,
    /// Specifiers in the order they first appear.
    pub dependency_specifiers: Vec<String>,
}

impl SourceModule {
    pub fn new(path: impl Into<String>, content: impl Into<Arc<str>>) -> Self {
        let content: Arc<str> = content.into();
        Self {
            path: path.into(),
            content_hash: content_hash(&content),
            dependency_specifiers: extract_specifiers(&content),
            content,
        }
    }
}

pub fn content_hash(content: &str) -> blake3::Hash {
    blake3::hash(content.as_bytes())
}

/// Dependency specifiers referenced by `code`, ordered by first position and
/// deduplicated.
pub fn extract_specifiers(code: &str) -> Vec<String> {
    let mut found: Vec<(usize, &str)> = REQUIRE_RE
        .captures_iter(code)
        .chain(IMPORT_RE.captures_iter(code))
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| (m.start(), m.as_str()))
        .collect();
    found.sort_by_key(|(pos, _)| *pos);

    let mut specifiers: Vec<String> = Vec::with_capacity(found.len());
    for (_, spec) in found {
        if !specifiers.iter().any(|s| s == spec) {
            specifiers.push(spec.to_string());
        }
    }
    specifiers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specifiers_keep_source_order_without_duplicates() {
        let code = r#"
import React from "react";
import './styles';
const a = require('./a');
export { b } from "./b";
const again = require("./a");
export const label = "not-a-module";
"#;
        assert_eq!(
            extract_specifiers(code),
            vec!["react", "./styles", "./a", "./b"]
        );
    }

    #[test]
    fn hash_follows_content() {
        let a = SourceModule::new("js/a.js", "x");
        let b = SourceModule::new("js/b.js", "x");
        let c = SourceModule::new("js/a.js", "y");
        assert_eq!(a.content_hash, b.content_hash);
        assert_ne!(a.content_hash, c.content_hash);
    }
}
