// src/pipeline/transform.rs

//! Variant-conditioned transform chain.
//!
//! Each stage is an opaque `content -> content | error` function. The chain
//! for a variant is env substitution, then the syntax transform, then (in
//! production only) the minifier.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use anyhow::Result;
use regex::{Captures, Regex};

use crate::config::model::ScriptSection;
use crate::exec::command::run_filter;
use crate::types::{BoxFuture, BuildVariant};

static ENV_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bprocess\.env\.([A-Za-z_$][\w$]*)")
        .unwrap_or_else(|e| unreachable!("static env pattern failed to compile: {e}"))
});

pub trait Transform: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn apply<'a>(&'a self, path: &'a str, input: String) -> BoxFuture<'a, Result<String>>;
}

/// Replaces `process.env.NAME` with the JSON literal of the configured value.
///
/// With `purge` set, names without a value become `undefined`; otherwise they
/// are left untouched.
#[derive(Debug, Clone)]
pub struct EnvSubstitution {
    values: BTreeMap<String, String>,
    purge: bool,
}

impl EnvSubstitution {
    pub fn new(values: BTreeMap<String, String>, purge: bool) -> Self {
        Self { values, purge }
    }

    pub fn substitute(&self, input: &str) -> String {
        ENV_RE
            .replace_all(input, |caps: &Captures<'_>| {
                let name = &caps[1];
                match self.values.get(name) {
                    Some(value) => serde_json::Value::from(value.as_str()).to_string(),
                    None if self.purge => "undefined".to_string(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

impl Transform for EnvSubstitution {
    fn name(&self) -> &str {
        "env"
    }

    fn apply<'a>(&'a self, _path: &'a str, input: String) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move { Ok(self.substitute(&input)) })
    }
}

/// Syntax transform used when no external transformer is configured.
#[derive(Debug, Clone, Default)]
pub struct Passthrough;

impl Transform for Passthrough {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn apply<'a>(&'a self, _path: &'a str, input: String) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move { Ok(input) })
    }
}

/// Line-level whitespace and comment stripper.
///
/// Only whole-line `//` comments are dropped, so string contents are never
/// touched.
#[derive(Debug, Clone, Default)]
pub struct StripMinifier;

impl StripMinifier {
    pub fn minify(input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        for line in input.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with("//") {
                continue;
            }
            out.push_str(trimmed);
            out.push('\n');
        }
        out
    }
}

impl Transform for StripMinifier {
    fn name(&self) -> &str {
        "strip"
    }

    fn apply<'a>(&'a self, _path: &'a str, input: String) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move { Ok(Self::minify(&input)) })
    }
}

/// Runs an external program with the module on stdin and takes its stdout.
#[derive(Debug, Clone)]
pub struct CommandTransform {
    label: String,
    cmd: String,
    cwd: PathBuf,
}

impl CommandTransform {
    pub fn new(label: impl Into<String>, cmd: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            cmd: cmd.into(),
            cwd: cwd.into(),
        }
    }
}

impl Transform for CommandTransform {
    fn name(&self) -> &str {
        &self.label
    }

    fn apply<'a>(&'a self, _path: &'a str, input: String) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move { run_filter(&self.cmd, &self.cwd, &input).await })
    }
}

/// Ordered transforms for one variant.
#[derive(Debug, Clone)]
pub struct TransformChain {
    variant: BuildVariant,
    stages: Vec<Arc<dyn Transform>>,
}

impl TransformChain {
    pub fn new(variant: BuildVariant, stages: Vec<Arc<dyn Transform>>) -> Self {
        Self { variant, stages }
    }

    /// Standard chain: env substitution, syntax, and the minifier when
    /// `variant` is production.
    pub fn standard(
        variant: BuildVariant,
        env: EnvSubstitution,
        syntax: Arc<dyn Transform>,
        minifier: Arc<dyn Transform>,
    ) -> Self {
        let mut stages: Vec<Arc<dyn Transform>> = vec![Arc::new(env), syntax];
        if variant.is_production() {
            stages.push(minifier);
        }
        Self::new(variant, stages)
    }

    /// Chain configured by `[script]`.
    pub fn from_script_config(
        script: &ScriptSection,
        variant: BuildVariant,
        env_values: BTreeMap<String, String>,
        root: impl Into<PathBuf>,
    ) -> Self {
        let root = root.into();
        let syntax: Arc<dyn Transform> = match &script.syntax_cmd {
            Some(cmd) => Arc::new(CommandTransform::new("syntax", cmd, &root)),
            None => Arc::new(Passthrough),
        };
        let minifier: Arc<dyn Transform> = match &script.minify_cmd {
            Some(cmd) => Arc::new(CommandTransform::new("minify", cmd, &root)),
            None => Arc::new(StripMinifier),
        };
        Self::standard(
            variant,
            EnvSubstitution::new(env_values, script.purge_env),
            syntax,
            minifier,
        )
    }

    pub fn variant(&self) -> BuildVariant {
        self.variant
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub async fn run(&self, path: &str, input: String) -> Result<String> {
        let mut current = input;
        for stage in &self.stages {
            current = stage
                .apply(path, current)
                .await
                .map_err(|e| e.context(format!("{} transform", stage.name())))?;
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(purge: bool) -> EnvSubstitution {
        let mut values = BTreeMap::new();
        values.insert("NODE_ENV".to_string(), "production".to_string());
        values.insert("API".to_string(), "say \"hi\"".to_string());
        EnvSubstitution::new(values, purge)
    }

    #[test]
    fn env_values_become_string_literals() {
        let out = env(true).substitute("if (process.env.NODE_ENV === 'x') f(process.env.API, process.env.OTHER);");
        assert_eq!(
            out,
            r#"if ("production" === 'x') f("say \"hi\"", undefined);"#
        );
    }

    #[test]
    fn unknown_names_survive_without_purge() {
        assert_eq!(env(false).substitute("process.env.OTHER"), "process.env.OTHER");
    }

    #[tokio::test]
    async fn minifier_only_runs_in_production() {
        let script = ScriptSection::default();
        let dev = TransformChain::from_script_config(&script, BuildVariant::Development, BTreeMap::new(), ".");
        let prod = TransformChain::from_script_config(&script, BuildVariant::Production, BTreeMap::new(), ".");

        assert_eq!(dev.stage_names(), vec!["env", "passthrough"]);
        assert_eq!(prod.stage_names(), vec!["env", "passthrough", "strip"]);

        let src = "// header\n  var a = 1;\n\n".to_string();
        assert_eq!(dev.run("a.js", src.clone()).await.unwrap(), src);
        assert_eq!(prod.run("a.js", src).await.unwrap(), "var a = 1;\n");
    }
}
