// src/tools/markup.rs

use std::collections::BTreeMap;
use std::fmt::Debug;

use anyhow::{Result, anyhow};
use minijinja::{AutoEscape, Environment, context};
use serde::Serialize;

use crate::types::BuildVariant;

/// Values available to the markup template.
#[derive(Debug, Clone, Serialize)]
pub struct MarkupContext {
    /// `dev` or `dist`.
    pub environment: String,
    pub variant: String,
    /// Script bundle path for this variant.
    pub script: String,
    pub stylesheet: String,
    pub env: BTreeMap<String, String>,
}

impl MarkupContext {
    pub fn new(
        variant: BuildVariant,
        script: impl Into<String>,
        stylesheet: impl Into<String>,
        env: BTreeMap<String, String>,
    ) -> Self {
        Self {
            environment: variant.markup_environment().to_string(),
            variant: variant.as_str().to_string(),
            script: script.into(),
            stylesheet: stylesheet.into(),
            env,
        }
    }
}

pub trait Templater: Send + Sync + Debug {
    fn render(&self, name: &str, source: &str, ctx: &MarkupContext) -> Result<String>;
}

/// Templater backed by `minijinja`.
#[derive(Debug, Clone, Default)]
pub struct MinijinjaTemplater;

impl Templater for MinijinjaTemplater {
    fn render(&self, name: &str, source: &str, ctx: &MarkupContext) -> Result<String> {
        let mut env = Environment::new();
        // Values are artifact paths and configured literals, not user input.
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.add_template(name, source)
            .map_err(|e| anyhow!("{name}: {e}"))?;
        let template = env.get_template(name).map_err(|e| anyhow!("{name}: {e}"))?;
        template
            .render(context! {
                environment => &ctx.environment,
                variant => &ctx.variant,
                script => &ctx.script,
                stylesheet => &ctx.stylesheet,
                env => &ctx.env,
            })
            .map_err(|e| anyhow!("{name}: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = r#"<link href="{{ stylesheet }}">
{% if environment == "dev" %}<script>window.DEBUG = true;</script>
{% endif %}<script src="{{ script }}"></script>"#;

    #[test]
    fn environment_switches_on_variant() {
        let dev = MarkupContext::new(BuildVariant::Development, "lib/bundle.js", "css/main.css", BTreeMap::new());
        let out = MinijinjaTemplater.render("index", TEMPLATE, &dev).unwrap();
        assert!(out.contains("window.DEBUG"));
        assert!(out.contains(r#"src="lib/bundle.js""#));

        let dist = MarkupContext::new(BuildVariant::Production, "lib/bundle.min.js", "css/main.css", BTreeMap::new());
        let out = MinijinjaTemplater.render("index", TEMPLATE, &dist).unwrap();
        assert!(!out.contains("window.DEBUG"));
        assert!(out.contains(r#"src="lib/bundle.min.js""#));
    }

    #[test]
    fn html_templates_keep_paths_verbatim() {
        let ctx = MarkupContext::new(BuildVariant::Production, "lib/bundle.min.js", "css/main.css", BTreeMap::new());
        let out = MinijinjaTemplater
            .render("index-template.html", r#"<script src="{{ script }}"></script>"#, &ctx)
            .unwrap();
        assert_eq!(out, r#"<script src="lib/bundle.min.js"></script>"#);
    }

    #[test]
    fn template_errors_are_reported() {
        let ctx = MarkupContext::new(BuildVariant::Development, "a", "b", BTreeMap::new());
        assert!(MinijinjaTemplater.render("index", "{% if %}", &ctx).is_err());
    }
}
