use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::Deserialize;

/// Boxed future returned by the async trait seams.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Build mode selecting the transform chain and substituted values.
///
/// Fixed for the lifetime of one build invocation and passed explicitly
/// through the pipeline and the task runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildVariant {
    Development,
    Production,
}

impl BuildVariant {
    /// Value injected as `NODE_ENV`.
    pub fn as_str(self) -> &'static str {
        match self {
            BuildVariant::Development => "development",
            BuildVariant::Production => "production",
        }
    }

    /// Name of the markup environment (`dev` / `dist`).
    pub fn markup_environment(self) -> &'static str {
        match self {
            BuildVariant::Development => "dev",
            BuildVariant::Production => "dist",
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, BuildVariant::Production)
    }

    /// Pick the variant for a CLI entry point.
    ///
    /// `production` always builds the production variant, `development` and
    /// `watch` always build the development variant. Any other entry uses the
    /// explicit override, then the environment selector, then production.
    pub fn for_entry(
        entry: &str,
        explicit: Option<BuildVariant>,
        env_value: Option<&str>,
    ) -> Result<Self, String> {
        match entry {
            "production" => return Ok(BuildVariant::Production),
            "development" | "watch" => return Ok(BuildVariant::Development),
            _ => {}
        }

        if let Some(variant) = explicit {
            return Ok(variant);
        }

        match env_value {
            Some(value) if !value.trim().is_empty() => value.parse(),
            _ => Ok(BuildVariant::Production),
        }
    }
}

impl fmt::Display for BuildVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(BuildVariant::Development),
            "production" | "prod" => Ok(BuildVariant::Production),
            other => Err(format!(
                "invalid build variant: {other} (expected \"development\" or \"production\")"
            )),
        }
    }
}

/// What a task does when the runner dispatches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskAction {
    /// Run the style linter over the script sources.
    Lint,
    /// Resolve, transform and assemble the script bundle.
    JsBundle,
    /// Compile the stylesheet entry.
    Stylesheet,
    /// Render the markup template.
    Markup,
    /// Delete previously produced artifacts.
    Clean,
    /// Aggregate with no work of its own.
    Group,
}

impl fmt::Display for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskAction::Lint => "lint",
            TaskAction::JsBundle => "js-bundle",
            TaskAction::Stylesheet => "stylesheet",
            TaskAction::Markup => "markup",
            TaskAction::Clean => "clean",
            TaskAction::Group => "group",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_entries_pin_their_variant() {
        assert_eq!(
            BuildVariant::for_entry("production", Some(BuildVariant::Development), None),
            Ok(BuildVariant::Production)
        );
        assert_eq!(
            BuildVariant::for_entry("watch", None, Some("production")),
            Ok(BuildVariant::Development)
        );
    }

    #[test]
    fn other_entries_fall_back_to_env_then_production() {
        assert_eq!(
            BuildVariant::for_entry("stylesheet", None, Some("development")),
            Ok(BuildVariant::Development)
        );
        assert_eq!(
            BuildVariant::for_entry("stylesheet", None, None),
            Ok(BuildVariant::Production)
        );
        assert!(BuildVariant::for_entry("lint", None, Some("staging")).is_err());
    }
}
