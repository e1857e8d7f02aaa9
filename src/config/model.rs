// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::{BuildVariant, TaskAction};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [script]
/// entry = "js/app.js"
/// externals = ["react", "react-dom"]
///
/// [stylesheet]
/// entry = "sass/app.scss"
/// output = "css/app.css"
///
/// [env.production]
/// API_URL = "/api"
///
/// [task.js-bundle]
/// action = "js-bundle"
/// after = ["lint"]
/// ```
///
/// All sections are optional. Without any `[task.<name>]` section the
/// standard task table is used (see [`default_tasks`]).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub script: ScriptSection,

    #[serde(default)]
    pub stylesheet: StylesheetSection,

    #[serde(default)]
    pub markup: MarkupSection,

    #[serde(default)]
    pub lint: LintSection,

    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub env: EnvSection,

    /// All tasks from `[task.<name>]`.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated configuration.
///
/// Only obtainable through `ConfigFile::try_from(RawConfigFile)`, so holders
/// can rely on the task graph being acyclic and every reference resolving.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    script: ScriptSection,
    stylesheet: StylesheetSection,
    markup: MarkupSection,
    lint: LintSection,
    watch: WatchSection,
    env: EnvSection,
    task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile, task: BTreeMap<String, TaskConfig>) -> Self {
        Self {
            script: raw.script,
            stylesheet: raw.stylesheet,
            markup: raw.markup,
            lint: raw.lint,
            watch: raw.watch,
            env: raw.env,
            task,
        }
    }

    pub fn script(&self) -> &ScriptSection {
        &self.script
    }

    pub fn stylesheet(&self) -> &StylesheetSection {
        &self.stylesheet
    }

    pub fn markup(&self) -> &MarkupSection {
        &self.markup
    }

    pub fn lint(&self) -> &LintSection {
        &self.lint
    }

    pub fn watch(&self) -> &WatchSection {
        &self.watch
    }

    pub fn env(&self) -> &EnvSection {
        &self.env
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }

    /// Substitution values for a variant, with `NODE_ENV` always set.
    pub fn env_values(&self, variant: BuildVariant) -> BTreeMap<String, String> {
        let mut values = match variant {
            BuildVariant::Development => self.env.development.clone(),
            BuildVariant::Production => self.env.production.clone(),
        };
        values.insert("NODE_ENV".to_string(), variant.as_str().to_string());
        values
    }

    /// Every artifact path (relative to the project root) any variant can produce.
    pub fn artifact_paths(&self) -> Vec<String> {
        let script = &self.script;
        let mut paths = vec![
            script.output.clone(),
            format!("{}.map", script.output),
            script.output_production.clone(),
            format!("{}.map", script.output_production),
            self.stylesheet.output.clone(),
            format!("{}.map", self.stylesheet.output),
            self.markup.output.clone(),
        ];
        paths.dedup();
        paths
    }
}

/// `[script]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptSection {
    /// Root module of the bundle.
    #[serde(default = "default_script_entry")]
    pub entry: String,

    /// Extensions tried, in order, when a relative specifier has none.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Specifiers left to the host environment.
    #[serde(default)]
    pub externals: Vec<String>,

    /// Development bundle path.
    #[serde(default = "default_script_output")]
    pub output: String,

    /// Production bundle path.
    #[serde(default = "default_script_output_production")]
    pub output_production: String,

    /// Emit `<output>.map` for development builds.
    #[serde(default = "default_true")]
    pub source_map: bool,

    /// Replace unknown `process.env.*` references with `undefined`.
    #[serde(default = "default_true")]
    pub purge_env: bool,

    /// External syntax transformer (reads stdin, writes stdout).
    #[serde(default)]
    pub syntax_cmd: Option<String>,

    /// External minifier (reads stdin, writes stdout).
    #[serde(default)]
    pub minify_cmd: Option<String>,

    /// Globs whose changes re-run the bundle even before the file is part of
    /// the resolved module graph.
    #[serde(default = "default_script_watch")]
    pub watch: Vec<String>,
}

impl ScriptSection {
    pub fn output_for(&self, variant: BuildVariant) -> &str {
        match variant {
            BuildVariant::Development => &self.output,
            BuildVariant::Production => &self.output_production,
        }
    }
}

impl Default for ScriptSection {
    fn default() -> Self {
        Self {
            entry: default_script_entry(),
            extensions: default_extensions(),
            externals: Vec::new(),
            output: default_script_output(),
            output_production: default_script_output_production(),
            source_map: true,
            purge_env: true,
            syntax_cmd: None,
            minify_cmd: None,
            watch: default_script_watch(),
        }
    }
}

/// `[stylesheet]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StylesheetSection {
    #[serde(default = "default_stylesheet_entry")]
    pub entry: String,

    #[serde(default = "default_stylesheet_output")]
    pub output: String,

    #[serde(default = "default_stylesheet_watch")]
    pub watch: Vec<String>,
}

impl Default for StylesheetSection {
    fn default() -> Self {
        Self {
            entry: default_stylesheet_entry(),
            output: default_stylesheet_output(),
            watch: default_stylesheet_watch(),
        }
    }
}

/// `[markup]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct MarkupSection {
    #[serde(default = "default_markup_template")]
    pub template: String,

    #[serde(default = "default_markup_output")]
    pub output: String,
}

impl Default for MarkupSection {
    fn default() -> Self {
        Self {
            template: default_markup_template(),
            output: default_markup_output(),
        }
    }
}

/// `[lint]` section.
///
/// Either `cmd` names an external linter, or the `deny` regexes are checked
/// line by line over every included file.
#[derive(Debug, Clone, Deserialize)]
pub struct LintSection {
    #[serde(default = "default_lint_include")]
    pub include: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default = "default_lint_deny")]
    pub deny: Vec<String>,

    #[serde(default)]
    pub cmd: Option<String>,
}

impl Default for LintSection {
    fn default() -> Self {
        Self {
            include: default_lint_include(),
            exclude: Vec::new(),
            deny: default_lint_deny(),
            cmd: None,
        }
    }
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Debounce window in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Task whose closure is built initially and kept fresh.
    #[serde(default = "default_watch_target")]
    pub target: String,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            target: default_watch_target(),
        }
    }
}

/// `[env.development]` / `[env.production]` substitution values.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EnvSection {
    #[serde(default)]
    pub development: BTreeMap<String, String>,

    #[serde(default)]
    pub production: BTreeMap<String, String>,
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// What the task does.
    pub action: TaskAction,

    /// Dependency list: this task waits for all tasks listed here.
    #[serde(default)]
    pub after: Vec<String>,
}

impl TaskConfig {
    pub fn new(action: TaskAction, after: &[&str]) -> Self {
        Self {
            action,
            after: after.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// The standard task table used when the config declares no tasks.
pub fn default_tasks() -> BTreeMap<String, TaskConfig> {
    let mut tasks = BTreeMap::new();
    tasks.insert("lint".to_string(), TaskConfig::new(TaskAction::Lint, &[]));
    tasks.insert(
        "js-bundle".to_string(),
        TaskConfig::new(TaskAction::JsBundle, &["lint"]),
    );
    tasks.insert("markup".to_string(), TaskConfig::new(TaskAction::Markup, &[]));
    tasks.insert(
        "stylesheet".to_string(),
        TaskConfig::new(TaskAction::Stylesheet, &[]),
    );
    tasks.insert(
        "production".to_string(),
        TaskConfig::new(
            TaskAction::Group,
            &["lint", "js-bundle", "markup", "stylesheet"],
        ),
    );
    tasks.insert(
        "development".to_string(),
        TaskConfig::new(TaskAction::Group, &["js-bundle", "markup", "stylesheet"]),
    );
    tasks.insert("clean".to_string(), TaskConfig::new(TaskAction::Clean, &[]));
    tasks
}

fn default_true() -> bool {
    true
}

fn default_script_entry() -> String {
    "js/app.js".to_string()
}

fn default_extensions() -> Vec<String> {
    vec![".js".to_string(), ".jsx".to_string()]
}

fn default_script_output() -> String {
    "lib/bundle.js".to_string()
}

fn default_script_output_production() -> String {
    "lib/bundle.min.js".to_string()
}

fn default_script_watch() -> Vec<String> {
    vec!["js/**/*.js".to_string(), "js/**/*.jsx".to_string()]
}

fn default_stylesheet_entry() -> String {
    "sass/main.scss".to_string()
}

fn default_stylesheet_output() -> String {
    "css/main.css".to_string()
}

fn default_stylesheet_watch() -> Vec<String> {
    vec!["sass/**/*.scss".to_string()]
}

fn default_markup_template() -> String {
    "index-template.html".to_string()
}

fn default_markup_output() -> String {
    "index.html".to_string()
}

fn default_lint_include() -> Vec<String> {
    vec!["js/**/*.js".to_string(), "js/**/*.jsx".to_string()]
}

fn default_lint_deny() -> Vec<String> {
    vec![r"\bdebugger\b".to_string()]
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_watch_target() -> String {
    "development".to_string()
}
