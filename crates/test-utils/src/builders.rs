use spabuild::config::{ConfigFile, RawConfigFile, TaskConfig};
use spabuild::errors::Result;
use spabuild::types::{BuildVariant, TaskAction};

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from the built-in defaults. Without any `with_task` call the
/// standard task table is used.
#[derive(Debug, Default)]
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_entry(mut self, entry: &str) -> Self {
        self.config.script.entry = entry.to_string();
        self
    }

    pub fn with_external(mut self, name: &str) -> Self {
        self.config.script.externals.push(name.to_string());
        self
    }

    pub fn with_source_map(mut self, enabled: bool) -> Self {
        self.config.script.source_map = enabled;
        self
    }

    pub fn with_env(mut self, variant: BuildVariant, key: &str, value: &str) -> Self {
        let env = match variant {
            BuildVariant::Development => &mut self.config.env.development,
            BuildVariant::Production => &mut self.config.env.production,
        };
        env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_lint_deny(mut self, pattern: &str) -> Self {
        self.config.lint.deny.push(pattern.to_string());
        self
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.config.watch.debounce_ms = ms;
        self
    }

    pub fn with_watch_target(mut self, target: &str) -> Self {
        self.config.watch.target = target.to_string();
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

/// Builder for `TaskConfig`.
#[derive(Debug)]
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(action: TaskAction) -> Self {
        Self {
            task: TaskConfig::new(action, &[]),
        }
    }

    pub fn group() -> Self {
        Self::new(TaskAction::Group)
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
