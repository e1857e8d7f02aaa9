// src/tools/lint.rs

use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use regex::Regex;

use crate::exec::command::run_command;
use crate::fs::FileSystem;
use crate::types::BoxFuture;

/// Style checker over a set of project-relative files.
///
/// Resolves to the list of problems found; an empty list means the files
/// passed. `Err` is reserved for the linter itself failing to run.
pub trait Linter: Send + Sync + Debug {
    fn lint<'a>(&'a self, files: &'a [String]) -> BoxFuture<'a, Result<Vec<String>>>;
}

/// Flags every line matching one of the deny patterns.
#[derive(Debug, Clone)]
pub struct PatternLinter {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    deny: Vec<Regex>,
}

impl PatternLinter {
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>, deny: &[String]) -> Result<Self> {
        let deny = deny
            .iter()
            .map(|p| Regex::new(p).with_context(|| format!("invalid deny pattern '{p}'")))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            fs,
            root: root.into(),
            deny,
        })
    }

    fn check(&self, file: &str) -> Result<Vec<String>> {
        let content = self.fs.read_to_string(&self.root.join(file))?;
        let mut problems = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            for re in &self.deny {
                if re.is_match(line) {
                    problems.push(format!("{file}:{}: matches `{}`", idx + 1, re.as_str()));
                }
            }
        }
        Ok(problems)
    }
}

impl Linter for PatternLinter {
    fn lint<'a>(&'a self, files: &'a [String]) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(async move {
            let mut problems = Vec::new();
            for file in files {
                problems.extend(self.check(file)?);
            }
            Ok(problems)
        })
    }
}

/// Runs an external linter with the files appended as arguments.
/// A non-zero exit fails the lint with the tool's output as problems.
#[derive(Debug, Clone)]
pub struct CommandLinter {
    cmd: String,
    root: PathBuf,
}

impl CommandLinter {
    pub fn new(cmd: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            cmd: cmd.into(),
            root: root.into(),
        }
    }
}

impl Linter for CommandLinter {
    fn lint<'a>(&'a self, files: &'a [String]) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(async move {
            let mut cmd = self.cmd.clone();
            for file in files {
                cmd.push(' ');
                cmd.push_str(&shell_quote(file));
            }

            let out = run_command(&cmd, &self.root, None).await?;
            if out.success {
                return Ok(Vec::new());
            }

            let mut problems: Vec<String> = out
                .stdout
                .lines()
                .chain(out.stderr.lines())
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect();
            if problems.is_empty() {
                problems.push(format!("'{}' exited with code {}", self.cmd, out.code));
            }
            Ok(problems)
        })
    }
}

fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[tokio::test]
    async fn deny_patterns_report_file_and_line() {
        let fs = MockFileSystem::new();
        fs.add_file("/project/js/app.js", "var a = 1;\ndebugger;\n");
        fs.add_file("/project/js/ok.js", "var b = 2;\n");

        let linter = PatternLinter::new(Arc::new(fs), "/project", &[r"\bdebugger\b".to_string()]).unwrap();
        let files = vec!["js/app.js".to_string(), "js/ok.js".to_string()];
        let problems = linter.lint(&files).await.unwrap();

        assert_eq!(problems, vec![r"js/app.js:2: matches `\bdebugger\b`".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_exit_status_decides() {
        let dir = std::env::temp_dir();
        let files = vec!["a b.js".to_string()];

        let pass = CommandLinter::new("true", &dir);
        assert!(pass.lint(&files).await.unwrap().is_empty());

        let fail = CommandLinter::new("echo found >&2; false", &dir);
        assert_eq!(fail.lint(&files).await.unwrap(), vec!["found".to_string()]);
    }
}
