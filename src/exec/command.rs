// src/exec/command.rs

//! Subprocess helpers for command-backed collaborators.

use std::path::Path;
use std::process::{Output, Stdio};

use anyhow::{Context, Result, bail};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Output of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Build a shell command appropriate for the platform.
fn shell_command(cmd: &str, cwd: &Path) -> Command {
    let mut c = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };
    c.current_dir(cwd).kill_on_drop(true);
    c
}

/// Run `cmd` with `input` on stdin and collect its output.
///
/// Output is decoded lossily; it is only used for diagnostics.
pub async fn run_command(cmd: &str, cwd: &Path, input: Option<&str>) -> Result<CommandOutput> {
    let output = run_raw(cmd, cwd, input).await?;
    Ok(CommandOutput {
        success: output.status.success(),
        code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

async fn run_raw(cmd: &str, cwd: &Path, input: Option<&str>) -> Result<Output> {
    debug!(cmd = %cmd, cwd = %cwd.display(), "spawning command");

    let mut command = shell_command(cmd, cwd);
    command
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning '{cmd}'"))?;

    if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
        let bytes = input.as_bytes().to_vec();
        // stdin must be fed while stdout is drained.
        tokio::spawn(async move {
            let _ = stdin.write_all(&bytes).await;
            let _ = stdin.shutdown().await;
        });
    }

    child
        .wait_with_output()
        .await
        .with_context(|| format!("waiting for '{cmd}'"))
}

/// Pipe `input` through `cmd` and return its stdout.
///
/// Fails on non-zero exit and on stdout that is not valid UTF-8.
pub async fn run_filter(cmd: &str, cwd: &Path, input: &str) -> Result<String> {
    let out = run_raw(cmd, cwd, Some(input)).await?;
    if !out.status.success() {
        bail!(
            "'{cmd}' exited with code {}: {}",
            out.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&out.stderr).trim()
        );
    }
    String::from_utf8(out.stdout).with_context(|| format!("'{cmd}' wrote invalid UTF-8"))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn filter_round_trips_stdin() {
        let out = run_filter("tr a-z A-Z", Path::new("."), "hello").await.unwrap();
        assert_eq!(out, "HELLO");
    }

    #[tokio::test]
    async fn filter_reports_exit_code() {
        let err = run_filter("echo nope >&2; exit 3", Path::new("."), "")
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("code 3"), "{msg}");
        assert!(msg.contains("nope"), "{msg}");
    }

    #[tokio::test]
    async fn filter_rejects_invalid_utf8() {
        let err = run_filter("printf 'ok\\377'", Path::new("."), "")
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("invalid UTF-8"), "{err:#}");
    }
}
