//! Process launching for capability probes
//!
//! Probing runs the clangd binary once with `--help` and captures its output.
//! The launcher is a trait so tests can count spawns or fake the output
//! without a clangd installation.

use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, `-1` when terminated by a signal
    pub exit_code: i32,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Spawns an executable and captures its output
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Run `program` with `args` to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be started at all (binary not
    /// found, permission denied). A non-zero exit is not an error.
    async fn run(&self, program: &str, args: &[String]) -> io::Result<ProcessOutput>;
}

/// Launcher backed by `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessLauncher;

impl TokioProcessLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessLauncher for TokioProcessLauncher {
    async fn run(&self, program: &str, args: &[String]) -> io::Result<ProcessOutput> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn()?;

        let stdout_handle = child.stdout.take();
        let stderr_handle = child.stderr.take();

        let stdout_future = async {
            match stdout_handle {
                Some(stdout) => collect_lines(BufReader::new(stdout)).await,
                None => String::new(),
            }
        };
        let stderr_future = async {
            match stderr_handle {
                Some(stderr) => collect_lines(BufReader::new(stderr)).await,
                None => String::new(),
            }
        };

        let (stdout, stderr) = tokio::join!(stdout_future, stderr_future);
        let exit_code = child.wait().await?.code().unwrap_or(-1);

        tracing::debug!(program, exit_code, "Process finished");
        Ok(ProcessOutput {
            stdout,
            stderr,
            exit_code,
        })
    }
}

async fn collect_lines<R: tokio::io::AsyncBufRead + Unpin>(reader: R) -> String {
    let mut lines = reader.lines();
    let mut output = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        output.push_str(&line);
        output.push('\n');
    }
    output
}
