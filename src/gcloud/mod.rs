//! gcloud process execution
//!
//! Commands are described as [`Invocation`] values so they can be rendered for a
//! dry run or executed by a [`CommandRunner`].

use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::constants::env;


/// A single external command: program name plus argument vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append `--name value`
    pub fn flag(self, name: &str, value: impl Into<String>) -> Self {
        self.arg(format!("--{}", name)).arg(value)
    }

    /// Value following `--name`, if present
    pub fn flag_value(&self, name: &str) -> Option<&str> {
        let flag = format!("--{}", name);
        self.args
            .iter()
            .position(|a| *a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

/// Quote a word for POSIX shells, leaving plain words untouched
pub fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Executes invocations on behalf of the deploy service
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run to completion with the tool's output streamed to the terminal
    async fn run(&self, invocation: &Invocation) -> Result<()>;

    /// Run to completion and return trimmed stdout
    async fn capture(&self, invocation: &Invocation) -> Result<String>;
}

/// Runs invocations as real child processes
pub struct SystemRunner {
    binary: PathBuf,
}

impl SystemRunner {
    pub fn new(binary: impl AsRef<Path>) -> Self {
        Self {
            binary: binary.as_ref().to_path_buf(),
        }
    }

    fn command(&self, invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(&invocation.args).stdin(Stdio::null());
        debug!("Running command: {:?}", cmd);
        cmd
    }
}

impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<()> {
        info!("$ {}", invocation);
        let status = self
            .command(invocation)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .with_context(|| format!("Failed to execute {}", self.binary.display()))?;

        if !status.success() {
            anyhow::bail!("{} failed ({})", invocation.program, status);
        }
        Ok(())
    }

    async fn capture(&self, invocation: &Invocation) -> Result<String> {
        info!("$ {}", invocation);
        let output = self
            .command(invocation)
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .output()
            .await
            .with_context(|| format!("Failed to execute {}", self.binary.display()))?;

        if !output.status.success() {
            anyhow::bail!("{} failed ({})", invocation.program, output.status);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Find the gcloud binary: explicit path, then `AURA_GCLOUD`, then `PATH`
pub fn locate_gcloud(explicit: Option<&Path>) -> Result<PathBuf> {
    locate_gcloud_with(explicit, std::env::var_os(env::AURA_GCLOUD).map(PathBuf::from))
}

fn locate_gcloud_with(explicit: Option<&Path>, from_env: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit.map(Path::to_path_buf).or(from_env) {
        if !path.exists() {
            anyhow::bail!("gcloud binary not found at {}", path.display());
        }
        debug!("Using gcloud at {}", path.display());
        return Ok(path);
    }

    which::which("gcloud").context(
        "gcloud not found in PATH; install the Google Cloud SDK: https://cloud.google.com/sdk/docs/install",
    )
}
