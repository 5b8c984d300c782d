//! Adapter for the external programs that do the numerical work and the
//! downloading.
//!
//! Every call is described by an [`Invocation`] and executed by a [`Runner`],
//! so a failing program surfaces as a [`ToolError`] instead of a line lost in
//! the console.

pub mod cdo;

use std::{
    path::{Path, PathBuf},
    process::Command,
};

use log::{debug, info};

use crate::errors::ToolError;

pub use cdo::{Cdo, Operator};

/// A fully specified program call.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    /// Let the program talk to the terminal instead of capturing its output.
    pub interactive: bool,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Invocation {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            interactive: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    pub fn in_dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    pub fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    /// Shell-like rendering, for logs and error messages.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// What a finished program left behind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    /// Exit code, `None` if the program was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Outcome {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

pub trait Runner {
    fn run(&mut self, invocation: &Invocation) -> Result<Outcome, ToolError>;
}

/// Runs programs as child processes, one at a time.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl Runner for SystemRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<Outcome, ToolError> {
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        if let Some(dir) = &invocation.current_dir {
            command.current_dir(dir);
        }

        let spawn_error = |source| ToolError::Spawn {
            program: invocation.program.clone(),
            source,
        };

        if invocation.interactive {
            let status = command.status().map_err(spawn_error)?;
            return Ok(Outcome {
                status: status.code(),
                ..Outcome::default()
            });
        }

        let output = command.output().map_err(spawn_error)?;

        Ok(Outcome {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Runs `invocation` and turns a non-zero exit into an error.
pub fn run_checked<R: Runner + ?Sized>(
    runner: &mut R,
    invocation: &Invocation,
) -> Result<Outcome, ToolError> {
    info!("Running command: {}", invocation.command_line());

    let outcome = runner.run(invocation)?;
    if !outcome.success() {
        return Err(ToolError::Failed {
            command: invocation.command_line(),
            status: outcome
                .status
                .map_or_else(|| "signal".to_string(), |code| code.to_string()),
            stderr: outcome.stderr.trim().to_string(),
        });
    }

    if !outcome.stderr.trim().is_empty() {
        debug!("{}", outcome.stderr.trim());
    }

    Ok(outcome)
}


// -- Tests -------------------------------------------------------------------
