// sh! command execution

use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{bail, Result};
use derive_builder::Builder;

#[derive(Clone, Debug)]
pub enum StreamMode {
    Inherit,
    Pipe,
}

impl StreamMode {
    fn stdio(&self) -> Stdio {
        match self {
            StreamMode::Inherit => Stdio::inherit(),
            StreamMode::Pipe => Stdio::piped(),
        }
    }
}

#[derive(Clone, Debug, Builder)]
#[builder(default)]
pub struct ShOptions {
    pub stdout: StreamMode,
    pub stderr: StreamMode,
    pub cwd: Option<PathBuf>,
    /// Do not log the command line.
    pub quiet: bool,
}

impl Default for ShOptions {
    fn default() -> Self {
        Self {
            stdout: StreamMode::Inherit,
            stderr: StreamMode::Inherit,
            cwd: None,
            quiet: false,
        }
    }
}

impl ShOptions {
    fn apply(&self, cmd: &mut Command) {
        cmd.stdout(self.stdout.stdio());
        cmd.stderr(self.stderr.stdio());
        if let Some(ref dir) = self.cwd {
            cmd.current_dir(dir);
        }
    }
}

#[derive(Debug)]
pub struct ShOutput {
    pub stdout: String,
}

#[macro_export]
macro_rules! sh {
    // Single command with explicit options
    (options($opts:expr), $cmd:expr $(,)?) => {{ $crate::sh::sh($cmd, &$opts) }};

    // Single command with default options
    ($cmd:expr $(,)?) => {{ $crate::sh::sh($cmd, &$crate::sh::ShOptions::default()) }};
}

/// Run `cmd` through `sh -c`, failing on a non-zero exit status.
pub fn sh<S: AsRef<str>>(cmd: S, opts: &ShOptions) -> Result<ShOutput> {
    let cmd = cmd.as_ref();
    if !opts.quiet {
        log::debug!("[sh] {}", cmd);
    }

    let mut command = Command::new("sh");
    command.arg("-c").arg(cmd);
    opts.apply(&mut command);

    let output = command.output()?;

    if !output.status.success() {
        bail!(
            "command failed: {}\nexit code: {:?}\n{}",
            cmd,
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stderr).trim_end(),
        );
    }

    Ok(ShOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captures_stdout() {
        let opts = ShOptionsBuilder::default()
            .stdout(StreamMode::Pipe)
            .quiet(true)
            .build()
            .unwrap();
        let out = crate::sh!(options(opts), "echo hello").unwrap();
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn test_failure_is_an_error() {
        let opts = ShOptionsBuilder::default()
            .stderr(StreamMode::Pipe)
            .build()
            .unwrap();
        let err = crate::sh!(options(opts), "echo oops >&2; exit 3").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("exit code: 3"));
        assert!(message.contains("oops"));
    }
}
