//! Toolchain subprocesses.
//!
//! Output is captured rather than inherited so it cannot draw over the
//! progress display. On failure the exit status and both streams go to the
//! module logger.

use crossbuild_core::Logger;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// A program invocation.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
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

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Run to completion. Returns whether the program exited successfully.
    pub async fn run(&self, logger: &Logger) -> bool {
        logger.debug(format!("running {} {}", self.program, self.args.join(" ")));

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &self.dir {
            command.current_dir(dir);
        }

        let output = match command.output().await {
            Ok(output) => output,
            Err(e) => {
                logger.error(format!("failed to start {}: {e}", self.program));
                return false;
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if output.status.success() {
            for line in stdout.lines().chain(stderr.lines()) {
                logger.debug(line);
            }
            return true;
        }

        logger.error(format!("{} exited with {}", self.program, output.status));
        for line in stdout.lines() {
            logger.info(line);
        }
        for line in stderr.lines() {
            logger.error(line);
        }
        false
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crossbuild_core::LogLevel;

    #[tokio::test]
    async fn test_successful_command() {
        let logger = Logger::new("proc", LogLevel::Debug);
        let ok = Invocation::new("sh")
            .args(["-c", "echo $GREETING"])
            .env("GREETING", "hi")
            .run(&logger)
            .await;
        assert!(ok);
        assert!(logger.lines().contains(&"proc DEBUG hi".to_string()));
    }

    #[tokio::test]
    async fn test_failing_command_logs_streams() {
        let logger = Logger::new("proc", LogLevel::Info);
        let ok = Invocation::new("sh")
            .args(["-c", "echo oops >&2; exit 3"])
            .run(&logger)
            .await;
        assert!(!ok);
        let lines = logger.lines();
        assert!(lines[0].starts_with("proc ERROR sh exited with"), "{lines:?}");
        assert!(lines.contains(&"proc ERROR oops".to_string()));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let logger = Logger::new("proc", LogLevel::Info);
        assert!(!Invocation::new("definitely-not-a-real-binary-xyz").run(&logger).await);
        assert!(logger.lines()[0].contains("failed to start"));
    }

    #[tokio::test]
    async fn test_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Logger::new("proc", LogLevel::Info);
        let ok = Invocation::new("sh")
            .args(["-c", "touch marker"])
            .dir(dir.path())
            .run(&logger)
            .await;
        assert!(ok);
        assert!(dir.path().join("marker").exists());
    }
}
