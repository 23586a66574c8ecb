//! External child processes: cscript hooks and SITE EXEC commands.

use crate::config::{Config, CscriptType};
use crate::constants::CHILD_SHUTDOWN_TIMEOUT_SECS;
use crate::core_network::interrupt::Interrupter;
use log::{debug, warn};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};

/// A spawned child whose stdout is consumed line by line.
///
/// `close` waits briefly for a clean exit, then kills; dropping without
/// closing lets tokio reap the child in the background.
pub struct ProcessReader {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
}

impl ProcessReader {
    pub fn spawn(program: &str, args: &[String]) -> std::io::Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("child stdout missing"))?;
        Ok(Self {
            child,
            lines: BufReader::new(stdout).lines(),
        })
    }

    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        self.lines.next_line().await
    }

    /// Waits out the child and reports whether it exited successfully.
    pub async fn close(mut self) -> std::io::Result<bool> {
        let grace = Duration::from_secs(CHILD_SHUTDOWN_TIMEOUT_SECS);
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => Ok(status?.success()),
            Err(_) => {
                self.child.kill().await?;
                let status = self.child.wait().await?;
                Ok(status.success())
            }
        }
    }
}

/// Exit status of one hook run.
pub enum HookOutcome {
    Passed,
    Vetoed,
}

/// Runs every cscript configured for `verb` at the given stage.
///
/// PRE hooks may veto the command: the first nonzero exit stops the run and
/// returns `Vetoed`. POST hooks are informational; failures are logged and
/// ignored.
pub async fn run_cscripts(
    config: &Config,
    hook: CscriptType,
    verb: &str,
    user_name: &str,
    command_line: &str,
    interrupter: &Interrupter,
) -> HookOutcome {
    for cscript in &config.cscript {
        if cscript.hook != hook || !cscript.command.eq_ignore_ascii_case(verb) {
            continue;
        }
        let args = vec![user_name.to_string(), command_line.to_string()];
        debug!("Running {:?} cscript {} for {}", hook, cscript.path, verb);
        let mut reader = match ProcessReader::spawn(&cscript.path, &args) {
            Ok(reader) => reader,
            Err(e) => {
                warn!("Failed to spawn cscript {}: {}", cscript.path, e);
                continue;
            }
        };
        // Drain output so the child never blocks on a full pipe; a session
        // kick abandons the drain and falls through to the bounded close.
        loop {
            let line = tokio::select! {
                biased;
                _ = interrupter.wait() => break,
                line = reader.next_line() => line,
            };
            match line {
                Ok(Some(line)) => debug!("cscript {}: {}", cscript.path, line),
                _ => break,
            }
        }
        match reader.close().await {
            Ok(true) => {}
            Ok(false) if hook == CscriptType::Pre => return HookOutcome::Vetoed,
            Ok(false) => {}
            Err(e) => warn!("cscript {} did not shut down cleanly: {}", cscript.path, e),
        }
    }
    HookOutcome::Passed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reader_streams_lines_and_reports_status() {
        let mut reader =
            ProcessReader::spawn("/bin/sh", &["-c".to_string(), "echo one; echo two".to_string()])
                .unwrap();
        assert_eq!(reader.next_line().await.unwrap().unwrap(), "one");
        assert_eq!(reader.next_line().await.unwrap().unwrap(), "two");
        assert!(reader.next_line().await.unwrap().is_none());
        assert!(reader.close().await.unwrap());
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported() {
        let mut reader =
            ProcessReader::spawn("/bin/sh", &["-c".to_string(), "exit 3".to_string()]).unwrap();
        while reader.next_line().await.unwrap().is_some() {}
        assert!(!reader.close().await.unwrap());
    }

    #[tokio::test]
    async fn pre_cscript_veto() {
        let config: Config = toml::from_str(
            r#"
            [server]
            root_dir = "/srv/ftp"
            users_file = "users.toml"

            [[cscript]]
            command = "STOR"
            path = "/bin/false"
            type = "pre"
            "#,
        )
        .unwrap();
        let interrupter = Interrupter::new();
        match run_cscripts(&config, CscriptType::Pre, "STOR", "alice", "STOR f", &interrupter).await
        {
            HookOutcome::Vetoed => {}
            HookOutcome::Passed => panic!("expected veto"),
        }
        // The same failing program as a POST hook is ignored.
        match run_cscripts(&config, CscriptType::Post, "STOR", "alice", "STOR f", &interrupter).await
        {
            HookOutcome::Passed => {}
            HookOutcome::Vetoed => panic!("POST hooks cannot veto"),
        }
    }
}
