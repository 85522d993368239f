use std::process::Stdio;

use tokio::process::Command;
use tracing::trace;

use crate::error::{ExecError, ExecResult};

pub fn cmd_program<I, S>(program: &str, args: I) -> Command
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.stdin(Stdio::null());
    // Cancelled runtime calls must not leave CLI processes behind.
    cmd.kill_on_drop(true);
    cmd
}

/// Run to completion and return trimmed stdout; a failing exit becomes [`ExecError::NonZeroExit`].
pub async fn run_captured(mut cmd: Command) -> ExecResult<String> {
    trace!(target: "hive.exec", cmd = ?cmd.as_std(), "spawn");
    let output = cmd
        .output()
        .await
        .map_err(|e| ExecError::Spawn(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return match output.status.code() {
            Some(code) => Err(ExecError::NonZeroExit { code, stderr }),
            None => Err(ExecError::KilledBySignal),
        };
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
