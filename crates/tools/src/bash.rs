//! Bash executor: run a configured command template as a subprocess.
//!
//! Arguments are substituted into `{{name}}` placeholders. One argument may
//! instead be piped to stdin. Each command runs in its own process group,
//! which is killed when the call is cancelled.

use regex::Regex;
use scribe_core::{argument_to_string, ToolError};
use std::process::Stdio;
use std::sync::LazyLock;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("placeholder regex is valid"));

type Arguments = serde_json::Map<String, serde_json::Value>;

/// Substitute `{{name}}` placeholders with argument values.
///
/// Non-string values are JSON-encoded. A placeholder without a matching
/// (non-null) argument is an error.
pub fn format_command(template: &str, args: &Arguments) -> Result<String, ToolError> {
    let mut out = String::with_capacity(template.len());
    let mut cursor = 0;
    for caps in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = args
            .get(key.as_str())
            .filter(|v| !v.is_null())
            .ok_or_else(|| ToolError::MissingParameter {
                name: key.as_str().to_string(),
                command: template.to_string(),
            })?;
        out.push_str(&template[cursor..whole.start()]);
        out.push_str(&argument_to_string(value));
        cursor = whole.end();
    }
    out.push_str(&template[cursor..]);
    Ok(out)
}

/// A bash tool invocation, ready to run.
#[derive(Debug, Clone)]
pub struct BashInvocation<'a> {
    pub tool_name: &'a str,
    pub command: &'a str,
    pub stdin_param: Option<&'a str>,
}

impl BashInvocation<'_> {
    /// Run the command with `args` until it exits or `cancel` fires.
    ///
    /// Success yields stdout, with stderr appended under a `[stderr]`
    /// marker when non-empty. A non-zero exit is an execution failure.
    pub async fn run(&self, args: &Arguments, cancel: &CancellationToken) -> Result<String, ToolError> {
        let command = format_command(self.command, args)?;
        let stdin_data = self
            .stdin_param
            .and_then(|param| args.get(param))
            .map(argument_to_string);

        debug!(tool = self.tool_name, command = %command, "Executing bash tool");

        let mut child = shell(&command)
            .stdin(if stdin_data.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.failed(format!("failed to spawn: {e}")))?;
        let group = child.id();

        if let (Some(data), Some(mut stdin)) = (stdin_data, child.stdin.take()) {
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(data.as_bytes()).await {
                    debug!(error = %e, "Child closed stdin early");
                }
            });
        }
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Background jobs inherit the pipes, so the output is only complete
        // once every process holding them is gone.
        let finished = {
            let collect = async { tokio::join!(child.wait(), read_all(stdout), read_all(stderr)) };
            tokio::pin!(collect);
            tokio::select! {
                done = &mut collect => Some(done),
                _ = cancel.cancelled() => None,
            }
        };
        let Some((status, stdout, stderr)) = finished else {
            self.terminate(&mut child, group).await;
            return Err(ToolError::Cancelled(self.tool_name.to_string()));
        };
        let status = status.map_err(|e| self.failed(e.to_string()))?;

        if status.success() {
            if stderr.trim().is_empty() {
                Ok(stdout)
            } else {
                Ok(format!("{stdout}\n[stderr]\n{stderr}"))
            }
        } else {
            let code = status.code().unwrap_or(-1);
            warn!(tool = self.tool_name, exit_code = code, "Command failed");
            Err(self.failed(format!("exit code {code}\n{stdout}\n{stderr}").trim_end().to_string()))
        }
    }

    /// Kill the command's whole process group, then the shell itself. The
    /// group id is the shell's pid, taken at spawn since a reaped child no
    /// longer reports one.
    async fn terminate(&self, child: &mut Child, group: Option<u32>) {
        #[cfg(unix)]
        if let Some(pid) = group {
            let group = nix::unistd::Pid::from_raw(pid as i32);
            if let Err(e) = nix::sys::signal::killpg(group, nix::sys::signal::Signal::SIGKILL) {
                debug!(tool = self.tool_name, error = %e, "Process group already gone");
            }
        }
        #[cfg(not(unix))]
        let _ = group;
        if let Err(e) = child.kill().await {
            debug!(tool = self.tool_name, error = %e, "Cancelled command already exited");
        }
    }

    fn failed(&self, reason: String) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: self.tool_name.to_string(),
            reason,
        }
    }
}

fn shell(command: &str) -> Command {
    if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

async fn read_all<R: AsyncRead + Unpin>(stream: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        if let Err(e) = stream.read_to_end(&mut buf).await {
            debug!(error = %e, "Reading command output failed");
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
