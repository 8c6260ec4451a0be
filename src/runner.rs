// runner.rs - External command execution
// Purpose: Run discovery tools as argument vectors, feed stdin in-process,
//          capture stdout and enforce a per-invocation timeout

use crate::error::{ReconError, Result};
use std::fmt;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

/// Long-running harvesters (waybackurls, gau) regularly need close to this.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const STDERR_PREVIEW: usize = 200;

// ═══════════════════════════════════════════════════════════════════════════
// INVOCATION
// ═══════════════════════════════════════════════════════════════════════════

/// One external process call. `stdin`, when set, is written to the child's
/// standard input, replacing `cat file | tool` style pipelines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            timeout: DEFAULT_TIMEOUT,
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

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        if let Some(ref input) = self.stdin {
            write!(f, " < [{} lines]", input.lines().count())?;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// RUNNER
// ═══════════════════════════════════════════════════════════════════════════

/// Seam between the pipeline and the operating system.
pub trait CommandRunner: Send + Sync {
    /// Whether `program` can be executed at all.
    fn is_available(&self, program: &str) -> bool;

    /// Run the invocation to completion and return its stdout.
    fn execute(&self, invocation: &Invocation) -> impl Future<Output = Result<String>> + Send;
}

/// Runs real processes through tokio.
#[derive(Debug, Default, Clone)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn is_available(&self, program: &str) -> bool {
        discover_tool_path(program).is_some()
    }

    async fn execute(&self, invocation: &Invocation) -> Result<String> {
        let program = discover_tool_path(&invocation.program)
            .unwrap_or_else(|| PathBuf::from(&invocation.program));

        let mut command = Command::new(&program);
        command
            .args(&invocation.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound => ReconError::ToolUnavailable(invocation.program.clone()),
            _ => ReconError::execution(&invocation.program, e.to_string()),
        })?;

        // Written from a separate task so a child that fills its stdout pipe
        // before draining stdin cannot deadlock us.
        let feeder = match (invocation.stdin.clone(), child.stdin.take()) {
            (Some(input), Some(mut stdin)) => Some(tokio::spawn(async move {
                stdin.write_all(input.as_bytes()).await
            })),
            _ => None,
        };

        let output = match timeout(invocation.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ReconError::execution(&invocation.program, e.to_string())),
            Err(_) => {
                return Err(ReconError::execution(
                    &invocation.program,
                    format!("timed out after {}s", invocation.timeout.as_secs()),
                ));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr: String = stderr.trim().chars().take(STDERR_PREVIEW).collect();
            let reason = match output.status.code() {
                Some(code) if stderr.is_empty() => format!("exit status {}", code),
                Some(code) => format!("exit status {}: {}", code, stderr),
                None => "terminated by signal".to_string(),
            };
            return Err(ReconError::execution(&invocation.program, reason));
        }

        // A tool may exit without reading all of its input (httpx -mc, head);
        // the resulting broken pipe is not an error.
        if let Some(feeder) = feeder {
            match feeder.await {
                Ok(Err(e)) if e.kind() != ErrorKind::BrokenPipe => {
                    return Err(ReconError::execution(
                        &invocation.program,
                        format!("writing stdin: {}", e),
                    ));
                }
                Err(e) => {
                    return Err(ReconError::execution(
                        &invocation.program,
                        format!("stdin writer aborted: {}", e),
                    ));
                }
                _ => {}
            }
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TOOL DISCOVERY
// ═══════════════════════════════════════════════════════════════════════════

/// Directories where Go/Rust/pip security tools usually land even when the
/// user never added them to PATH.
pub fn common_tool_paths() -> Vec<PathBuf> {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/root".to_string());
    let gopath = std::env::var("GOPATH").unwrap_or_else(|_| format!("{}/go", home));

    vec![
        PathBuf::from(format!("{}/bin", gopath)),
        PathBuf::from(format!("{}/go/bin", home)),
        PathBuf::from("/usr/local/go/bin"),
        PathBuf::from(format!("{}/.cargo/bin", home)),
        PathBuf::from("/usr/local/bin"),
        PathBuf::from("/usr/bin"),
        PathBuf::from("/bin"),
        PathBuf::from("/snap/bin"),
        PathBuf::from(format!("{}/.local/bin", home)),
        PathBuf::from("/opt/tools"),
    ]
}

/// Search PATH, then the common install locations, for an executable.
pub fn discover_tool_path(binary: &str) -> Option<PathBuf> {
    if binary.contains(std::path::MAIN_SEPARATOR) {
        let path = PathBuf::from(binary);
        return is_executable(&path).then_some(path);
    }

    let from_path = std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).collect::<Vec<_>>())
        .unwrap_or_default();

    from_path
        .into_iter()
        .chain(common_tool_paths())
        .map(|dir| dir.join(binary))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Canned outputs keyed by `program` or by `program arg1 arg2`.
    /// A program is "installed" when any key names it.
    #[derive(Default)]
    pub(crate) struct FakeRunner {
        outputs: HashMap<String, std::result::Result<String, String>>,
        calls: Mutex<Vec<Invocation>>,
    }

    impl FakeRunner {
        pub(crate) fn with_output(mut self, key: &str, output: &str) -> Self {
            self.outputs.insert(key.to_string(), Ok(output.to_string()));
            self
        }

        pub(crate) fn with_failure(mut self, key: &str, reason: &str) -> Self {
            self.outputs.insert(key.to_string(), Err(reason.to_string()));
            self
        }

        pub(crate) fn calls_to(&self, program: &str) -> Vec<Invocation> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|i| i.program == program)
                .cloned()
                .collect()
        }
    }

    impl CommandRunner for FakeRunner {
        fn is_available(&self, program: &str) -> bool {
            let prefix = format!("{} ", program);
            self.outputs
                .keys()
                .any(|k| k == program || k.starts_with(&prefix))
        }

        async fn execute(&self, invocation: &Invocation) -> Result<String> {
            self.calls.lock().unwrap().push(invocation.clone());

            let full = format!("{} {}", invocation.program, invocation.args.join(" "));
            let outcome = self
                .outputs
                .get(full.trim())
                .or_else(|| self.outputs.get(&invocation.program));

            match outcome {
                Some(Ok(out)) => Ok(out.clone()),
                Some(Err(reason)) => Err(ReconError::execution(&invocation.program, reason.clone())),
                None => Err(ReconError::ToolUnavailable(invocation.program.clone())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_display() {
        let inv = Invocation::new("subfinder").args(["-d", "example.com", "-silent"]);
        assert_eq!(inv.to_string(), "subfinder -d example.com -silent");

        let piped = Invocation::new("gf").arg("xss").stdin("a\nb\n");
        assert_eq!(piped.to_string(), "gf xss < [2 lines]");
    }

    #[test]
    fn test_invocation_defaults() {
        let inv = Invocation::new("gau");
        assert!(inv.args.is_empty());
        assert!(inv.stdin.is_none());
        assert_eq!(inv.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_missing_tool_not_discovered() {
        assert!(discover_tool_path("definitely-not-a-real-recon-tool-xyz").is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_captures_stdout() {
        let runner = SystemRunner::new();
        let out = runner
            .execute(&Invocation::new("echo").arg("admin.example.com"))
            .await
            .unwrap();
        assert_eq!(out.trim(), "admin.example.com");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_feeds_stdin() {
        let runner = SystemRunner::new();
        let out = runner
            .execute(&Invocation::new("cat").stdin("one\ntwo\n"))
            .await
            .unwrap();
        assert_eq!(out, "one\ntwo\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_tolerates_unread_stdin() {
        let runner = SystemRunner::new();
        let input = "https://example.com/\n".repeat(100_000);
        let out = runner
            .execute(&Invocation::new("true").stdin(input))
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_execute_missing_binary_is_unavailable() {
        let runner = SystemRunner::new();
        let err = runner
            .execute(&Invocation::new("definitely-not-a-real-recon-tool-xyz"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconError::ToolUnavailable(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_non_zero_exit() {
        let runner = SystemRunner::new();
        let err = runner.execute(&Invocation::new("false")).await.unwrap_err();
        assert!(matches!(err, ReconError::ToolExecution { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_timeout() {
        let runner = SystemRunner::new();
        let err = runner
            .execute(&Invocation::new("sleep").arg("5").timeout(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
