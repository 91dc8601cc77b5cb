/// One request to execute a submission against a single test case (§6.4).
pub struct SandboxRequest<'a> {
    pub language: &'a str,
    pub code: &'a str,
    pub test_input_json: &'a str,
    pub timeout_ms: u64,
}

/// The executor's deterministic I/O contract response (§6.4): the program
/// writes a JSON result to stdout, and the executor separately reports
/// resource usage and whether it hit a limit.
#[derive(Debug, Clone)]
pub struct SandboxResponse {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub execution_time_ms: u64,
    pub memory_bytes: u64,
    pub timed_out: bool,
}

/// External collaborator (§6.4): sandboxed code execution. The judging
/// pipeline depends only on this trait, never on a concrete sandbox
/// implementation (§9 "cyclic references... replaced with explicit
/// interface boundaries").
#[allow(async_fn_in_trait)]
pub trait Sandbox {
    async fn execute(&self, request: SandboxRequest<'_>) -> anyhow::Result<SandboxResponse>;
}
