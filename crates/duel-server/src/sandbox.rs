//! Sandbox execution (§6.4): an HTTP call to an external code-execution
//! service. This crate owns no execution logic itself — the judging
//! pipeline's `Sandbox` trait is the entire contract, matching §9's
//! "cyclic references... replaced with explicit interface boundaries".

use duel_judge::Sandbox;
use duel_judge::SandboxRequest;
use duel_judge::SandboxResponse;
use serde::Deserialize;
use serde::Serialize;

#[derive(Clone)]
pub struct HttpSandbox {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSandbox {
    pub fn from_env() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: std::env::var("SANDBOX_URL").expect("SANDBOX_URL must be set"),
        }
    }
}

#[derive(Serialize)]
struct ExecuteBody<'a> {
    language: &'a str,
    code: &'a str,
    stdin: &'a str,
    timeout_ms: u64,
}

#[derive(Deserialize)]
struct ExecuteResponse {
    stdout: String,
    stderr: String,
    exit_code: i32,
    execution_time_ms: u64,
    memory_bytes: u64,
    timed_out: bool,
}

impl Sandbox for HttpSandbox {
    async fn execute(&self, request: SandboxRequest<'_>) -> anyhow::Result<SandboxResponse> {
        let body = ExecuteBody {
            language: request.language,
            code: request.code,
            stdin: request.test_input_json,
            timeout_ms: request.timeout_ms,
        };
        let response = self
            .client
            .post(format!("{}/execute", self.base_url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<ExecuteResponse>()
            .await?;
        Ok(SandboxResponse {
            stdout: response.stdout,
            stderr: response.stderr,
            exit_code: response.exit_code,
            execution_time_ms: response.execution_time_ms,
            memory_bytes: response.memory_bytes,
            timed_out: response.timed_out,
        })
    }
}
