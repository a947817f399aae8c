//! E2B sandbox provider: runs commands through the E2B REST API.
//!
//! Only command execution goes through E2B; the sandbox id comes from each
//! [`CommandRequest`] rather than from client state, so one runner serves
//! every sandbox the orchestrator hands out.

use super::{CommandOutput, CommandRequest, CommandRunner};
use async_trait::async_trait;
use std::time::Duration;

/// Base URL for the E2B REST API.
pub const E2B_API_BASE: &str = "https://api.e2b.dev";

/// Extra HTTP time on top of the command timeout, so E2B reports the timeout
/// instead of the connection dropping first.
const HTTP_GRACE: Duration = Duration::from_secs(15);

pub struct E2bCommandRunner {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl E2bCommandRunner {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, E2B_API_BASE)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn effective_key(&self) -> String {
        if self.api_key.is_empty() {
            std::env::var("E2B_API_KEY").unwrap_or_default()
        } else {
            self.api_key.clone()
        }
    }
}

/// Quote one argument for `sh -c`.
fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg.chars().all(|c| {
            c.is_ascii_alphanumeric()
                || matches!(c, '-' | '_' | '.' | '/' | '=' | ':' | '@' | '+' | ',')
        });
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Render `command` + `args` as one shell command line.
pub fn shell_command_line(command: &str, args: &[String]) -> String {
    std::iter::once(command)
        .chain(args.iter().map(String::as_str))
        .map(shell_quote)
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl CommandRunner for E2bCommandRunner {
    async fn run_command(&self, request: &CommandRequest) -> anyhow::Result<CommandOutput> {
        let api_key = self.effective_key();
        anyhow::ensure!(!api_key.is_empty(), "E2B_API_KEY is not set");

        let url = format!(
            "{}/v0/sandboxes/{}/commands",
            self.base_url,
            urlencoding::encode(&request.sandbox_id)
        );
        let body = serde_json::json!({
            "cmd": shell_command_line(&request.command, &request.args),
            "workdir": request.working_dir,
            "timeout": request.timeout.as_secs().max(1),
        });

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .timeout(request.timeout + HTTP_GRACE)
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("E2B run_command request failed: {e}"))?;

        let status = resp.status();
        let body_text = resp
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable>".to_string());

        anyhow::ensure!(
            status.is_success(),
            "E2B API returned {status}: {body_text}"
        );

        let parsed: serde_json::Value = serde_json::from_str(&body_text)
            .map_err(|e| anyhow::anyhow!("Failed to parse E2B response: {e}\nBody: {body_text}"))?;

        let exit_code = parsed["exitCode"]
            .as_i64()
            .or_else(|| parsed["exit_code"].as_i64())
            .ok_or_else(|| anyhow::anyhow!("E2B response has no exit code\nBody: {body_text}"))?;

        Ok(CommandOutput {
            stdout: parsed["stdout"].as_str().unwrap_or("").to_string(),
            stderr: parsed["stderr"].as_str().unwrap_or("").to_string(),
            exit_code,
        })
    }
}
