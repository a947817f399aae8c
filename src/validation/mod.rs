//! Two-stage project validation: type-check, then build.
//!
//! Both stages run through the sandbox's [`CommandRunner`]. Their output is
//! parsed into [`ValidationError`]s (see [`parse`]); the build stage only runs
//! when the type-check produced no errors. A failing stage whose output
//! matches no known diagnostic form still yields one generic error, so an
//! unparsed failure can never pass as valid.

pub mod parse;

use crate::config::ValidationConfig;
use crate::sandbox::{CommandOutput, CommandRequest, CommandRunner, SandboxContext};
use crate::tools::error::ToolError;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    TypeCheck,
    Build,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeCheck => write!(f, "type-check"),
            Self::Build => write!(f, "build"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    Syntax,
}

/// One normalized diagnostic, whatever tool printed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    pub message: String,
    pub kind: DiagnosticKind,
    pub severity: Severity,
    /// Tool-specific code such as `TS2304`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub stage: Stage,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageReport {
    pub stage: Stage,
    pub passed: bool,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i64>,
    pub duration_ms: u64,
    pub error_count: usize,
    pub warning_count: usize,
    /// Truncated combined output; reported through `technical_details`.
    #[serde(skip)]
    pub raw_output: String,
}

impl StageReport {
    fn skipped(stage: Stage) -> Self {
        Self {
            stage,
            passed: false,
            skipped: true,
            exit_code: None,
            duration_ms: 0,
            error_count: 0,
            warning_count: 0,
            raw_output: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationError>,
    pub stages: Vec<StageReport>,
}

impl ValidationReport {
    /// Raw stage output for diagnostics.
    pub fn technical_details(&self) -> Value {
        let stages: Vec<Value> = self
            .stages
            .iter()
            .filter(|s| !s.skipped)
            .map(|s| {
                json!({
                    "stage": s.stage,
                    "exitCode": s.exit_code,
                    "rawOutput": s.raw_output,
                })
            })
            .collect();
        json!({ "stages": stages })
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut.
pub fn truncate_output(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            let dropped = text[idx..].chars().count();
            format!("{}\n... [truncated {dropped} chars]", &text[..idx])
        }
        None => text.to_string(),
    }
}

struct StageOutcome {
    report: StageReport,
    errors: Vec<ValidationError>,
    warnings: Vec<ValidationError>,
}

pub struct ValidationPipeline {
    runner: Arc<dyn CommandRunner>,
    config: ValidationConfig,
}

impl ValidationPipeline {
    pub fn new(runner: Arc<dyn CommandRunner>, config: ValidationConfig) -> Self {
        Self { runner, config }
    }

    pub fn default_working_dir(&self) -> &str {
        &self.config.working_dir
    }

    /// Run both stages in `working_dir` of the context's sandbox.
    ///
    /// Fails with `Cancelled` when the context's token fires and with
    /// `PipelineFailure` when a stage command cannot be run at all.
    pub async fn run(
        &self,
        ctx: &SandboxContext,
        sandbox_id: &str,
        working_dir: &str,
    ) -> Result<ValidationReport, ToolError> {
        let type_check = self.run_stage(Stage::TypeCheck, ctx, sandbox_id, working_dir).await?;
        let mut errors = type_check.errors;
        let mut warnings = type_check.warnings;
        let mut stages = vec![type_check.report];

        if errors.is_empty() {
            let build = self.run_stage(Stage::Build, ctx, sandbox_id, working_dir).await?;
            errors.extend(build.errors);
            warnings.extend(build.warnings);
            stages.push(build.report);
        } else {
            tracing::debug!(
                "Skipping build stage: type-check reported {} errors",
                errors.len()
            );
            stages.push(StageReport::skipped(Stage::Build));
        }

        Ok(ValidationReport {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            stages,
        })
    }

    fn request(
        &self,
        stage: Stage,
        ctx: &SandboxContext,
        sandbox_id: &str,
        working_dir: &str,
    ) -> CommandRequest {
        let (command, args) = match stage {
            Stage::TypeCheck => (&self.config.typecheck_command, &self.config.typecheck_args),
            Stage::Build => (&self.config.build_command, &self.config.build_args),
        };
        CommandRequest {
            sandbox_id: sandbox_id.to_string(),
            command: command.clone(),
            args: args.clone(),
            working_dir: working_dir.to_string(),
            timeout: self.stage_timeout(),
            user_id: ctx.user_id.clone(),
        }
    }

    fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.config.stage_timeout_secs)
    }

    async fn run_stage(
        &self,
        stage: Stage,
        ctx: &SandboxContext,
        sandbox_id: &str,
        working_dir: &str,
    ) -> Result<StageOutcome, ToolError> {
        let request = self.request(stage, ctx, sandbox_id, working_dir);
        let timeout = self.stage_timeout();
        let started = Instant::now();
        tracing::debug!(
            "Running {stage} stage: {} {}",
            request.command,
            request.args.join(" ")
        );

        let output = tokio::select! {
            () = ctx.cancel.cancelled() => {
                tracing::info!("Validation cancelled during {stage} stage");
                return Err(ToolError::Cancelled);
            }
            result = tokio::time::timeout(timeout, self.runner.run_command(&request)) => match result {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => {
                    tracing::warn!("{stage} stage could not run: {e:#}");
                    return Err(ToolError::Pipeline {
                        message: format!("{stage} stage could not run: {e}"),
                    });
                }
                Err(_) => {
                    tracing::warn!("{stage} stage timed out after {}s", timeout.as_secs());
                    return Err(ToolError::Pipeline {
                        message: format!("{stage} stage timed out after {}s", timeout.as_secs()),
                    });
                }
            },
        };

        Ok(self.evaluate(stage, &output, started.elapsed()))
    }

    fn evaluate(&self, stage: Stage, output: &CommandOutput, elapsed: Duration) -> StageOutcome {
        let combined = output.combined();
        let parsed = match stage {
            Stage::TypeCheck => parse::parse_typecheck(&combined),
            Stage::Build => parse::parse_build(&combined),
        };
        let (mut errors, warnings): (Vec<_>, Vec<_>) =
            parsed.into_iter().partition(|e| e.severity == Severity::Error);

        if !output.success() && errors.is_empty() {
            tracing::warn!(
                "{stage} stage failed with exit code {} but no diagnostics were recognized",
                output.exit_code
            );
            errors.push(generic_failure(stage, output.exit_code, &combined));
        }

        let report = StageReport {
            stage,
            passed: output.success() && errors.is_empty(),
            skipped: false,
            exit_code: Some(output.exit_code),
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            error_count: errors.len(),
            warning_count: warnings.len(),
            raw_output: truncate_output(&combined, self.config.max_output_chars),
        };
        StageOutcome {
            report,
            errors,
            warnings,
        }
    }
}

fn generic_failure(stage: Stage, exit_code: i64, output: &str) -> ValidationError {
    let first_line = parse::strip_ansi(output)
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(|l| truncate_output(l, 200));
    let message = match first_line {
        Some(line) => format!("{stage} failed with exit code {exit_code}: {line}"),
        None => format!("{stage} failed with exit code {exit_code} and no output"),
    };
    ValidationError {
        file: None,
        line: None,
        column: None,
        message,
        kind: DiagnosticKind::Syntax,
        severity: Severity::Error,
        code: None,
        stage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio_util::sync::CancellationToken;

    /// Scripted runner: one canned response per call, recording requests.
    struct ScriptedRunner {
        responses: Mutex<Vec<anyhow::Result<CommandOutput>>>,
        calls: Mutex<Vec<CommandRequest>>,
        delay: Duration,
    }

    impl ScriptedRunner {
        fn new(responses: Vec<anyhow::Result<CommandOutput>>) -> Arc<Self> {
            Self::with_delay(responses, Duration::ZERO)
        }

        fn with_delay(responses: Vec<anyhow::Result<CommandOutput>>, delay: Duration) -> Arc<Self> {
            let mut responses = responses;
            responses.reverse();
            Arc::new(Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(Vec::new()),
                delay,
            })
        }

        fn commands(&self) -> Vec<String> {
            self.calls.lock().iter().map(|c| c.command.clone()).collect()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run_command(&self, request: &CommandRequest) -> anyhow::Result<CommandOutput> {
            self.calls.lock().push(request.clone());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.responses
                .lock()
                .pop()
                .unwrap_or_else(|| Ok(output("", 0)))
        }
    }

    fn output(stdout: &str, exit_code: i64) -> CommandOutput {
        CommandOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code,
        }
    }

    fn pipeline(runner: Arc<ScriptedRunner>) -> ValidationPipeline {
        ValidationPipeline::new(runner, ValidationConfig::default())
    }

    fn ctx() -> SandboxContext {
        SandboxContext::new("sb", "call-1")
    }

    #[tokio::test]
    async fn clean_project_runs_both_stages() {
        let runner = ScriptedRunner::new(vec![Ok(output("", 0)), Ok(output("built in 1.2s", 0))]);
        let report = pipeline(runner.clone())
            .run(&ctx(), "sb", "/home/user/project")
            .await
            .unwrap();
        assert!(report.is_valid);
        assert_eq!(report.stages.len(), 2);
        assert!(report.stages.iter().all(|s| s.passed && !s.skipped));
        assert_eq!(runner.commands(), vec!["npx", "npm"]);
    }

    #[tokio::test]
    async fn type_errors_skip_the_build() {
        let runner = ScriptedRunner::new(vec![Ok(output(
            "src/App.tsx(3,1): error TS2304: Cannot find name 'x'.",
            2,
        ))]);
        let report = pipeline(runner.clone()).run(&ctx(), "sb", "/p").await.unwrap();
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 1);
        assert!(report.stages[1].skipped);
        assert_eq!(runner.commands(), vec!["npx"]);
    }

    #[tokio::test]
    async fn warnings_do_not_gate_the_build() {
        let runner = ScriptedRunner::new(vec![
            Ok(output("src/a.ts(1,1): warning TS6133: 'x' is declared but never used.", 0)),
            Ok(output("", 0)),
        ]);
        let report = pipeline(runner).run(&ctx(), "sb", "/p").await.unwrap();
        assert!(report.is_valid);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.errors.is_empty());
        assert!(!report.stages[1].skipped);
    }

    #[tokio::test]
    async fn unparsed_failure_is_never_silent() {
        let runner = ScriptedRunner::new(vec![Ok(output("Segmentation fault", 139))]);
        let report = pipeline(runner).run(&ctx(), "sb", "/p").await.unwrap();
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.contains("Segmentation fault"));
        assert!(report.errors[0].message.contains("139"));
    }

    #[tokio::test]
    async fn build_failure_is_reported() {
        let runner = ScriptedRunner::new(vec![
            Ok(output("", 0)),
            Ok(output("✘ [ERROR] Could not resolve \"react\"\n\n    src/main.tsx:1:18:\n", 1)),
        ]);
        let report = pipeline(runner).run(&ctx(), "sb", "/p").await.unwrap();
        assert!(!report.is_valid);
        assert!(report.stages[0].passed);
        assert!(!report.stages[1].passed);
        assert_eq!(report.errors[0].file.as_deref(), Some("src/main.tsx"));
        assert_eq!(report.errors[0].stage, Stage::Build);
    }

    #[tokio::test]
    async fn runner_error_is_a_pipeline_failure() {
        let runner = ScriptedRunner::new(vec![Err(anyhow::anyhow!("sandbox unreachable"))]);
        let err = pipeline(runner).run(&ctx(), "sb", "/p").await.unwrap_err();
        assert_eq!(err.kind(), crate::tools::error::ErrorKind::PipelineFailure);
    }

    #[tokio::test]
    async fn stage_timeout_is_a_pipeline_failure() {
        let runner = ScriptedRunner::with_delay(vec![Ok(output("", 0))], Duration::from_secs(5));
        let config = ValidationConfig {
            stage_timeout_secs: 0,
            ..ValidationConfig::default()
        };
        let err = ValidationPipeline::new(runner, config)
            .run(&ctx(), "sb", "/p")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::tools::error::ErrorKind::PipelineFailure);
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn cancellation_aborts_the_stage() {
        let runner = ScriptedRunner::with_delay(vec![Ok(output("", 0))], Duration::from_secs(30));
        let token = CancellationToken::new();
        let ctx = ctx().with_cancellation(token.clone());
        let pipeline = pipeline(runner);

        let cancel = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        };
        let (result, ()) = tokio::join!(pipeline.run(&ctx, "sb", "/p"), cancel);
        assert_eq!(
            result.unwrap_err().kind(),
            crate::tools::error::ErrorKind::Cancelled
        );
    }

    #[test]
    fn output_truncation_respects_char_boundaries() {
        assert_eq!(truncate_output("short", 10), "short");
        let cut = truncate_output("ééééé", 2);
        assert!(cut.starts_with("éé\n"));
        assert!(cut.ends_with("[truncated 3 chars]"));
    }

    #[tokio::test]
    async fn raw_output_goes_to_technical_details() {
        let long = "x".repeat(6000);
        let runner = ScriptedRunner::new(vec![Ok(output(&long, 0)), Ok(output("", 0))]);
        let report = pipeline(runner).run(&ctx(), "sb", "/p").await.unwrap();
        let details = report.technical_details();
        let raw = details["stages"][0]["rawOutput"].as_str().unwrap();
        assert!(raw.len() < 5100);
        assert!(raw.contains("truncated"));
        let serialized = serde_json::to_value(&report).unwrap();
        assert!(serialized["stages"][0].get("rawOutput").is_none());
    }
}
