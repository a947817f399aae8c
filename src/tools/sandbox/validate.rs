//! `validate_project`: type-check then build, as one structured report.

use super::TOOL_VALIDATE_PROJECT;
use crate::sandbox::SandboxContext;
use crate::tools::error::ToolError;
use crate::tools::guard::{optional_str, require_absolute, require_sandbox};
use crate::tools::traits::{Tool, ToolData, ToolResult};
use crate::validation::ValidationPipeline;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub struct ValidateProjectTool {
    pipeline: Arc<ValidationPipeline>,
}

impl ValidateProjectTool {
    pub fn new(pipeline: Arc<ValidationPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl Tool for ValidateProjectTool {
    fn name(&self) -> &str {
        TOOL_VALIDATE_PROJECT
    }

    fn description(&self) -> &str {
        "Validate the project in the sandbox: run the TypeScript type-check, then (only if it \
         reports no errors) the production build. Returns normalized errors with file, line \
         and column. Run this after a batch of edits and fix every reported error."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "working_dir": {
                    "type": "string",
                    "description": "Absolute project directory (defaults to /home/user/project)"
                }
            }
        })
    }

    fn has_own_deadline(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &SandboxContext,
    ) -> Result<ToolResult, ToolError> {
        let sandbox_id = require_sandbox(ctx)?;
        let working_dir = match optional_str(&args, "working_dir")? {
            Some(dir) => require_absolute(dir)?,
            None => self.pipeline.default_working_dir().to_string(),
        };

        let report = self.pipeline.run(ctx, sandbox_id, &working_dir).await?;

        let feedback = if report.is_valid {
            match report.warnings.len() {
                0 => "Validation passed: no type or build errors".to_string(),
                n => format!("Validation passed with {n} warning(s)"),
            }
        } else {
            let failed = report
                .stages
                .iter()
                .find(|s| !s.passed && !s.skipped)
                .map_or_else(|| "validation".to_string(), |s| s.stage.to_string());
            format!(
                "Validation failed: {} error(s) in {failed} stage",
                report.errors.len()
            )
        };
        tracing::info!(
            "validate_project in {working_dir}: valid={} errors={} warnings={}",
            report.is_valid,
            report.errors.len(),
            report.warnings.len()
        );

        let details = report.technical_details();
        Ok(ToolResult::ok(ToolData::Validation(report), feedback).with_details(details))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationConfig;
    use crate::sandbox::{CommandOutput, CommandRequest, CommandRunner};
    use crate::tools::error::ErrorKind;
    use parking_lot::Mutex;

    struct FixedRunner {
        exit_code: i64,
        stdout: &'static str,
        dirs: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CommandRunner for FixedRunner {
        async fn run_command(&self, request: &CommandRequest) -> anyhow::Result<CommandOutput> {
            self.dirs.lock().push(request.working_dir.clone());
            Ok(CommandOutput {
                stdout: self.stdout.to_string(),
                stderr: String::new(),
                exit_code: self.exit_code,
            })
        }
    }

    fn tool(exit_code: i64, stdout: &'static str) -> (Arc<FixedRunner>, ValidateProjectTool) {
        let runner = Arc::new(FixedRunner {
            exit_code,
            stdout,
            dirs: Mutex::new(Vec::new()),
        });
        let pipeline = ValidationPipeline::new(runner.clone(), ValidationConfig::default());
        (runner, ValidateProjectTool::new(Arc::new(pipeline)))
    }

    #[tokio::test]
    async fn passing_project() {
        let (runner, tool) = tool(0, "");
        let result = tool
            .execute(json!({}), &SandboxContext::new("sb", "c"))
            .await
            .unwrap();
        assert!(result.success);
        assert!(!result.preview_refresh_needed);
        assert_eq!(
            result.user_feedback,
            "Validation passed: no type or build errors"
        );
        assert_eq!(
            *runner.dirs.lock(),
            vec!["/home/user/project".to_string(), "/home/user/project".to_string()]
        );
        assert!(result.technical_details.unwrap()["stages"].is_array());
    }

    #[tokio::test]
    async fn failing_project_is_still_a_successful_call() {
        let (_runner, tool) = tool(2, "src/a.ts(1,2): error TS1005: ';' expected.");
        let result = tool
            .execute(json!({"working_dir": "/ws/app"}), &SandboxContext::new("sb", "c"))
            .await
            .unwrap();
        assert!(result.success);
        match result.data {
            Some(ToolData::Validation(report)) => {
                assert!(!report.is_valid);
                assert_eq!(report.errors.len(), 1);
            }
            other => panic!("unexpected data: {other:?}"),
        }
        assert_eq!(result.user_feedback, "Validation failed: 1 error(s) in type-check stage");
    }

    #[tokio::test]
    async fn guard_and_path_checks() {
        let (runner, tool) = tool(0, "");
        let err = tool
            .execute(json!({}), &SandboxContext::detached("c"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingSandbox);

        let err = tool
            .execute(json!({"working_dir": "project"}), &SandboxContext::new("sb", "c"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPath);
        assert!(runner.dirs.lock().is_empty());
    }
}
