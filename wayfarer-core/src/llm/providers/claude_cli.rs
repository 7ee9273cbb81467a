//! Provider backed by the `claude` command-line tool in print mode

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::error::{Result, WayfarerError};
use crate::llm::{LLMConfig, LLMProvider, ModelInfo};

/// Runs `claude --dangerously-skip-permissions -p <prompt>` once per call.
pub struct ClaudeCliProvider {
    program: String,
    api_key: Option<String>,
    model: Option<String>,
    timeout: Duration,
}

impl ClaudeCliProvider {
    pub fn new(api_key: Option<String>, model: Option<String>, timeout: Duration) -> Self {
        Self {
            program: "claude".to_string(),
            api_key,
            model: model.filter(|m| !m.is_empty()),
            timeout,
        }
    }

    /// Use a different executable name or path.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, prompt: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--dangerously-skip-permissions");
        if let Some(model) = &self.model {
            cmd.arg("--model").arg(model);
        }
        cmd.arg("-p")
            .arg(prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(key) = &self.api_key {
            cmd.env("ANTHROPIC_API_KEY", key);
        }
        cmd
    }
}

#[async_trait]
impl LLMProvider for ClaudeCliProvider {
    async fn generate(&self, prompt: &str, _config: &LLMConfig) -> Result<String> {
        tracing::info!(prompt_len = prompt.len(), "Claude CLI received prompt");

        let output = match tokio::time::timeout(self.timeout, self.command(prompt).output()).await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WayfarerError::Llm(format!(
                    "'{}' executable not found. Please ensure it is installed and in PATH.",
                    self.program
                )));
            }
            Ok(Err(e)) => {
                return Err(WayfarerError::Llm(format!(
                    "Error executing Claude CLI: {}",
                    e
                )));
            }
            Err(_) => {
                return Err(WayfarerError::Llm(format!(
                    "Claude CLI timed out after {:?}",
                    self.timeout
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WayfarerError::Llm(format!(
                "Error calling Claude CLI: {}",
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "claude_cli".to_string(),
            model_name: self.model.clone().unwrap_or_else(|| "default".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_executable_is_an_error() {
        let provider = ClaudeCliProvider::new(None, None, Duration::from_secs(5))
            .with_program("wayfarer-test-no-such-binary");
        let err = provider
            .generate("hello", &LLMConfig::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_empty_model_is_ignored() {
        let provider = ClaudeCliProvider::new(None, Some(String::new()), Duration::from_secs(5));
        assert_eq!(provider.model_info().model_name, "default");
    }
}
