use std::sync::Arc;

use secrecy::SecretString;
use tracing::{debug, info, warn};

use crate::diagnosis::parse::parse_diagnosis;
use crate::diagnosis::prompt::{DiagnosisInput, build_prompt};
use crate::error::DiagnosisError;
use crate::model::DiagnosisResult;
use crate::ports::CompletionService;

/// Prompt → completion → validated report.
#[derive(Clone)]
pub struct DiagnosisEngine {
    completion: Arc<dyn CompletionService>,
    model: String,
    samples: usize,
}

impl DiagnosisEngine {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        model: impl Into<String>,
        samples: usize,
    ) -> Self {
        Self {
            completion,
            model: model.into(),
            samples,
        }
    }

    /// Run one diagnosis. No retries.
    pub async fn diagnose(
        &self,
        api_key: &SecretString,
        input: &DiagnosisInput,
    ) -> Result<DiagnosisResult, DiagnosisError> {
        let prompt = build_prompt(input, self.samples);
        info!(model = %self.model, prompt_len = prompt.len(), "starting AI diagnosis");
        debug!(%prompt, "diagnosis prompt");

        let text = self
            .completion
            .complete(api_key, &self.model, &prompt)
            .await
            .map_err(|e| {
                warn!(error = %e, transient = e.is_transient(), "completion request failed");
                DiagnosisError::from(e)
            })?;
        debug!(response_len = text.len(), "completion received");

        let result = parse_diagnosis(&text).inspect_err(|e| {
            if let DiagnosisError::Validation { reason } = e {
                warn!(%reason, "diagnosis reply failed validation");
            } else {
                warn!(error = %e, "diagnosis reply could not be parsed");
            }
        })?;

        info!(
            health = %result.overall_health,
            issues = result.issues.len(),
            "diagnosis complete"
        );
        Ok(result)
    }
}

impl std::fmt::Debug for DiagnosisEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosisEngine")
            .field("model", &self.model)
            .field("samples", &self.samples)
            .finish_non_exhaustive()
    }
}
