// ── Completion reply parsing ──
//
// The model is asked for bare JSON but may wrap it in prose or code
// fences. Extraction is tolerant; validation is strict.

use crate::error::DiagnosisError;
use crate::model::DiagnosisResult;

const NO_JSON: &str = "Failed to parse AI response - no JSON found";

/// The first balanced `{ ... }` span in `text`.
///
/// Braces inside JSON string literals (including escaped quotes) do not
/// count toward nesting.
pub fn extract_json_object(text: &str) -> Result<&str, DiagnosisError> {
    let no_json = || DiagnosisError::Parse {
        message: NO_JSON.to_owned(),
    };
    let start = text.find('{').ok_or_else(no_json)?;

    let mut depth = 0_usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text.get(start..).ok_or_else(no_json)?.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return text.get(start..end).ok_or_else(no_json);
                }
            }
            _ => {}
        }
    }

    Err(no_json())
}

/// Extract, decode and validate a diagnosis report from a raw reply.
pub fn parse_diagnosis(text: &str) -> Result<DiagnosisResult, DiagnosisError> {
    let raw = extract_json_object(text)?;

    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| DiagnosisError::Parse {
            message: format!("Failed to parse AI response: {e}"),
        })?;

    let result: DiagnosisResult =
        serde_json::from_value(value).map_err(|e| DiagnosisError::validation(e.to_string()))?;

    if result.summary.trim().is_empty() {
        return Err(DiagnosisError::validation("summary is empty"));
    }

    Ok(result)
}
