// ── AI-assisted diagnosis ──
//
// Renders telemetry into a prompt, sends it to the completion service and
// turns the reply into a validated `DiagnosisResult`.

pub mod engine;
pub mod parse;
pub mod prompt;

pub use engine::DiagnosisEngine;
pub use parse::{extract_json_object, parse_diagnosis};
pub use prompt::{DiagnosisInput, build_prompt};
