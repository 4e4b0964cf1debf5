//! Message content and file encoding

use crate::domain::types::PendingFile;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};

pub fn data_uri(file: &PendingFile) -> String {
    format!("data:{};base64,{}", file.mime, STANDARD.encode(&file.bytes))
}

/// Queued files as the `files` request parameter.
pub fn files_param(files: &[PendingFile]) -> Value {
    Value::Array(
        files
            .iter()
            .map(|file| {
                json!({
                    "name": file.name,
                    "mime": file.mime,
                    "data": STANDARD.encode(&file.bytes),
                })
            })
            .collect(),
    )
}

/// Renders the prompt followed by one data URI line per queued file.
pub fn inline_files(input: &str, files: &[PendingFile]) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(files.len() + 1);
    if !input.trim().is_empty() {
        lines.push(input.trim().to_string());
    }
    lines.extend(files.iter().map(data_uri));
    lines.join("\n")
}
