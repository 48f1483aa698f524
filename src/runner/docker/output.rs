//! Output resolution: output file, then stdout JSON, then stdout text, then `{}`

use std::fs;
use std::path::Path;

use serde_json::{json, Value};

use crate::constants::OUTPUT_PREVIEW_BYTES;
use crate::error::ComponentError;

pub(crate) fn resolve_output(output_file: &Path, stdout: &str) -> Result<Value, ComponentError> {
    if let Some(value) = read_output_file(output_file)? {
        tracing::debug!(path = %output_file.display(), "Using container output file");
        return Ok(value);
    }

    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(json!({}));
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => Ok(value),
        Err(_) => Ok(Value::String(trimmed.to_string())),
    }
}

/// `None` when the file is missing or blank
fn read_output_file(path: &Path) -> Result<Option<Value>, ComponentError> {
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ComponentError::container(
                format!("Failed to read container output file: {}", e),
                Some(0),
            )
            .with_cause(e))
        }
    };

    let text = String::from_utf8_lossy(&content);
    if text.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str(&text).map(Some).map_err(|e| {
        ComponentError::container(
            format!(
                "Container wrote an invalid output file ({} at line {}, column {})",
                describe(&e),
                e.line(),
                e.column()
            ),
            Some(0),
        )
        .with_detail("line", e.line())
        .with_detail("column", e.column())
        .with_detail("outputBytes", content.len())
        .with_detail("preview", preview(&text))
        .with_cause(e)
    })
}

fn describe(err: &serde_json::Error) -> &'static str {
    match err.classify() {
        serde_json::error::Category::Eof => "truncated JSON",
        serde_json::error::Category::Syntax => "syntax error",
        serde_json::error::Category::Data => "unexpected data",
        serde_json::error::Category::Io => "read error",
    }
}

fn preview(text: &str) -> String {
    if text.len() <= OUTPUT_PREVIEW_BYTES {
        return text.to_string();
    }
    let mut end = OUTPUT_PREVIEW_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}
