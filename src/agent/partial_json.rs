//! Best-effort string field extraction from JSON that may still be arriving.

/// Extract the string value of `field` from a possibly truncated JSON buffer.
///
/// Returns an empty string when the key, the colon or the opening quote has
/// not arrived yet. Decoding stops at the closing quote or at the end of the
/// buffer, so every prefix of a document yields a prefix of the value
/// extracted from the whole document.
pub fn extract_json_string_field(buffer: &str, field: &str) -> String {
    let key = format!("\"{field}\"");
    let Some(key_at) = buffer.find(&key) else {
        return String::new();
    };
    let after_key = &buffer[key_at + key.len()..];
    let Some(colon_at) = after_key.find(':') else {
        return String::new();
    };
    let value = after_key[colon_at + 1..].trim_start_matches([' ', '\n', '\r']);
    let Some(body) = value.strip_prefix('"') else {
        return String::new();
    };

    let mut out = String::new();
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => break,
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => {}
                Some(other) => out.push(other),
                // escape cut off mid-stream
                None => break,
            },
            c => out.push(c),
        }
    }
    out
}

/// Preview of an in-flight tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub content: String,
    pub file_path: Option<String>,
}

/// Pick the preview field for a tool and extract it from partial arguments.
///
/// Returns `None` for tools without a preview or while the field is still empty.
pub fn streaming_preview(tool_name: &str, partial_arguments: &str) -> Option<Preview> {
    let field = match tool_name {
        "set_analysis" => "text",
        "plan_files" | "apply_fix" | "run_check" => "summary",
        "write_file" => "content",
        _ => return None,
    };
    let content = extract_json_string_field(partial_arguments, field);
    if content.is_empty() {
        return None;
    }
    let file_path = (tool_name == "write_file")
        .then(|| extract_json_string_field(partial_arguments, "path"))
        .filter(|p| !p.is_empty());
    Some(Preview { content, file_path })
}
