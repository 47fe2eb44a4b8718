//! Interpretation of completed tool calls.
//!
//! Arguments come from a remote model and are not trusted: malformed JSON is
//! treated as an empty object, missing or mistyped fields take defaults, and
//! unknown tool names are acknowledged without any effect.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::types::{
    AgentStep, ChatMessage, CheckIssue, CheckReport, FileKind, GeneratedFile, ProgressEvent, ProgressSink,
    Severity, ToolInvocation, MANIFEST_PATH,
};

use super::prompt::TOOL_ACK;
use super::state::ConversionState;

const LEGACY_REASON: &str = "Legacy tool fallback";
const LEGACY_CONTENT_PATH: &str = "content.js";
const LEGACY_BACKGROUND_PATH: &str = "background.js";

/// A decoded tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCommand {
    SetAnalysis { text: String },
    PlanFiles { summary: String },
    WriteFile(GeneratedFile),
    DeleteFile { path: String, reason: Option<String> },
    RunCheck(CheckReport),
    ApplyFix { summary: Option<String> },
    AddNote { message: String },
    WriteManifest { manifest: Value },
    WriteContentJs { code: String },
    WriteBackgroundJs { code: Option<String> },
}

impl ToolCommand {
    /// Decode a call. Returns `None` for tools this protocol does not know.
    pub fn decode(name: &str, raw_arguments: &str) -> Option<Self> {
        let args = parse_arguments(raw_arguments);
        let command = match name {
            "set_analysis" => Self::SetAnalysis {
                text: string_field(&args, "text"),
            },
            "plan_files" => Self::PlanFiles {
                summary: string_field(&args, "summary"),
            },
            "write_file" => Self::WriteFile(GeneratedFile {
                path: string_field(&args, "path").trim().to_string(),
                content: string_field(&args, "content"),
                kind: optional_string(&args, "kind")
                    .map(|k| FileKind::parse_lenient(&k))
                    .unwrap_or_default(),
                required: bool_field(&args, "required"),
                reason: optional_string(&args, "reason"),
            }),
            "delete_file" => Self::DeleteFile {
                path: string_field(&args, "path").trim().to_string(),
                reason: optional_string(&args, "reason"),
            },
            "run_check" => Self::RunCheck(CheckReport {
                pass: bool_field(&args, "pass"),
                summary: string_field(&args, "summary"),
                issues: parse_issues(args.get("issues")),
            }),
            "apply_fix" => Self::ApplyFix {
                summary: match args.get("summary") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(other) => Some(other.to_string()),
                },
            },
            "add_note" => Self::AddNote {
                message: string_field(&args, "message").trim().to_string(),
            },
            "write_manifest" => Self::WriteManifest {
                manifest: args
                    .get("manifest")
                    .filter(|v| !v.is_null())
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Map::new())),
            },
            "write_content_js" => Self::WriteContentJs {
                code: string_field(&args, "code"),
            },
            "write_background_js" => Self::WriteBackgroundJs {
                code: args.get("code").and_then(coerce_string),
            },
            _ => return None,
        };
        Some(command)
    }

    /// Apply the command to the state. Returns the progress event to report,
    /// or `None` when the call was a no-op.
    pub fn apply(self, state: &mut ConversionState) -> Option<ProgressEvent> {
        match self {
            Self::SetAnalysis { text } => {
                state.set_analysis(text.clone());
                Some(ProgressEvent::new(AgentStep::Analysis, text))
            }
            Self::PlanFiles { summary } => Some(ProgressEvent::new(AgentStep::PlanFiles, summary)),
            Self::WriteFile(file) => {
                if file.path.is_empty() {
                    return None;
                }
                Some(write(state, file))
            }
            Self::DeleteFile { path, reason } => {
                if path.is_empty() {
                    return None;
                }
                state.remove_file(&path);
                let content = match reason {
                    Some(reason) => format!("Deleted {path}: {reason}"),
                    None => format!("Deleted {path}"),
                };
                Some(ProgressEvent::new(AgentStep::DeleteFile, content).with_file(path))
            }
            Self::RunCheck(report) => {
                let passed = report.pass;
                let content = if report.summary.is_empty() {
                    let verdict = if passed { "Check passed" } else { "Check failed" };
                    verdict.to_string()
                } else {
                    report.summary.clone()
                };
                let round = state.push_check(report);
                Some(
                    ProgressEvent::new(AgentStep::Check, content)
                        .with_round(round)
                        .with_passed(passed),
                )
            }
            Self::ApplyFix { summary } => {
                let round = state.begin_fix_round();
                let content = summary.unwrap_or_else(|| format!("Applying fix round #{round}"));
                Some(ProgressEvent::new(AgentStep::Fix, content).with_round(round))
            }
            Self::AddNote { message } => {
                if message.is_empty() {
                    return None;
                }
                state.push_note(message.clone());
                Some(ProgressEvent::new(AgentStep::Note, message))
            }
            Self::WriteManifest { manifest } => {
                let content = serde_json::to_string_pretty(&manifest).unwrap_or_else(|_| "{}".to_string());
                let file = GeneratedFile::new(MANIFEST_PATH, content, FileKind::Manifest)
                    .required(true)
                    .with_reason(LEGACY_REASON);
                Some(write(state, file))
            }
            Self::WriteContentJs { code } => {
                let file = GeneratedFile::new(LEGACY_CONTENT_PATH, code, FileKind::Content)
                    .required(true)
                    .with_reason(LEGACY_REASON);
                Some(write(state, file))
            }
            Self::WriteBackgroundJs { code: None } => {
                state.remove_file(LEGACY_BACKGROUND_PATH);
                Some(
                    ProgressEvent::new(AgentStep::DeleteFile, format!("Deleted {LEGACY_BACKGROUND_PATH}"))
                        .with_file(LEGACY_BACKGROUND_PATH),
                )
            }
            Self::WriteBackgroundJs { code: Some(code) } => {
                let file = GeneratedFile::new(LEGACY_BACKGROUND_PATH, code, FileKind::Background)
                    .with_reason(LEGACY_REASON);
                Some(write(state, file))
            }
        }
    }
}

fn write(state: &mut ConversionState, file: GeneratedFile) -> ProgressEvent {
    let path = file.path.clone();
    state.upsert_file(file);
    ProgressEvent::new(AgentStep::WriteFile, format!("Wrote {path}")).with_file(path)
}

/// Interpret one call: decode, apply, report progress, and build the tool
/// result message that answers it. Every call is answered, known or not.
pub fn dispatch_call(
    state: &mut ConversionState,
    call: &ToolInvocation,
    progress: Option<&ProgressSink>,
) -> ChatMessage {
    match ToolCommand::decode(&call.name, &call.raw_arguments) {
        Some(command) => {
            debug!(tool = %call.name, id = %call.id, "dispatching tool call");
            if let Some(event) = command.apply(state) {
                if let Some(sink) = progress {
                    sink(event);
                }
            }
        }
        None => warn!(tool = %call.name, id = %call.id, "ignoring unknown tool"),
    }
    ChatMessage::tool_result(call.id.clone(), TOOL_ACK)
}

fn parse_arguments(raw: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Strings as-is; numbers and booleans in their JSON spelling; anything else absent.
fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn string_field(args: &Map<String, Value>, key: &str) -> String {
    args.get(key).and_then(coerce_string).unwrap_or_default()
}

fn optional_string(args: &Map<String, Value>, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_str).map(String::from)
}

/// Truthiness in the loose sense the model tends to rely on.
fn bool_field(args: &Map<String, Value>, key: &str) -> bool {
    match args.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
        Some(Value::Null) | None => false,
    }
}

fn parse_issues(raw: Option<&Value>) -> Vec<CheckIssue> {
    let Some(Value::Array(items)) = raw else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let obj = item.as_object()?;
            let message = optional_string(obj, "message").filter(|m| !m.is_empty())?;
            Some(CheckIssue {
                id: optional_string(obj, "id").unwrap_or_else(|| format!("issue_{}", index + 1)),
                severity: match obj.get("severity").and_then(Value::as_str) {
                    Some("warning") => Severity::Warning,
                    _ => Severity::Error,
                },
                file: optional_string(obj, "file"),
                message,
                fix_hint: optional_string(obj, "fixHint"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    fn run(state: &mut ConversionState, name: &str, args: &str) -> Option<ProgressEvent> {
        ToolCommand::decode(name, args).and_then(|c| c.apply(state))
    }

    #[test]
    fn write_file_trims_path_and_defaults_fields() {
        let mut state = ConversionState::new();
        let event = run(&mut state, "write_file", r#"{"path":"  content.js ","content":"x","kind":"css"}"#).unwrap();
        assert_eq!(event.content, "Wrote content.js");
        assert_eq!(event.file_path.as_deref(), Some("content.js"));
        let file = state.file("content.js").unwrap();
        assert_eq!(file.kind, FileKind::Other);
        assert!(!file.required);
        assert_eq!(file.reason, None);
    }

    #[test]
    fn write_with_empty_path_is_a_no_op() {
        let mut state = ConversionState::new();
        assert_eq!(run(&mut state, "write_file", r#"{"path":"   ","content":"x"}"#), None);
        assert_eq!(state.files().count(), 0);
    }

    #[test]
    fn delete_removes_the_current_entry() {
        let mut state = ConversionState::new();
        run(&mut state, "write_file", r#"{"path":"a.js","content":"1"}"#);
        run(&mut state, "write_file", r#"{"path":"a.js","content":"2"}"#);
        let event = run(&mut state, "delete_file", r#"{"path":"a.js","reason":"unused"}"#).unwrap();
        assert_eq!(event.content, "Deleted a.js: unused");
        assert!(state.file("a.js").is_none());

        let event = run(&mut state, "delete_file", r#"{"path":"b.js"}"#).unwrap();
        assert_eq!(event.content, "Deleted b.js");
        assert_eq!(run(&mut state, "delete_file", "{}"), None);
    }

    #[test]
    fn run_check_parses_issues_leniently() {
        let mut state = ConversionState::new();
        let event = run(
            &mut state,
            "run_check",
            r#"{"pass":false,"summary":"","issues":[
                {"message":"no id","severity":"fatal"},
                {"id":"x","message":""},
                "junk",
                {"id":"w","severity":"warning","file":"m.json","message":"m","fixHint":"h"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(event.content, "Check failed");
        assert_eq!(event.round, Some(1));
        assert_eq!(event.passed, Some(false));

        let issues = &state.checks()[0].issues;
        assert_eq!(
            issues,
            &vec![
                CheckIssue {
                    id: "issue_1".into(),
                    severity: Severity::Error,
                    file: None,
                    message: "no id".into(),
                    fix_hint: None,
                },
                CheckIssue {
                    id: "w".into(),
                    severity: Severity::Warning,
                    file: Some("m.json".into()),
                    message: "m".into(),
                    fix_hint: Some("h".into()),
                },
            ]
        );
    }

    #[test]
    fn apply_fix_counts_rounds() {
        let mut state = ConversionState::new();
        let first = run(&mut state, "apply_fix", "{}").unwrap();
        assert_eq!(first.content, "Applying fix round #1");
        let second = run(&mut state, "apply_fix", r#"{"summary":"fix csp"}"#).unwrap();
        assert_eq!(second.content, "fix csp");
        assert_eq!(second.round, Some(2));
        assert_eq!(state.fix_rounds(), 2);
    }

    #[test]
    fn apply_fix_falls_back_only_when_summary_is_missing() {
        let mut state = ConversionState::new();
        let null = run(&mut state, "apply_fix", r#"{"summary":null}"#).unwrap();
        assert_eq!(null.content, "Applying fix round #1");
        let empty = run(&mut state, "apply_fix", r#"{"summary":""}"#).unwrap();
        assert_eq!(empty.content, "");
        assert_eq!(empty.round, Some(2));
        let number = run(&mut state, "apply_fix", r#"{"summary":3}"#).unwrap();
        assert_eq!(number.content, "3");
    }

    #[test]
    fn blank_notes_are_dropped() {
        let mut state = ConversionState::new();
        assert_eq!(run(&mut state, "add_note", r#"{"message":"  "}"#), None);
        run(&mut state, "add_note", r#"{"message":" icons missing "}"#);
        assert_eq!(state.notes(), ["icons missing"]);
    }

    #[test]
    fn malformed_arguments_become_defaults() {
        let mut state = ConversionState::new();
        let event = run(&mut state, "set_analysis", "{not json").unwrap();
        assert_eq!(event.step, AgentStep::Analysis);
        assert_eq!(state.analysis(), "");
        assert!(ToolCommand::decode("run_check", "[1,2]").is_some());
    }

    #[test]
    fn legacy_tools_write_fixed_paths() {
        let mut state = ConversionState::new();
        run(&mut state, "write_manifest", r#"{"manifest":{"manifest_version":3}}"#);
        run(&mut state, "write_content_js", r#"{"code":"main()"}"#);
        run(&mut state, "write_background_js", r#"{"code":"bg()"}"#);

        let manifest = state.file(MANIFEST_PATH).unwrap();
        assert_eq!(manifest.content, "{\n  \"manifest_version\": 3\n}");
        assert!(manifest.required);
        assert_eq!(manifest.reason.as_deref(), Some(LEGACY_REASON));
        assert_eq!(state.file("content.js").unwrap().kind, FileKind::Content);
        assert!(!state.file("background.js").unwrap().required);
        assert!(state.has_core_files());

        let event = run(&mut state, "write_background_js", r#"{"code":null}"#).unwrap();
        assert_eq!(event.step, AgentStep::DeleteFile);
        assert!(state.file("background.js").is_none());
    }

    #[test]
    fn write_manifest_without_object_writes_empty_object() {
        let mut state = ConversionState::new();
        run(&mut state, "write_manifest", "{}");
        assert_eq!(state.file(MANIFEST_PATH).unwrap().content, "{}");
    }

    #[test]
    fn every_call_is_acknowledged_and_unknown_tools_are_silent() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink: ProgressSink = {
            let events = events.clone();
            Arc::new(move |e: ProgressEvent| events.lock().unwrap().push(e))
        };
        let mut state = ConversionState::new();

        let ack = dispatch_call(&mut state, &ToolInvocation::new("c1", "launch_rocket", "{}"), Some(&sink));
        assert_eq!(ack.tool_call_id.as_deref(), Some("c1"));
        assert_eq!(ack.text(), "OK");
        assert!(events.lock().unwrap().is_empty());

        dispatch_call(
            &mut state,
            &ToolInvocation::new("c2", "plan_files", r#"{"summary":"two files"}"#),
            Some(&sink),
        );
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].step, AgentStep::PlanFiles);
        assert_eq!(events[0].content, "two files");
    }
}
