//! Integration tests for the conversion turn loop.

mod common;

use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use common::*;
use script2ext::agent::{AgentConverter, ConvertRequest, LoopExit};
use script2ext::config::AgentSettings;
use script2ext::error::ConvertError;
use script2ext::types::*;

fn converter(transport: &ScriptedTransport, max_turns: usize, max_fix_rounds: usize) -> AgentConverter {
    let settings = AgentSettings::builder()
        .max_turns(max_turns)
        .max_fix_rounds(max_fix_rounds)
        .build();
    AgentConverter::new(transport.as_transport(), settings)
}

fn recording_progress() -> (ProgressSink, Arc<Mutex<Vec<ProgressEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink_events = events.clone();
    let sink: ProgressSink = Arc::new(move |event: ProgressEvent| sink_events.lock().unwrap().push(event));
    (sink, events)
}

#[tokio::test]
async fn successful_conversion_returns_sorted_files_and_checks() {
    let transport = ScriptedTransport::new();
    transport.push_calls(vec![call("a", "set_analysis", json!({ "text": "Adds a style." }))]);
    transport.push_calls(core_files("w"));
    transport.push_calls(vec![run_check("c", true, "All good")]);

    let (progress, events) = recording_progress();
    let result = converter(&transport, 12, 2)
        .convert(ConvertRequest::new(SAMPLE_SCRIPT).with_progress(progress))
        .await
        .unwrap();

    assert_eq!(result.exit, LoopExit::CheckPassed);
    assert_eq!(result.turns, 3);
    assert_eq!(result.analysis, "Adds a style.");
    let paths: Vec<&str> = result.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["content.js", "manifest.json"]);
    assert_eq!(result.checks.len(), 1);
    assert!(result.checks[0].pass);

    let steps: Vec<AgentStep> = events.lock().unwrap().iter().map(|e| e.step).collect();
    assert_eq!(
        steps,
        vec![
            AgentStep::Analysis,
            AgentStep::WriteFile,
            AgentStep::WriteFile,
            AgentStep::Check,
            AgentStep::Done
        ]
    );
}

#[tokio::test]
async fn every_tool_call_is_answered_in_the_next_request() {
    let transport = ScriptedTransport::new();
    let mut calls = core_files("w");
    calls.push(call("x", "launch_rockets", json!({})));
    transport.push_calls(calls);
    transport.push_calls(vec![run_check("c", true, "ok")]);

    converter(&transport, 12, 2)
        .convert(ConvertRequest::new(SAMPLE_SCRIPT))
        .await
        .unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    let answered: Vec<(Option<String>, &str)> = requests[1]
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| (m.tool_call_id.clone(), m.text()))
        .collect();
    assert_eq!(
        answered,
        vec![
            (Some("w-m".to_string()), "OK"),
            (Some("w-c".to_string()), "OK"),
            (Some("x".to_string()), "OK"),
        ]
    );
    assert_eq!(requests[0].messages[0].role, Role::System);
    assert!(requests[0].messages[1].text().contains("GM_addStyle"));
    assert_eq!(requests[0].tools.len(), 7);
}

#[tokio::test]
async fn rewriting_a_file_keeps_one_entry_with_last_content() {
    let transport = ScriptedTransport::new();
    transport.push_calls(core_files("a"));
    transport.push_calls(vec![write_file("b", "content.js", "v2", "content")]);
    transport.push_calls(vec![run_check("c", true, "ok")]);

    let result = converter(&transport, 12, 2)
        .convert(ConvertRequest::new(SAMPLE_SCRIPT))
        .await
        .unwrap();

    let content: Vec<&GeneratedFile> = result.files.iter().filter(|f| f.path == "content.js").collect();
    assert_eq!(content.len(), 1);
    assert_eq!(content[0].content, "v2");
}

#[tokio::test]
async fn deleted_file_is_absent_from_the_result() {
    let transport = ScriptedTransport::new();
    let mut calls = core_files("a");
    calls.push(write_file("bg", "background.js", "chrome.runtime;", "background"));
    transport.push_calls(calls);
    transport.push_calls(vec![
        call("d", "delete_file", json!({ "path": "background.js", "reason": "unused" })),
        run_check("c", true, "ok"),
    ]);

    let result = converter(&transport, 12, 2)
        .convert(ConvertRequest::new(SAMPLE_SCRIPT))
        .await
        .unwrap();

    assert!(result.files.iter().all(|f| f.path != "background.js"));
}

#[tokio::test]
async fn a_later_failing_check_overrides_an_earlier_pass() {
    let transport = ScriptedTransport::new();
    let mut calls = core_files("a");
    calls.push(run_check("c1", true, "looked fine"));
    calls.push(run_check("c2", false, "content.js uses GM_setValue"));
    transport.push_calls(calls);

    let err = converter(&transport, 2, 2)
        .convert(ConvertRequest::new(SAMPLE_SCRIPT))
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Agent check did not pass: content.js uses GM_setValue"
    );
}

#[tokio::test]
async fn fix_ceiling_stops_the_loop_with_a_failing_check() {
    let transport = ScriptedTransport::new();
    let mut first = core_files("a");
    first.push(run_check("c0", false, "broken"));
    transport.push_calls(first);
    transport.push_calls(vec![apply_fix("f1", "first fix"), run_check("c1", false, "still broken")]);
    transport.push_calls(vec![apply_fix("f2", "second fix"), run_check("c2", false, "still broken")]);
    transport.push_calls(vec![run_check("never", true, "unreachable")]);

    let (progress, events) = recording_progress();
    let err = converter(&transport, 12, 2)
        .convert(ConvertRequest::new(SAMPLE_SCRIPT).with_progress(progress))
        .await
        .unwrap_err();

    assert!(matches!(err, ConvertError::CheckFailed { ref summary } if summary == "still broken"));
    assert_eq!(transport.requests().len(), 3);

    let rounds: Vec<(AgentStep, Option<usize>)> = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e.step, AgentStep::Check | AgentStep::Fix))
        .map(|e| (e.step, e.round))
        .collect();
    assert_eq!(
        rounds,
        vec![
            (AgentStep::Check, Some(1)),
            (AgentStep::Fix, Some(1)),
            (AgentStep::Check, Some(2)),
            (AgentStep::Fix, Some(2)),
            (AgentStep::Check, Some(3)),
        ]
    );
}

#[tokio::test]
async fn background_only_conversion_is_rejected() {
    let transport = ScriptedTransport::new();
    transport.push_calls(vec![
        write_file("bg", "background.js", "chrome.runtime;", "background"),
        run_check("c", true, "ok"),
    ]);

    let err = converter(&transport, 12, 2)
        .convert(ConvertRequest::new(SAMPLE_SCRIPT))
        .await
        .unwrap_err();

    assert!(matches!(err, ConvertError::MissingRequiredFiles));
}

#[tokio::test]
async fn check_passing_after_a_fix_round_is_accepted() {
    let transport = ScriptedTransport::new();
    let mut calls = core_files("a");
    calls.push(run_check("c1", false, "one issue"));
    transport.push_calls(calls);
    transport.push_calls(vec![apply_fix("f", "fixed"), run_check("c2", true, "ok")]);

    let result = converter(&transport, 12, 2)
        .convert(ConvertRequest::new(SAMPLE_SCRIPT))
        .await
        .unwrap();

    assert_eq!(result.exit, LoopExit::CheckPassed);
    assert_eq!(result.turns, 2);
    assert_eq!(result.checks.len(), 2);
}

#[tokio::test]
async fn files_without_any_check_fail_at_the_turn_cap() {
    let transport = ScriptedTransport::new();
    transport.push_text("Let me look at the script first.");
    transport.push_calls(core_files("a"));
    transport.push_text("Writing done.");

    let err = converter(&transport, 3, 2)
        .convert(ConvertRequest::new(SAMPLE_SCRIPT))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("did not run check step"));
    assert_eq!(transport.requests().len(), 3);
}

#[tokio::test]
async fn text_only_turns_are_nudged_until_the_budget_runs_out() {
    let transport = ScriptedTransport::new();
    for _ in 0..4 {
        transport.push_text("thinking...");
    }

    let err = converter(&transport, 4, 2)
        .convert(ConvertRequest::new(SAMPLE_SCRIPT))
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::MissingRequiredFiles));

    let requests = transport.requests();
    assert_eq!(requests.len(), 4);
    let last = requests[3].messages.last().unwrap();
    assert_eq!(last.role, Role::User);
    assert!(last.text().contains("tool"));
}

#[tokio::test]
async fn legacy_tools_produce_a_valid_file_set() {
    let transport = ScriptedTransport::new();
    transport.push_calls(vec![
        call(
            "m",
            "write_manifest",
            json!({ "manifest": { "manifest_version": 3, "name": "Demo", "version": "1.0" } }),
        ),
        call("c", "write_content_js", json!({ "code": "main();" })),
        call("b", "write_background_js", json!({ "code": null })),
        run_check("k", true, "ok"),
    ]);

    let result = converter(&transport, 12, 2)
        .convert(ConvertRequest::new(SAMPLE_SCRIPT))
        .await
        .unwrap();

    let manifest = result.files.iter().find(|f| f.path == MANIFEST_PATH).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&manifest.content).unwrap();
    assert_eq!(parsed["manifest_version"], 3);
    assert!(manifest.required);
    assert_eq!(manifest.reason.as_deref(), Some("Legacy tool fallback"));
    assert!(result.files.iter().all(|f| f.path != "background.js"));
}

#[tokio::test]
async fn notes_are_carried_into_the_result() {
    let transport = ScriptedTransport::new();
    let mut calls = core_files("a");
    calls.push(call("n", "add_note", json!({ "message": "  Icons need to be added.  " })));
    calls.push(run_check("c", true, "ok"));
    transport.push_calls(calls);

    let result = converter(&transport, 12, 2)
        .convert(ConvertRequest::new(SAMPLE_SCRIPT))
        .await
        .unwrap();

    assert_eq!(result.notes, vec!["Icons need to be added.".to_string()]);
}

#[tokio::test]
async fn quiet_turn_after_a_pass_ends_the_loop_when_passes_do_not_stop_it() {
    let transport = ScriptedTransport::new();
    let mut calls = core_files("a");
    calls.push(run_check("c", true, "ok"));
    transport.push_calls(calls);
    transport.push_calls(vec![call("n", "add_note", json!({ "message": "Reload the page after install." }))]);
    transport.push_text("All done.");

    let settings = AgentSettings::builder().stop_on_pass(false).build();
    let result = AgentConverter::new(transport.as_transport(), settings)
        .convert(ConvertRequest::new(SAMPLE_SCRIPT))
        .await
        .unwrap();

    assert_eq!(result.exit, LoopExit::IdleAfterPass);
    assert_eq!(result.turns, 3);
    assert_eq!(result.notes, vec!["Reload the page after install.".to_string()]);
    assert_eq!(transport.requests().len(), 3);
}

#[tokio::test]
async fn first_turn_streams_previews_before_progress() {
    let transport = ScriptedTransport::new();
    transport.push(Scripted::Chunks(vec![
        ChatStreamChunk {
            tool_calls: vec![ToolCallDelta {
                index: 0,
                id: Some("w".into()),
                name: Some("write_file".into()),
                arguments: Some(r#"{"path":"content.js","content":"let a"#.into()),
            }],
            ..Default::default()
        },
        ChatStreamChunk {
            tool_calls: vec![ToolCallDelta {
                index: 0,
                arguments: Some(r#" = 1;","kind":"content"}"#.into()),
                ..Default::default()
            }],
            ..Default::default()
        },
        ChatStreamChunk {
            tool_calls: vec![ToolCallDelta {
                index: 1,
                id: Some("m".into()),
                name: Some("write_file".into()),
                arguments: Some(
                    json!({ "path": "manifest.json", "content": "{}", "kind": "manifest" }).to_string(),
                ),
            }],
            finish_reason: Some(FinishReason::ToolCalls),
            ..Default::default()
        },
    ]));
    transport.push_calls(vec![run_check("c", true, "ok")]);

    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let stream_log = log.clone();
    let progress_log = log.clone();
    let stream: StreamSink = Arc::new(move |event: StreamEvent| {
        stream_log
            .lock()
            .unwrap()
            .push(format!("stream {} {}", event.file_path.unwrap_or_default(), event.content));
    });
    let progress: ProgressSink = Arc::new(move |event: ProgressEvent| {
        progress_log.lock().unwrap().push(format!("progress {}", event.step));
    });

    let result = converter(&transport, 12, 2)
        .convert(
            ConvertRequest::new(SAMPLE_SCRIPT)
                .with_stream(stream)
                .with_progress(progress),
        )
        .await
        .unwrap();

    assert_eq!(transport.streamed(), vec![true, false]);
    let content = result.files.iter().find(|f| f.path == "content.js").unwrap();
    assert_eq!(content.content, "let a = 1;");

    let log = log.lock().unwrap().clone();
    assert_eq!(log[0], "stream content.js let a");
    assert_eq!(log[1], "stream content.js let a = 1;");
    assert_eq!(log[2], "stream manifest.json {}");
    assert!(log[3].starts_with("progress"));
}

#[tokio::test]
async fn streaming_can_be_disabled_for_the_first_turn() {
    let transport = ScriptedTransport::new();
    let mut calls = core_files("a");
    calls.push(run_check("c", true, "ok"));
    transport.push_calls(calls);

    let settings = AgentSettings::builder().stream_first_turn(false).build();
    let stream: StreamSink = Arc::new(|_: StreamEvent| {});
    AgentConverter::new(transport.as_transport(), settings)
        .convert(ConvertRequest::new(SAMPLE_SCRIPT).with_stream(stream))
        .await
        .unwrap();

    assert_eq!(transport.streamed(), vec![false]);
}

#[tokio::test]
async fn transport_errors_end_the_conversion() {
    let transport = ScriptedTransport::new();
    transport.push_calls(core_files("a"));
    transport.push(Scripted::Fail(ConvertError::api(502, "bad gateway")));

    let (progress, events) = recording_progress();
    let err = converter(&transport, 12, 2)
        .convert(ConvertRequest::new(SAMPLE_SCRIPT).with_progress(progress))
        .await
        .unwrap_err();

    assert!(matches!(err, ConvertError::Api { status: 502, .. }));
    assert!(events.lock().unwrap().iter().all(|e| e.step != AgentStep::Done));
}

#[tokio::test]
async fn cancellation_before_the_first_turn_skips_the_transport() {
    let transport = ScriptedTransport::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = converter(&transport, 12, 2)
        .convert(ConvertRequest::new(SAMPLE_SCRIPT).with_cancel(cancel))
        .await
        .unwrap_err();

    assert!(matches!(err, ConvertError::Canceled));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn cancellation_interrupts_a_pending_turn() {
    let transport = ScriptedTransport::new();
    transport.push(Scripted::Hang);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = converter(&transport, 12, 2)
        .convert(ConvertRequest::new(SAMPLE_SCRIPT).with_cancel(cancel))
        .await
        .unwrap_err();

    assert!(matches!(err, ConvertError::Canceled));
    assert_eq!(transport.requests().len(), 1);
}
