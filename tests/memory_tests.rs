//! Context-window management: truncation, compression and deduplication.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;

use common::{drain, last_tool_output, output_text, retry_model, text_response, tool_response, MockModel};
use harper::memory::{handle_large_context_messages, SNAPSHOT_INSTRUCTION};
use harper::prelude::*;
use harper::types::{
    tool_pairing_is_consistent, AgentToolCall, FileContent, ToolResultOutput, ToolResultPart,
};

fn live_images(messages: &[ModelMessage]) -> usize {
    messages
        .iter()
        .flat_map(|m| m.content.iter())
        .filter(|part| part.is_image())
        .count()
}

#[test]
fn only_the_newest_image_survives_a_long_conversation() {
    let mut messages = vec![ModelMessage::system("sys")];
    for turn in 0..20 {
        if turn % 7 == 0 {
            messages.push(ModelMessage::user_with_file(
                format!("screenshot {turn}"),
                FileContent::new("aGVsbG8=", "image/png"),
            ));
        } else {
            messages.push(ModelMessage::user(format!("turn {turn}")));
        }
        messages.push(ModelMessage::assistant("ok"));
    }
    let part_counts: Vec<usize> = messages.iter().map(|m| m.content.len()).collect();
    assert_eq!(live_images(&messages), 3);

    handle_large_context_messages(&mut messages, &HarperConfig::default());

    assert_eq!(live_images(&messages), 1);
    let newest = messages
        .iter()
        .rposition(|m| m.text().starts_with("screenshot"))
        .unwrap();
    assert!(messages[newest].content[1].is_image());
    assert_eq!(messages.iter().map(|m| m.content.len()).collect::<Vec<_>>(), part_counts);
    let placeholders = messages
        .iter()
        .flat_map(|m| m.content.iter())
        .filter(|part| **part == ContentPart::text("[image]"))
        .count();
    assert_eq!(placeholders, 2);
}

#[test]
fn older_long_tool_output_is_cut_per_tool() {
    let long = "x".repeat(6_000);
    let result = |id: &str, tool: &str| {
        ModelMessage::tool(vec![ToolResultPart {
            tool_call_id: id.into(),
            tool_name: tool.into(),
            output: ToolResultOutput::Text { value: long.clone() },
        }])
    };
    let mut messages = vec![
        ModelMessage::system("sys"),
        ModelMessage::user("task"),
        result("1", "read"),
        result("2", "fetch"),
        result("3", "read"),
    ];

    handle_large_context_messages(&mut messages, &HarperConfig::default());

    let text_of = |m: &ModelMessage| match &m.tool_results()[0].output {
        ToolResultOutput::Text { value } => value.clone(),
        other => panic!("unexpected output {other:?}"),
    };
    assert_eq!(text_of(&messages[2]), format!("{}...", "x".repeat(5_000)));
    assert_eq!(text_of(&messages[3]).len(), 6_000);
    assert_eq!(text_of(&messages[4]).len(), 6_000);
}

#[tokio::test]
async fn long_histories_are_compressed_into_a_snapshot() {
    let searches = Arc::new(AtomicUsize::new(0));
    let model = Arc::new(MockModel::with_handler("mock", {
        let searches = Arc::clone(&searches);
        move |request: &LlmRequest| {
            if request.tool_choice == ToolChoice::tool("task_snapshot") {
                return Ok(tool_response(vec![(
                    "snap",
                    "task_snapshot",
                    json!({"doneIds": [0], "taskSnapshot": "searched the archive"}),
                )]));
            }
            let n = searches.fetch_add(1, Ordering::SeqCst);
            if n < 7 {
                Ok(tool_response(vec![(format!("s{n}").as_str(), "search", json!({"page": n}))]))
            } else {
                Ok(text_response("all pages read"))
            }
        }
    }));
    let search = AgentTool::new("search", "Search the archive", ToolParameters::empty(), |_, _| async {
        Ok(ToolResult::text("a page of results"))
    });
    let unused = AgentTool::new("unused", "Never called", ToolParameters::empty(), |_, _| async {
        Ok(ToolResult::text(""))
    });
    let workflow = Workflow::new("task-compress", "Read the archive")
        .with_agent(WorkflowAgent::new("a", "Reader", "Read every page"));
    let (callback, mut rx) = ChannelCallback::new();
    let context = Arc::new(
        Context::new(workflow, retry_model(model.clone()))
            .with_config(HarperConfig::builder().compress_threshold(8).build())
            .with_agent(Agent::new("Reader", "Reads").with_tool(search).with_tool(unused))
            .with_callback(Arc::new(callback)),
    );

    let result = Scheduler::new().execute(context).await;

    assert_eq!(result.stop_reason, StopReason::Done);
    assert_eq!(result.result, "all pages read");

    let requests = model.requests();
    let snapshot_requests: Vec<&LlmRequest> = requests
        .iter()
        .filter(|r| r.tool_choice == ToolChoice::tool("task_snapshot"))
        .collect();
    assert!(!snapshot_requests.is_empty());
    for request in &snapshot_requests {
        assert_eq!(
            request.messages.last().map(ModelMessage::text).as_deref(),
            Some(SNAPSHOT_INSTRUCTION)
        );
        let mut names: Vec<&str> = request.tools.iter().map(|t| t.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["search", "task_snapshot"]);
    }

    let react_requests: Vec<&LlmRequest> = requests
        .iter()
        .filter(|r| r.tool_choice == ToolChoice::Auto)
        .collect();
    assert_eq!(react_requests.len(), 8);
    assert_eq!(snapshot_requests.len(), 3);
    for request in &react_requests {
        assert!(tool_pairing_is_consistent(&request.messages));
        assert!(request.messages.len() <= 11);
        if request.messages.len() > 3 {
            let earliest = request.messages[3].tool_results();
            assert_eq!(earliest[0].tool_call_id, "s0");
        }
    }
    // Each history ends with the previous request's last turn followed by the
    // call and result that came after it, compressed or not.
    for pair in react_requests.windows(2) {
        let (prev, next) = (&pair[0].messages, &pair[1].messages);
        let n = next.len();
        assert_eq!(&next[n - 3], prev.last().unwrap());
        assert_eq!(next[n - 2].role, Role::Assistant);
        assert_eq!(next[n - 1].role, Role::Tool);
        assert_eq!(
            next[n - 1].tool_results()[0].tool_call_id,
            next[n - 2].tool_calls()[0].id
        );
    }
    let last = react_requests.last().unwrap();
    assert_eq!(last.messages[0].role, Role::System);
    assert_eq!(last.messages[1].role, Role::User);
    assert!(last.messages.iter().any(|m| m.role == Role::User
        && m.text()
            == "Current task snapshot: searched the archive\nCompleted node ids: 0"));

    let snapshot_events = drain(&mut rx)
        .into_iter()
        .filter(|e| {
            matches!(&e.payload, CallbackPayload::ToolResult { tool_name, .. } if tool_name == "task_snapshot")
        })
        .count();
    assert_eq!(snapshot_events, snapshot_requests.len());
}

#[tokio::test]
async fn duplicate_tool_calls_run_once() {
    let runs = Arc::new(AtomicUsize::new(0));
    let fetch = {
        let runs = Arc::clone(&runs);
        AgentTool::new("fetch", "Fetch a page", ToolParameters::empty(), move |_, _| {
            let runs = Arc::clone(&runs);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(ToolResult::text("page"))
            }
        })
    };
    let model = Arc::new(MockModel::scripted("mock"));
    model.queue_response(LlmResponse {
        parts: vec![
            ResponsePart::Text("fetching".into()),
            ResponsePart::ToolCall(AgentToolCall::new("c1", "fetch", json!({"url": "a", "n": 1}))),
            ResponsePart::ToolCall(AgentToolCall::new("c2", "fetch", json!({"n": 1, "url": "a"}))),
            ResponsePart::ToolCall(AgentToolCall::new("c3", "fetch", json!({"url": "b", "n": 1}))),
        ],
        reasoning: None,
        finish_reason: FinishReason::ToolCalls,
        usage: Usage::new(5, 5),
    });
    model.queue_text("done");

    let workflow = Workflow::new("task-dedup", "Fetch").with_agent(WorkflowAgent::new("a", "Fetcher", "Fetch"));
    let context = Arc::new(
        Context::new(workflow, retry_model(model.clone()))
            .with_agent(Agent::new("Fetcher", "Fetches").with_tool(fetch)),
    );

    let result = Scheduler::new().execute(context).await;

    assert_eq!(result.stop_reason, StopReason::Done);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    let history = &model.requests()[1].messages;
    let assistant = &history[history.len() - 2];
    let ids: Vec<&str> = assistant.tool_calls().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["c1", "c3"]);
    assert_eq!(history.last().unwrap().tool_results().len(), 2);
}

#[tokio::test]
async fn oversized_tool_output_is_parked_in_a_variable() {
    let dump = AgentTool::new("dump", "Dump a file", ToolParameters::empty(), |_, _| async {
        Ok(ToolResult::text("y".repeat(120)))
    });
    let model = Arc::new(MockModel::scripted("mock"));
    model.queue_tool_call("c1", "dump", json!({}));
    model.queue_text("stored");

    let workflow = Workflow::new("task-park", "Dump").with_agent(WorkflowAgent::new("a", "Dumper", "Dump"));
    let context = Arc::new(
        Context::new(workflow, retry_model(model.clone()))
            .with_config(HarperConfig::builder().file_text_max_length(50).build())
            .with_agent(Agent::new("Dumper", "Dumps").with_tool(dump)),
    );

    let result = Scheduler::new().execute(Arc::clone(&context)).await;

    assert_eq!(result.stop_reason, StopReason::Done);
    let stored = context.variables().read().await.get("tool_output_c1").cloned();
    assert_eq!(stored, Some(json!("y".repeat(120))));
    let text = output_text(&last_tool_output(&model.requests()[1]).unwrap());
    assert!(text.starts_with("[Output too long; full text stored in variable `tool_output_c1`]"));
    assert!(text.ends_with(&format!("\n{}...", "y".repeat(50))));
}
