//! Tool definitions, registry helpers and built-in tools in a run.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;

use common::{last_tool_output, output_text, retry_model, text_response, tool_response, MockModel};
use harper::prelude::*;
use harper::tools::{convert_tools, get_tool, merge_tools, ToolDefinition};
use harper::types::{AgentToolCall, ToolResultOutput};

fn echo(name: &str) -> Arc<dyn Tool> {
    let params = ToolParameters::object()
        .string("message", "Text to echo", true)
        .boolean("loud", "Upper-case the reply", false)
        .build();
    Arc::new(AgentTool::new(name, "Echo a message", params, |args, _| async move {
        let message = args.get_str("message")?.to_string();
        if args.get_bool_opt("loud").unwrap_or(false) {
            Ok(ToolResult::text(message.to_uppercase()))
        } else {
            Ok(ToolResult::text(message))
        }
    }))
}

#[test]
fn definitions_carry_the_parameter_schema() {
    let definitions = convert_tools(&[echo("echo")]);
    assert_eq!(definitions.len(), 1);
    let schema = &definitions[0].input_schema;
    assert_eq!(schema["type"], "object");
    assert_eq!(schema["properties"]["message"]["type"], "string");
    assert_eq!(schema["properties"]["loud"]["type"], "boolean");
    assert_eq!(schema["required"], json!(["message"]));
}

#[test]
fn merge_prefers_overrides_and_keeps_order() {
    let base = vec![
        ToolDefinition {
            name: "a".into(),
            description: "base a".into(),
            input_schema: json!({}),
        },
        ToolDefinition {
            name: "b".into(),
            description: "base b".into(),
            input_schema: json!({}),
        },
    ];
    let overrides = vec![
        ToolDefinition {
            name: "b".into(),
            description: "override b".into(),
            input_schema: json!({}),
        },
        ToolDefinition {
            name: "c".into(),
            description: "new c".into(),
            input_schema: json!({}),
        },
    ];

    let merged = merge_tools(base, overrides);

    let described: Vec<(&str, &str)> = merged
        .iter()
        .map(|t| (t.name.as_str(), t.description.as_str()))
        .collect();
    assert_eq!(
        described,
        vec![("a", "base a"), ("b", "override b"), ("c", "new c")]
    );
    assert_eq!(get_tool(&merged, "c").map(|t| t.description.as_str()), Some("new c"));
    assert!(get_tool(&merged, "d").is_none());
}

#[tokio::test]
async fn tool_errors_become_error_results_and_the_agent_continues() {
    let model = Arc::new(MockModel::scripted("mock"));
    model.queue_tool_call("c1", "echo", json!({"loud": true}));
    model.queue_tool_call("c2", "echo", json!({"message": "hi", "loud": true}));
    model.queue_text("echoed");

    let workflow = Workflow::new("task-echo", "Echo").with_agent(WorkflowAgent::new("a", "Echoer", "Echo"));
    let context = Arc::new(
        Context::new(workflow, retry_model(model.clone()))
            .with_agent(Agent::new("Echoer", "Echoes").with_tools([echo("echo")])),
    );

    let result = Scheduler::new().execute(context).await;

    assert_eq!(result.stop_reason, StopReason::Done);
    let requests = model.requests();
    match last_tool_output(&requests[1]).unwrap() {
        ToolResultOutput::ErrorText { value } => assert!(value.starts_with("Error: ")),
        other => panic!("expected an error result, got {other:?}"),
    }
    assert_eq!(
        last_tool_output(&requests[2]),
        Some(ToolResultOutput::Text { value: "HI".into() })
    );
}

#[tokio::test]
async fn interleaved_text_and_tool_calls_keep_their_order() {
    let model = Arc::new(MockModel::scripted("mock"));
    let call = |id: &str, message: &str| {
        ResponsePart::ToolCall(AgentToolCall::new(id, "echo", json!({ "message": message })))
    };
    model.queue_response(LlmResponse {
        parts: vec![
            ResponsePart::Text("First ".into()),
            ResponsePart::Text("I echo.".into()),
            call("c1", "one"),
            ResponsePart::Text("Then again.".into()),
            call("c2", "two"),
        ],
        reasoning: None,
        finish_reason: FinishReason::ToolCalls,
        usage: Usage::new(10, 5),
    });
    model.queue_text("echoed twice");

    let workflow = Workflow::new("task-echo", "Echo").with_agent(WorkflowAgent::new("a", "Echoer", "Echo"));
    let context = Arc::new(
        Context::new(workflow, retry_model(model.clone()))
            .with_agent(Agent::new("Echoer", "Echoes").with_tools([echo("echo")])),
    );

    let result = Scheduler::new().execute(context).await;

    assert_eq!(result.stop_reason, StopReason::Done);
    let requests = model.requests();
    let assistant = requests[1]
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant)
        .unwrap();
    let order: Vec<String> = assistant
        .content
        .iter()
        .map(|part| match part {
            ContentPart::Text { text } => format!("text:{text}"),
            ContentPart::ToolCall(call) => format!("call:{}", call.id),
            other => panic!("unexpected part {other:?}"),
        })
        .collect();
    assert_eq!(order, vec!["text:First I echo.", "call:c1", "text:Then again.", "call:c2"]);
}

#[tokio::test]
async fn agents_share_variables_through_storage() {
    let model = Arc::new(MockModel::with_handler("mock", |request| {
        let agent = common::agent_of(request);
        let turns = common::tool_turns(request);
        match (agent.as_str(), turns) {
            ("Collector", 0) => Ok(tool_response(vec![(
                "w1",
                "variable_storage",
                json!({"operation": "write_variable", "name": "prices", "value": "[3, 5]"}),
            )])),
            ("Reporter", 0) => Ok(tool_response(vec![(
                "r1",
                "variable_storage",
                json!({"operation": "read_variable", "name": "prices, missing"}),
            )])),
            ("Reporter", 1) => Ok(tool_response(vec![(
                "l1",
                "variable_storage",
                json!({"operation": "list_all_variable"}),
            )])),
            _ => Ok(text_response(format!("{agent} done").as_str())),
        }
    }));

    let workflow = Workflow::new("task-vars", "Price report")
        .with_agent(
            WorkflowAgent::new("a", "Collector", "Collect prices").with_node(WorkflowNode::Normal {
                text: "Collect prices".into(),
                input: None,
                output: Some("prices".into()),
            }),
        )
        .with_agent(
            WorkflowAgent::new("b", "Reporter", "Report prices")
                .with_depends_on(["a"])
                .with_node(WorkflowNode::Normal {
                    text: "Report prices".into(),
                    input: Some("prices".into()),
                    output: None,
                }),
        );
    let context = Arc::new(
        Context::new(workflow, retry_model(model.clone()))
            .with_variable("region", json!("EU"))
            .with_agent(Agent::new("Collector", "Collects"))
            .with_agent(Agent::new("Reporter", "Reports")),
    );

    let result = Scheduler::new().execute(Arc::clone(&context)).await;

    assert_eq!(result.stop_reason, StopReason::Done);
    assert_eq!(
        context.variables().read().await.get("prices"),
        Some(&json!("[3, 5]"))
    );

    let reporter: Vec<LlmRequest> = model
        .requests()
        .into_iter()
        .filter(|r| common::agent_of(r) == "Reporter")
        .collect();
    assert!(reporter[0].tools.iter().any(|t| t.name == "variable_storage"));
    assert_eq!(
        output_text(&last_tool_output(&reporter[1]).unwrap()),
        r#"{"prices":"[3, 5]"}"#
    );
    assert_eq!(
        output_text(&last_tool_output(&reporter[2]).unwrap()),
        r#"["prices","region"]"#
    );
}

#[tokio::test]
async fn own_tools_override_builtins_of_the_same_name() {
    let model = Arc::new(MockModel::scripted("mock"));
    model.queue_tool_call("c1", "variable_storage", json!({"message": "custom"}));
    model.queue_text("done");

    let workflow = Workflow::new("task-override", "Override").with_agent(
        WorkflowAgent::new("a", "Custom", "Use storage").with_node(WorkflowNode::Normal {
            text: "Store".into(),
            input: None,
            output: Some("x".into()),
        }),
    );
    let context = Arc::new(
        Context::new(workflow, retry_model(model.clone()))
            .with_agent(Agent::new("Custom", "Custom").with_tools([echo("variable_storage")])),
    );

    let result = Scheduler::new().execute(context).await;

    assert_eq!(result.stop_reason, StopReason::Done);
    let requests = model.requests();
    let storage: Vec<&ToolDefinition> = requests[0]
        .tools
        .iter()
        .filter(|t| t.name == "variable_storage")
        .collect();
    assert_eq!(storage.len(), 1);
    assert_eq!(storage[0].description, "Echo a message");
    assert_eq!(
        last_tool_output(&requests[1]),
        Some(ToolResultOutput::Text { value: "custom".into() })
    );
}
