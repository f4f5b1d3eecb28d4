//! Advanced integration tests combining hooks, tools, and error handling in
//! realistic scenarios driven through the full `Agent` cycle loop.

mod support;

use open_agent::{tool, Agent, AgentEventKind, AgentOptions, AgentStopReason, HookPoint, HookRegistry, InvokeOptions};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use support::{text_reply, tool_call_reply, ScriptedModel};

/// A `BeforeToolCall` safety hook combined with an `AfterToolCall` logging
/// hook, both attached to the same invocation.
#[tokio::test]
async fn test_safety_hook_and_logging_hook_together() {
    let execution_count = Arc::new(AtomicUsize::new(0));
    let count_clone = execution_count.clone();

    let divide = tool("divide", "Divide numbers")
        .param("a", "number")
        .param("b", "number")
        .build(move |args| {
            let count = count_clone.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                let a = args["a"].as_f64().unwrap_or(0.0);
                let b = args["b"].as_f64().unwrap_or(0.0);
                Ok(json!({"result": a / b}))
            }
        });

    let blocked_count = Arc::new(AtomicUsize::new(0));
    let blocked_clone = blocked_count.clone();
    let logged = Arc::new(Mutex::new(Vec::new()));
    let logged_clone = logged.clone();

    let hooks = HookRegistry::new()
        .on(HookPoint::BeforeToolCall, move |event| {
            let blocked = blocked_clone.clone();
            async move {
                if let AgentEventKind::BeforeToolCall { tool_use, cancel_tool, .. } = &mut event.kind {
                    if tool_use.input.get("b").and_then(|v| v.as_f64()) == Some(0.0) {
                        blocked.fetch_add(1, Ordering::SeqCst);
                        *cancel_tool = Some("division by zero prevented".to_string());
                    }
                }
            }
        })
        .on(HookPoint::AfterToolCall, move |event| {
            let logged = logged_clone.clone();
            async move {
                if let AgentEventKind::AfterToolCall { tool_name, .. } = &event.kind {
                    logged.lock().unwrap().push(tool_name.clone());
                }
            }
        });

    let model = Arc::new(ScriptedModel::new(vec![
        tool_call_reply("call_1", "divide", json!({"a": 1, "b": 0})),
        text_reply("division by zero was blocked"),
    ]));
    let options = AgentOptions::builder().tool(divide).hooks(hooks).max_turns(5).build().unwrap();
    let agent = Agent::new(model, options).unwrap();

    let result = agent.invoke("divide 1 by 0", InvokeOptions::default()).await.unwrap();

    assert_eq!(result.stop_reason, AgentStopReason::EndTurn);
    assert_eq!(execution_count.load(Ordering::SeqCst), 0, "tool body must not run once cancelled");
    assert_eq!(blocked_count.load(Ordering::SeqCst), 1);
    assert_eq!(*logged.lock().unwrap(), vec!["divide".to_string()]);
}

/// Dropping the stream mid-flight cancels the spawned task and releases the
/// single-flight invocation lock, so a subsequent call succeeds.
#[tokio::test]
async fn test_dropping_stream_releases_invocation_lock() {
    let model = Arc::new(ScriptedModel::new(vec![text_reply("first reply")]));
    let options = AgentOptions::builder().build().unwrap();
    let agent = Agent::new(model, options).unwrap();

    let stream = agent.stream("go", InvokeOptions::default()).unwrap();
    drop(stream);

    // Give the aborted task's drop a chance to run.
    tokio::task::yield_now().await;

    let result = agent.invoke("go again", InvokeOptions::default()).await.unwrap();
    assert_eq!(result.stop_reason, AgentStopReason::EndTurn);
}

/// Two tools used together in one conversation, with a hook observing every
/// call regardless of which tool fired.
#[tokio::test]
async fn test_multiple_tools_with_shared_logging_hook() {
    let calc_tool = tool("calculate", "Calculate")
        .param("a", "number")
        .param("b", "number")
        .param("op", "string")
        .build(|args| async move {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            let op = args["op"].as_str().unwrap_or("add");
            let result = match op {
                "add" => a + b,
                "multiply" => a * b,
                _ => a + b,
            };
            Ok(json!({"result": result}))
        });

    let format_tool = tool("format", "Format result")
        .param("value", "number")
        .build(|args| async move {
            let value = args["value"].as_f64().unwrap_or(0.0);
            Ok(json!({"formatted": format!("{:.2}", value)}))
        });

    let log = Arc::new(Mutex::new(Vec::new()));
    let log_clone = log.clone();
    let hooks = HookRegistry::new().on(HookPoint::AfterToolCall, move |event| {
        let log = log_clone.clone();
        async move {
            if let AgentEventKind::AfterToolCall { tool_name, .. } = &event.kind {
                log.lock().unwrap().push(tool_name.clone());
            }
        }
    });

    let model = Arc::new(ScriptedModel::new(vec![
        tool_call_reply("call_1", "calculate", json!({"a": 2, "b": 3, "op": "add"})),
        tool_call_reply("call_2", "format", json!({"value": 5})),
        text_reply("the formatted result is 5.00"),
    ]));
    let options = AgentOptions::builder()
        .tool(calc_tool)
        .tool(format_tool)
        .hooks(hooks)
        .max_turns(5)
        .build()
        .unwrap();
    let agent = Agent::new(model, options).unwrap();

    let result = agent.invoke("calculate then format", InvokeOptions::default()).await.unwrap();
    assert_eq!(result.stop_reason, AgentStopReason::EndTurn);
    assert_eq!(*log.lock().unwrap(), vec!["calculate".to_string(), "format".to_string()]);
}
