//! Hook integration tests: `BeforeToolCall`/`AfterToolCall` firing during the
//! agent's tool sub-loop.

mod support;

use open_agent::{tool, Agent, AgentEventKind, AgentOptions, AgentStopReason, HookPoint, HookRegistry, InvokeOptions};
use serde_json::json;
use std::sync::{Arc, Mutex};
use support::{text_reply, tool_call_reply, ScriptedModel};

/// `BeforeToolCall` sets `cancel_tool`: the tool body never runs, and the
/// agent still reaches `EndTurn` after the model sees the synthesized error.
#[tokio::test]
async fn test_before_tool_call_blocks_tool() {
    let dangerous_tool = tool("delete_file", "Delete a file")
        .param("path", "string")
        .build(|_args| async move {
            panic!("should not execute: the hook should have cancelled this call");
        });

    let hooks = HookRegistry::new().on(HookPoint::BeforeToolCall, |event| async move {
        if let AgentEventKind::BeforeToolCall { tool_name, cancel_tool, .. } = &mut event.kind {
            if tool_name == "delete_file" {
                *cancel_tool = Some("dangerous operation blocked".to_string());
            }
        }
    });

    let model = Arc::new(ScriptedModel::new(vec![
        tool_call_reply("call_1", "delete_file", json!({"path": "/etc/passwd"})),
        text_reply("I was not able to delete that file"),
    ]));
    let options = AgentOptions::builder()
        .tool(dangerous_tool)
        .hooks(hooks)
        .max_turns(5)
        .build()
        .unwrap();
    let agent = Agent::new(model, options).unwrap();

    let result = agent.invoke("delete /etc/passwd", InvokeOptions::default()).await.unwrap();
    assert_eq!(result.stop_reason, AgentStopReason::EndTurn);
}

/// `AfterToolCall` observes the real result produced by the tool, without
/// being able to mutate it (result mutation is out of scope; logging and
/// `retry` are the supported signals).
#[tokio::test]
async fn test_after_tool_call_observes_result() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let log_clone = Arc::clone(&log);

    let data_tool = tool("get_data", "Get data")
        .param("id", "string")
        .build(|_args| async move { Ok(json!({"data": "sensitive_information"})) });

    let hooks = HookRegistry::new().on(HookPoint::AfterToolCall, move |event| {
        let log = Arc::clone(&log_clone);
        async move {
            if let AgentEventKind::AfterToolCall { tool_name, result, .. } = &event.kind {
                log.lock().unwrap().push(format!("{tool_name}: {:?}", result.content));
            }
        }
    });

    let model = Arc::new(ScriptedModel::new(vec![
        tool_call_reply("call_1", "get_data", json!({"id": "1"})),
        text_reply("here is the data"),
    ]));
    let options = AgentOptions::builder()
        .tool(data_tool)
        .hooks(hooks)
        .max_turns(5)
        .build()
        .unwrap();
    let agent = Agent::new(model, options).unwrap();

    let result = agent.invoke("get data 1", InvokeOptions::default()).await.unwrap();
    assert_eq!(result.stop_reason, AgentStopReason::EndTurn);

    let entries = log.lock().unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].contains("get_data"));
    assert!(entries[0].contains("sensitive_information"));
}

/// `AfterToolCall`'s `retry` flag re-executes the same tool call.
#[tokio::test]
async fn test_after_tool_call_retry_reexecutes() {
    let attempts = Arc::new(Mutex::new(0));
    let attempts_clone = Arc::clone(&attempts);

    let flaky = tool("flaky", "Fails once then succeeds")
        .build(move |_args| {
            let attempts = Arc::clone(&attempts_clone);
            async move {
                let mut count = attempts.lock().unwrap();
                *count += 1;
                Ok(json!({"attempt": *count}))
            }
        });

    let retried = Arc::new(Mutex::new(false));
    let retried_clone = Arc::clone(&retried);
    let hooks = HookRegistry::new().on(HookPoint::AfterToolCall, move |event| {
        let retried = Arc::clone(&retried_clone);
        async move {
            if let AgentEventKind::AfterToolCall { tool_name, retry, .. } = &mut event.kind {
                if tool_name == "flaky" {
                    let mut already = retried.lock().unwrap();
                    if !*already {
                        *already = true;
                        *retry = true;
                    }
                }
            }
        }
    });

    let model = Arc::new(ScriptedModel::new(vec![
        tool_call_reply("call_1", "flaky", json!({})),
        text_reply("done"),
    ]));
    let options = AgentOptions::builder()
        .tool(flaky)
        .hooks(hooks)
        .max_turns(5)
        .build()
        .unwrap();
    let agent = Agent::new(model, options).unwrap();

    let result = agent.invoke("run flaky", InvokeOptions::default()).await.unwrap();
    assert_eq!(result.stop_reason, AgentStopReason::EndTurn);
    assert_eq!(*attempts.lock().unwrap(), 2);
}

/// Multiple callbacks on the same hook point run in registration order.
#[tokio::test]
async fn test_multiple_before_tool_call_hooks_run_in_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let order_a = Arc::clone(&order);
    let order_b = Arc::clone(&order);

    let op = tool("op", "An operation")
        .param("value", "number")
        .build(|_args| async move { Ok(json!({"result": 42})) });

    let hooks = HookRegistry::new()
        .on(HookPoint::BeforeToolCall, move |_event| {
            let order = Arc::clone(&order_a);
            async move {
                order.lock().unwrap().push("first");
            }
        })
        .on(HookPoint::BeforeToolCall, move |_event| {
            let order = Arc::clone(&order_b);
            async move {
                order.lock().unwrap().push("second");
            }
        });

    let model = Arc::new(ScriptedModel::new(vec![
        tool_call_reply("call_1", "op", json!({"value": 2000})),
        text_reply("done"),
    ]));
    let options = AgentOptions::builder()
        .tool(op)
        .hooks(hooks)
        .max_turns(5)
        .build()
        .unwrap();
    let agent = Agent::new(model, options).unwrap();

    agent.invoke("run op", InvokeOptions::default()).await.unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
}
