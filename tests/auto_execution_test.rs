//! Tool sub-loop integration tests.
//!
//! The agent always executes tool calls as part of its cycle loop when the
//! model stops with `ToolUse` — there is no separate manual mode. These
//! tests drive that loop end to end with a scripted model.

mod support;

use open_agent::{tool, Agent, AgentOptions, AgentStopReason, ContentBlock, Error, InvokeOptions};
use serde_json::json;
use std::sync::Arc;
use support::{text_reply, tool_call_reply, ScriptedModel};

#[tokio::test]
async fn test_sequential_tool_calls_resolve_to_text() {
    let add_tool = tool("add", "Add two numbers")
        .param("a", "number")
        .param("b", "number")
        .build(|args| async move {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            Ok(json!({"result": a + b}))
        });

    let multiply_tool = tool("multiply", "Multiply two numbers")
        .param("a", "number")
        .param("b", "number")
        .build(|args| async move {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            Ok(json!({"result": a * b}))
        });

    let model = Arc::new(ScriptedModel::new(vec![
        tool_call_reply("call_1", "add", json!({"a": 5, "b": 3})),
        tool_call_reply("call_2", "multiply", json!({"a": 8, "b": 2})),
        text_reply("the final answer is 16"),
    ]));
    let options = AgentOptions::builder()
        .system_prompt("You are a calculator. Use tools to compute results.")
        .tool(add_tool)
        .tool(multiply_tool)
        .max_turns(5)
        .build()
        .unwrap();
    let agent = Agent::new(model, options).unwrap();

    let result = agent
        .invoke("Calculate 5 + 3, then multiply the result by 2", InvokeOptions::default())
        .await
        .unwrap();

    assert_eq!(result.stop_reason, AgentStopReason::EndTurn);
    match result.last_message.unwrap().content.first().unwrap() {
        ContentBlock::Text(t) => assert!(t.text.contains("16")),
        _ => panic!("expected a text block"),
    }
}

#[tokio::test]
async fn test_max_turns_limit_is_respected() {
    let counter_tool = tool("increment", "Increment a counter")
        .param("value", "number")
        .build(|args| async move {
            let value = args["value"].as_f64().unwrap_or(0.0);
            Ok(json!({"result": value + 1.0}))
        });

    let model = Arc::new(ScriptedModel::new(vec![tool_call_reply(
        "call_1",
        "increment",
        json!({"value": 1}),
    )]));
    let options = AgentOptions::builder()
        .tool(counter_tool)
        .max_turns(2)
        .build()
        .unwrap();
    let agent = Agent::new(model, options).unwrap();

    let result = agent.invoke("keep incrementing", InvokeOptions::default()).await.unwrap();
    assert_eq!(result.stop_reason, AgentStopReason::MaxTurns);
}

#[tokio::test]
async fn test_text_only_response_skips_tool_loop() {
    let options = AgentOptions::builder()
        .system_prompt("You are a helpful assistant.")
        .build()
        .unwrap();
    let model = Arc::new(ScriptedModel::new(vec![text_reply("hi there")]));
    let agent = Agent::new(model, options).unwrap();

    let result = agent.invoke("Hello", InvokeOptions::default()).await.unwrap();
    assert_eq!(result.stop_reason, AgentStopReason::EndTurn);
}

#[tokio::test]
async fn test_tool_execution_error_becomes_error_result_not_a_crash() {
    let failing_tool = tool("divide", "Divide two numbers")
        .param("a", "number")
        .param("b", "number")
        .build(|args| async move {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            if b == 0.0 {
                return Err(Error::tool("division by zero"));
            }
            Ok(json!({"result": a / b}))
        });

    let model = Arc::new(ScriptedModel::new(vec![
        tool_call_reply("call_1", "divide", json!({"a": 1, "b": 0})),
        text_reply("I could not divide by zero"),
    ]));
    let options = AgentOptions::builder().tool(failing_tool).max_turns(5).build().unwrap();
    let agent = Agent::new(model, options).unwrap();

    let result = agent.invoke("divide 1 by 0", InvokeOptions::default()).await.unwrap();
    assert_eq!(result.stop_reason, AgentStopReason::EndTurn);
}

#[tokio::test]
async fn test_unregistered_tool_name_does_not_panic() {
    let model = Arc::new(ScriptedModel::new(vec![
        tool_call_reply("call_1", "nonexistent", json!({})),
        text_reply("that tool isn't available"),
    ]));
    let options = AgentOptions::builder().max_turns(5).build().unwrap();
    let agent = Agent::new(model, options).unwrap();

    let result = agent.invoke("call a missing tool", InvokeOptions::default()).await.unwrap();
    assert_eq!(result.stop_reason, AgentStopReason::EndTurn);
}

#[tokio::test]
async fn test_large_tool_result_is_carried_through() {
    let big_data_tool = tool("get_big_data", "Returns large data")
        .build(|_args| async move {
            let large_string = "x".repeat(10_000);
            Ok(json!({"data": large_string}))
        });

    let model = Arc::new(ScriptedModel::new(vec![
        tool_call_reply("call_1", "get_big_data", json!({})),
        text_reply("fetched the data"),
    ]));
    let options = AgentOptions::builder().tool(big_data_tool).max_turns(5).build().unwrap();
    let agent = Agent::new(model, options).unwrap();

    let result = agent.invoke("get big data", InvokeOptions::default()).await.unwrap();
    assert_eq!(result.stop_reason, AgentStopReason::EndTurn);
}
