//! Hooks Example
//!
//! Demonstrates using lifecycle hooks to observe and control agent behavior:
//! - `MessageAdded`: log every message appended to history
//! - `BeforeToolCall`: cancel a tool call before it runs
//! - `AfterToolCall`: force a retry when a tool's result looks wrong

use open_agent::adapters::openai_compat::{OpenAiCompatConfig, OpenAiCompatModel};
use open_agent::{tool, Agent, AgentEventKind, AgentOptions, HookPoint, HookRegistry, InvokeOptions};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "=".repeat(70));
    println!("HOOKS EXAMPLE");
    println!("{}", "=".repeat(70));
    println!();

    // Example 1: log every message as it's appended to history.
    println!("Example 1: Message logging hook");
    println!("{}", "-".repeat(70));

    let hooks = HookRegistry::new().on(HookPoint::MessageAdded, |event| async move {
        if let AgentEventKind::MessageAdded { message } = &event.kind {
            println!("  [hook] message added, role={:?}", message.role);
        }
    });

    let config = OpenAiCompatConfig::builder()
        .base_url("http://localhost:11434/v1")
        .model("qwen3:8b")
        .build()?;
    let model = Arc::new(OpenAiCompatModel::new(config)?);
    let options = AgentOptions::builder()
        .system_prompt("You are a helpful assistant")
        .hooks(hooks)
        .build()?;
    let agent = Agent::new(model, options)?;

    let result = agent
        .invoke("What is the capital of France?", InvokeOptions::default())
        .await?;
    println!("stop reason: {:?}", result.stop_reason);

    println!();
    println!("{}", "=".repeat(70));

    // Example 2: cancel a dangerous tool call before it runs, via BeforeToolCall.
    println!("\nExample 2: Tool call cancellation");
    println!("{}", "-".repeat(70));

    let delete_tool = tool("delete_file", "Deletes a file")
        .param("path", "string")
        .build(|args| async move {
            // Never actually reached: the hook below cancels it first.
            Ok(json!({"deleted": args["path"]}))
        });

    let cancel_hooks = HookRegistry::new().on(HookPoint::BeforeToolCall, |event| async move {
        if let AgentEventKind::BeforeToolCall { tool_name, cancel_tool, .. } = &mut event.kind {
            if tool_name == "delete_file" {
                println!("  [hook] blocking destructive tool call: {tool_name}");
                *cancel_tool = Some("destructive tool calls require manual approval".to_string());
            }
        }
    });

    let config = OpenAiCompatConfig::builder()
        .base_url("http://localhost:11434/v1")
        .model("qwen3:8b")
        .build()?;
    let model = Arc::new(OpenAiCompatModel::new(config)?);
    let options = AgentOptions::builder()
        .system_prompt("You are a file management assistant")
        .tool(delete_tool)
        .hooks(cancel_hooks)
        .max_turns(3)
        .build()?;
    let agent = Agent::new(model, options)?;

    let result = agent
        .invoke("Please delete the file /tmp/scratch.txt", InvokeOptions::default())
        .await?;
    println!("stop reason: {:?}", result.stop_reason);

    println!();
    println!("{}", "=".repeat(70));

    // Example 3: retry a flaky tool call once via AfterToolCall.
    println!("\nExample 3: Retry on first failure");
    println!("{}", "-".repeat(70));

    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_for_tool = attempts.clone();
    let flaky_tool = tool("fetch_status", "Fetches a status code").build(move |_args| {
        let attempts = attempts_for_tool.clone();
        async move {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                return Err(open_agent::Error::tool("transient failure, try again"));
            }
            Ok(json!({"status": "ok"}))
        }
    });

    let retry_hooks = HookRegistry::new().on(HookPoint::AfterToolCall, |event| async move {
        if let AgentEventKind::AfterToolCall { result, retry, .. } = &mut event.kind {
            if result.is_error() {
                println!("  [hook] tool call failed, retrying once");
                *retry = true;
            }
        }
    });

    let config = OpenAiCompatConfig::builder()
        .base_url("http://localhost:11434/v1")
        .model("qwen3:8b")
        .build()?;
    let model = Arc::new(OpenAiCompatModel::new(config)?);
    let options = AgentOptions::builder()
        .tool(flaky_tool)
        .hooks(retry_hooks)
        .max_turns(3)
        .build()?;
    let agent = Agent::new(model, options)?;

    let result = agent
        .invoke("Check the service status", InvokeOptions::default())
        .await?;
    println!("stop reason: {:?}", result.stop_reason);
    println!("total tool attempts: {}", attempts.load(Ordering::SeqCst));

    println!();
    println!("{}", "=".repeat(70));
    println!("Hooks example complete!");
    println!("{}", "=".repeat(70));

    Ok(())
}
