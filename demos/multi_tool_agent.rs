//! Multi-Tool Agent Example
//!
//! Demonstrates a realistic agent with several tools plus safety and logging
//! hooks: `BeforeToolCall` blocks dangerous calls, `AfterToolCall` records
//! every completed call and tags its result with metadata.
//!
//! Usage:
//!   cargo run --example multi_tool_agent
//!
//! Requires Ollama running on localhost:11434 with qwen3:8b (or adjust the
//! model name below).

use open_agent::adapters::openai_compat::{OpenAiCompatConfig, OpenAiCompatModel};
use open_agent::{tool, Agent, AgentEventKind, AgentOptions, ContentBlock, HookPoint, HookRegistry, InvokeOptions};
use serde_json::json;
use std::sync::{Arc, Mutex};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "=".repeat(70));
    println!("MULTI-TOOL AGENT DEMO");
    println!("Realistic agent with 5 tools and safety/logging hooks");
    println!("{}", "=".repeat(70));
    println!();

    let execution_log = Arc::new(Mutex::new(Vec::new()));

    let calculator = tool("calculate", "Perform arithmetic")
        .param("operation", "string")
        .param("a", "number")
        .param("b", "number")
        .build(|args| async move {
            let op = args["operation"].as_str().unwrap_or("");
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);

            let result = match op {
                "add" => a + b,
                "subtract" => a - b,
                "multiply" => a * b,
                "divide" => {
                    if b == 0.0 {
                        return Err(open_agent::Error::tool("division by zero"));
                    }
                    a / b
                }
                _ => return Err(open_agent::Error::tool("unknown operation")),
            };

            Ok(json!({"result": result, "operation": op}))
        });

    let datetime = tool("get_datetime", "Get the current Unix timestamp")
        .build(|_args| async move {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_secs();
            Ok(json!({"unix_timestamp": now}))
        });

    let converter = tool("convert_units", "Convert between units")
        .param("value", "number")
        .param("from_unit", "string")
        .param("to_unit", "string")
        .build(|args| async move {
            let value = args["value"].as_f64().unwrap_or(0.0);
            let from = args["from_unit"].as_str().unwrap_or("");
            let to = args["to_unit"].as_str().unwrap_or("");

            let result = match (from, to) {
                ("km", "miles") => value * 0.621371,
                ("miles", "km") => value / 0.621371,
                ("kg", "lbs") => value * 2.20462,
                ("lbs", "kg") => value / 2.20462,
                ("celsius", "fahrenheit") => (value * 9.0 / 5.0) + 32.0,
                ("fahrenheit", "celsius") => (value - 32.0) * 5.0 / 9.0,
                _ => return Err(open_agent::Error::tool("unsupported conversion")),
            };

            Ok(json!({"result": result, "from": from, "to": to, "original_value": value}))
        });

    let search = tool("search", "Search for information")
        .param("query", "string")
        .build(|args| async move {
            let query = args["query"].as_str().unwrap_or("");
            Ok(json!({
                "results": [
                    {"title": format!("Result for: {query}"), "relevance": 0.95},
                    {"title": "Related information", "relevance": 0.80},
                ],
                "query": query,
            }))
        });

    let formatter = tool("format_data", "Format data as a table or list")
        .param("data", "object")
        .param("format", "string")
        .build(|args| async move {
            let format = args["format"].as_str().unwrap_or("list");
            Ok(json!({"formatted": format!("data formatted as: {format}"), "format": format}))
        });

    let log_for_before = execution_log.clone();
    let log_for_after = execution_log.clone();
    let hooks = HookRegistry::new()
        .on(HookPoint::BeforeToolCall, move |event| {
            let execution_log = log_for_before.clone();
            async move {
                if let AgentEventKind::BeforeToolCall { tool_name, cancel_tool, .. } = &mut event.kind {
                    println!("[before] {tool_name}");

                    if tool_name == "delete" || tool_name == "modify_system" {
                        println!("  blocked: dangerous operation");
                        *cancel_tool = Some("safety policy violation".to_string());
                        return;
                    }

                    let _ = &execution_log;
                }
            }
        })
        .on(HookPoint::AfterToolCall, move |event| {
            let execution_log = log_for_after.clone();
            async move {
                if let AgentEventKind::AfterToolCall { tool_name, result, .. } = &event.kind {
                    println!("[after] {tool_name} completed");
                    let timestamp = std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .unwrap()
                        .as_secs();
                    execution_log.lock().unwrap().push(format!(
                        "[{timestamp}] {tool_name} -> {:?}",
                        result.content
                    ));
                }
            }
        });

    let config = OpenAiCompatConfig::builder()
        .base_url("http://localhost:11434/v1")
        .model("qwen3:8b")
        .temperature(0.3)
        .build()?;
    let model = Arc::new(OpenAiCompatModel::new(config)?);
    let options = AgentOptions::builder()
        .system_prompt(
            "You are a helpful multi-tool assistant. You have access to: \
             calculator, datetime, unit converter, search, and data formatter. \
             Always use tools for calculations and conversions.",
        )
        .tool(calculator)
        .tool(datetime)
        .tool(converter)
        .tool(search)
        .tool(formatter)
        .hooks(hooks)
        .max_turns(10)
        .build()?;
    let agent = Agent::new(model, options)?;

    println!("Agent configured with 5 tools and safety/logging hooks");
    println!("{}", "-".repeat(70));
    println!();

    let queries = [
        "What's 15 kilometers in miles?",
        "Calculate 25 divided by 5, then multiply by 3",
        "What's the current Unix timestamp?",
        "Search for information about Rust programming",
    ];

    for (i, query) in queries.iter().enumerate() {
        println!("Query {}: {}", i + 1, query);
        println!();

        let result = agent.invoke(*query, InvokeOptions::default()).await?;
        if let Some(message) = result.last_message {
            for block in &message.content {
                if let ContentBlock::Text(text) = block {
                    println!("Assistant: {}", text.text);
                }
            }
        }

        println!();
        println!("{}", "-".repeat(70));
        println!();
    }

    println!("Execution Log:");
    println!("{}", "=".repeat(70));
    for entry in execution_log.lock().unwrap().iter() {
        println!("{entry}");
    }
    println!("{}", "=".repeat(70));
    println!();

    println!("{}", "=".repeat(70));
    println!("DEMO COMPLETE");
    println!("{}", "=".repeat(70));

    Ok(())
}
