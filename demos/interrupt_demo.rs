//! Interrupt Capability Demo
//!
//! Demonstrates the two distinct cancellation mechanisms this SDK provides:
//!
//! 1. Stream cancellation: dropping an `AgentStream` before it's drained
//!    aborts the in-flight invocation immediately.
//! 2. Human-in-the-loop interrupts: a tool call pauses the whole invocation
//!    pending an external decision, resumed later with `ResumeArgs`.
//!
//! Note: this example talks to Ollama at http://localhost:11434. Make sure
//! it's running with a model loaded before running this.

use futures::StreamExt;
use open_agent::adapters::openai_compat::{OpenAiCompatConfig, OpenAiCompatModel};
use open_agent::{
    tool, Agent, AgentOptions, AgentStopReason, AgentStreamEvent, ContentBlock, InvokeOptions,
    ResumeArgs,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn model() -> Result<Arc<OpenAiCompatModel>, Box<dyn std::error::Error>> {
    let config = OpenAiCompatConfig::builder()
        .base_url("http://localhost:11434/v1")
        .model("qwen3:8b")
        .temperature(0.7)
        .build()?;
    Ok(Arc::new(OpenAiCompatModel::new(config)?))
}

// ============================================================================
// Example 1: Stream cancellation via early drop
// ============================================================================
async fn stream_cancellation_example() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "=".repeat(60));
    println!("Example 1: Stream Cancellation");
    println!("{}", "=".repeat(60));
    println!();

    let options = AgentOptions::builder()
        .system_prompt("You are a helpful assistant. Be verbose in your responses.")
        .build()?;
    let agent = Agent::new(model()?, options)?;

    let mut stream = agent.stream(
        "Write a detailed 1000-word essay about quantum computing",
        InvokeOptions::default(),
    )?;

    println!("Streaming response (cancelling after 3 seconds)...\n");

    let mut chars_received = 0;
    let deadline = tokio::time::sleep(Duration::from_secs(3));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            event = stream.next() => {
                match event {
                    Some(Ok(AgentStreamEvent::Block(ContentBlock::Text(text)))) => {
                        chars_received += text.text.len();
                        print!("{}", text.text);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => break,
                }
            }
            _ = &mut deadline => {
                println!("\n\n⚠️  Timed out, dropping the stream to cancel the invocation");
                drop(stream);
                break;
            }
        }
    }

    println!("Received {} characters before cancelling\n", chars_received);
    Ok(())
}

// ============================================================================
// Example 2: Human-in-the-loop interrupt and resume
// ============================================================================
async fn interrupt_and_resume_example() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "=".repeat(60));
    println!("Example 2: Interrupt and Resume");
    println!("{}", "=".repeat(60));
    println!();

    let send_email = tool("send_email", "Sends an email to a recipient")
        .param("to", "string")
        .param("body", "string")
        .build_stream(|args, ctx| {
            futures::stream::once(async move {
                let decision = ctx
                    .interrupt("send_email_approval", format!("send email to {}?", args["to"]))
                    .await?;

                if decision.get("approved").and_then(|v| v.as_bool()) == Some(true) {
                    Ok(open_agent::ToolStreamEvent::Result(
                        open_agent::ToolResultBlock::success(
                            ctx.tool_use_id.clone(),
                            json!({"sent": true}),
                        ),
                    ))
                } else {
                    Ok(open_agent::ToolStreamEvent::Result(
                        open_agent::ToolResultBlock::error(ctx.tool_use_id.clone(), "not approved"),
                    ))
                }
            })
        });

    let options = AgentOptions::builder()
        .system_prompt("You are an assistant that can send emails on request.")
        .tool(send_email)
        .max_turns(5)
        .build()?;
    let agent = Agent::new(model()?, options)?;

    println!("Asking the agent to send an email...\n");
    let first = agent
        .invoke(
            "Send an email to team@example.com saying the deploy is done",
            InvokeOptions::default(),
        )
        .await?;

    match first.stop_reason {
        AgentStopReason::Interrupt => {
            println!(
                "⏸  Invocation paused: {} interrupt(s) pending human review",
                first.interrupts.len()
            );
            for interrupt in &first.interrupts {
                println!("   - {} ({})", interrupt.id, interrupt.name);
            }

            println!("\nApproving the request and resuming...\n");
            let mut resume = ResumeArgs::new();
            for interrupt in &first.interrupts {
                resume = resume.respond(interrupt.id.clone(), json!({"approved": true}));
            }

            let second = agent.invoke(resume, InvokeOptions::default()).await?;
            println!("Resumed invocation stop reason: {:?}", second.stop_reason);
        }
        other => {
            println!("Invocation ended without an interrupt: {other:?}");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("\n{}", "=".repeat(60));
    println!("INTERRUPT CAPABILITY DEMO");
    println!("{}", "=".repeat(60));
    println!();
    println!("This demo requires Ollama running at http://localhost:11434");
    println!("with a model loaded (e.g., qwen3:8b)\n");

    if let Err(e) = stream_cancellation_example().await {
        eprintln!("Stream cancellation example error: {e}");
    }

    if let Err(e) = interrupt_and_resume_example().await {
        eprintln!("Interrupt and resume example error: {e}");
    }

    println!("{}", "=".repeat(60));
    println!("All examples completed!");
    println!("{}", "=".repeat(60));

    Ok(())
}
