//! Context Management Examples
//!
//! The agent never drops messages on its own initiative outside of whatever
//! `ConversationManager` it's given. This demonstrates:
//! 1. Stateless agents: a fresh `Agent` per independent task, no history
//!    carried between them.
//! 2. A `WindowedConversationManager` with a small token budget, to show it
//!    trimming automatically as history grows.

use open_agent::adapters::openai_compat::{OpenAiCompatConfig, OpenAiCompatModel};
use open_agent::{estimate_tokens, Agent, AgentOptions, InvokeOptions, Message, WindowedConversationManager};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "=".repeat(70));
    println!("CONTEXT MANAGEMENT EXAMPLES");
    println!("{}", "=".repeat(70));
    println!();

    pattern_1_stateless().await?;
    pattern_2_windowed_history().await?;

    Ok(())
}

fn model() -> Result<Arc<OpenAiCompatModel>, Box<dyn std::error::Error>> {
    let config = OpenAiCompatConfig::builder()
        .base_url("http://localhost:11434/v1")
        .model("qwen3:8b")
        .build()?;
    Ok(Arc::new(OpenAiCompatModel::new(config)?))
}

// ============================================================================
// Pattern 1: Stateless Agents
// ============================================================================
// Best for: single-task agents (copy editor, code formatter, etc.) where no
// task should see another task's history.

async fn pattern_1_stateless() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Pattern 1: Stateless Agents ===");
    println!("Best for: single-task agents with no shared context");
    println!();

    let tasks = vec!["Explain Rust", "Explain Python", "Explain JavaScript"];

    for task in tasks {
        // A fresh Agent per task: no history accumulates across iterations.
        let options = AgentOptions::builder()
            .system_prompt("You are a helpful assistant")
            .build()?;
        let agent = Agent::new(model()?, options)?;

        let result = agent.invoke(task, InvokeOptions::default()).await?;
        let response_len = result
            .last_message
            .as_ref()
            .map(|m| format!("{:?}", m.content).len())
            .unwrap_or(0);

        println!("Task: {}", task);
        println!("Response length: {} chars", response_len);
        println!();
    }

    println!("{}", "-".repeat(70));
    println!();
    Ok(())
}

// ============================================================================
// Pattern 2: Windowed History
// ============================================================================
// Best for: long-running conversations that must stay under a token budget.
// `WindowedConversationManager` trims automatically on every message append
// and repairs any tool-call pairing the cut would otherwise strand.

async fn pattern_2_windowed_history() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Pattern 2: Windowed History ===");
    println!("Best for: long conversations with a hard token budget");
    println!();

    let options = AgentOptions::builder()
        .system_prompt("You are a helpful assistant")
        .max_turns(1)
        .build()?;
    let manager = WindowedConversationManager::new(400).with_min_keep(2);
    let agent = Agent::new(model()?, options)?.with_conversation_manager(Box::new(manager));

    let interactions = [
        "What is Rust?",
        "Explain ownership",
        "What are lifetimes?",
        "How do traits work?",
        "Explain async/await",
    ];

    for (i, prompt) in interactions.iter().enumerate() {
        println!("Interaction {}: {}", i + 1, prompt);
        let result = agent.invoke(*prompt, InvokeOptions::default()).await?;
        println!("  stop reason: {:?}", result.stop_reason);
    }

    // Just to illustrate the estimator independently of an agent's own history.
    let sample = vec![Message::user("a".repeat(2000))];
    println!(
        "\nestimate_tokens on a standalone 2000-char message: {}",
        estimate_tokens(&sample)
    );

    println!();
    println!("{}", "-".repeat(70));
    println!();
    Ok(())
}
