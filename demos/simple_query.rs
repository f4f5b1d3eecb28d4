//! Simple query example
//!
//! Demonstrates the minimal path: one model, one agent, one invocation.

use futures::StreamExt;
use open_agent::adapters::openai_compat::{OpenAiCompatConfig, OpenAiCompatModel};
use open_agent::{Agent, AgentOptions, AgentStreamEvent, ContentBlock, InvokeOptions};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = OpenAiCompatConfig::builder()
        .base_url("http://localhost:11434/v1")
        .model("qwen3:8b")
        .temperature(0.7)
        .max_tokens(500)
        .build()?;
    let model = Arc::new(OpenAiCompatModel::new(config)?);

    let options = AgentOptions::builder()
        .system_prompt("You are a helpful assistant")
        .build()?;
    let agent = Agent::new(model, options)?;

    println!("Sending query to model...\n");

    let mut stream = agent.stream(
        "What's the capital of France? Please be brief.",
        InvokeOptions::default(),
    )?;

    print!("Response: ");
    while let Some(event) = stream.next().await {
        if let AgentStreamEvent::Block(ContentBlock::Text(text)) = event? {
            print!("{}", text.text);
            std::io::Write::flush(&mut std::io::stdout())?;
        }
    }

    let result = stream.result().await?;
    println!("\n\nQuery complete! Stop reason: {:?}", result.stop_reason);

    Ok(())
}
