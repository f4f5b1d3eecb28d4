//! Git Commit Agent - analyzes staged changes and writes a commit message
//!
//! Demonstrates `InvokeOptions::structured_output`: instead of asking the
//! model for prose and hoping to parse JSON out of it, the agent forces a
//! call to the reserved structured-output tool, so the result arrives
//! already matching the schema below.
//!
//! Usage:
//!     git add .
//!     cargo run --example git_commit_agent

use open_agent::adapters::openai_compat::{OpenAiCompatConfig, OpenAiCompatModel};
use open_agent::{Agent, AgentOptions, InvokeOptions};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::io::{self, Write};
use std::process::Command;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct CommitData {
    #[serde(rename = "type")]
    commit_type: String,
    #[serde(default)]
    scope: String,
    subject: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    breaking: String,
}

impl CommitData {
    fn format(&self) -> String {
        let scope_part = if self.scope.is_empty() {
            String::new()
        } else {
            format!("({})", self.scope)
        };
        let mut message = format!("{}{}: {}", self.commit_type, scope_part, self.subject);
        if !self.body.is_empty() {
            message.push_str(&format!("\n\n{}", self.body.trim()));
        }
        if !self.breaking.is_empty() {
            message.push_str(&format!("\n\nBREAKING CHANGE: {}", self.breaking));
        }
        message
    }
}

fn run_git(args: &[&str]) -> Result<String, Box<dyn std::error::Error>> {
    let output = Command::new("git").args(args).output()?;
    if !output.status.success() {
        eprintln!("git command failed: {}", String::from_utf8_lossy(&output.stderr));
        return Ok(String::new());
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn staged_changes() -> Result<HashMap<String, String>, Box<dyn std::error::Error>> {
    let files = run_git(&["diff", "--cached", "--name-only"])?;
    let mut changes = HashMap::new();
    for file in files.lines().filter(|f| !f.is_empty()) {
        changes.insert(file.to_string(), run_git(&["diff", "--cached", file])?);
    }
    Ok(changes)
}

fn analysis_prompt(changes: &HashMap<String, String>, summary: &str) -> String {
    let mut analysis = format!("Staged changes in {} file(s):\n\nSummary:\n{summary}\n\n", changes.len());
    analysis.push_str("Detailed changes:\n");
    for (file, diff) in changes.iter().take(10) {
        let diff_display = if diff.len() > 500 {
            format!("{}\n... (truncated)", &diff[..500])
        } else {
            diff.clone()
        };
        analysis.push_str(&format!("\n--- {file} ---\n{diff_display}\n"));
    }

    format!(
        "Analyze these git changes and write a professional commit message.\n\n{analysis}\n\n\
         Use conventional commit format (feat/fix/docs/style/refactor/perf/test/chore/ci/build), \
         keep the subject in the imperative mood, and call out any breaking changes explicitly."
    )
}

async fn generate_commit_message(
    agent: &Agent,
    changes: &HashMap<String, String>,
    summary: &str,
) -> Result<String, Box<dyn std::error::Error>> {
    let schema = json!({
        "type": "object",
        "properties": {
            "type": {"type": "string", "enum": ["feat", "fix", "docs", "style", "refactor", "perf", "test", "chore", "ci", "build"]},
            "scope": {"type": "string"},
            "subject": {"type": "string"},
            "body": {"type": "string"},
            "breaking": {"type": "string"},
        },
        "required": ["type", "subject"],
    });

    let result = agent
        .invoke(
            analysis_prompt(changes, summary),
            InvokeOptions {
                structured_output: Some(schema),
                ..Default::default()
            },
        )
        .await?;

    let value = result
        .structured_output
        .ok_or_else(|| open_agent::Error::other("model did not return structured output"))?;
    let data: CommitData = serde_json::from_value(value)?;
    Ok(data.format())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Git Commit Agent");
    println!("{}", "=".repeat(50));

    let changes = staged_changes()?;
    if changes.is_empty() {
        println!("No staged changes found! Run `git add` first.");
        return Ok(());
    }
    let summary = run_git(&["diff", "--cached", "--stat"])?;
    println!("Found staged changes in {} file(s)", changes.len());
    println!("{summary}");

    let config = OpenAiCompatConfig::builder()
        .base_url("http://localhost:11434/v1")
        .model("qwen3:8b")
        .temperature(0.3)
        .max_tokens(500)
        .build()?;
    let model = Arc::new(OpenAiCompatModel::new(config)?);
    let options = AgentOptions::builder()
        .system_prompt(
            "You are a git commit message expert. You write clear, professional commit \
             messages that follow conventional commit standards.",
        )
        .build()?;
    let agent = Agent::new(model, options)?;

    println!("\nAnalyzing changes and generating commit message...");
    let mut commit_message = generate_commit_message(&agent, &changes, &summary).await?;

    loop {
        println!("\nSuggested commit message:");
        println!("{}", "-".repeat(50));
        println!("{commit_message}");
        println!("{}", "-".repeat(50));
        println!("\n[a] Accept  [r] Regenerate  [c] Cancel");
        print!("\nYour choice: ");
        io::stdout().flush()?;

        let mut choice = String::new();
        io::stdin().read_line(&mut choice)?;

        match choice.trim().to_lowercase().as_str() {
            "a" => {
                let output = Command::new("git").args(["commit", "-m", &commit_message]).output()?;
                if output.status.success() {
                    println!("Committed!");
                } else {
                    eprintln!("Commit failed: {}", String::from_utf8_lossy(&output.stderr));
                }
                break;
            }
            "r" => {
                commit_message = generate_commit_message(&agent, &changes, &summary).await?;
            }
            "c" => {
                println!("Cancelled");
                break;
            }
            _ => println!("Invalid choice. Please select a, r, or c."),
        }
    }

    Ok(())
}
