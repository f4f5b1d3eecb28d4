//! The agent event loop (C7): the top-level orchestrator that drives a
//! [`crate::model::Model`] through however many turns an invocation needs,
//! routing every assistant `toolUse` message through [`crate::tool_loop`] and
//! every appended message through the [`crate::conversation::ConversationManager`]
//! and [`crate::session::SessionCollaborator`] seams.
//!
//! Grounded on the teacher's `client.rs` in full: `Client::send`/`receive`'s
//! send-then-drain-then-execute-tools-then-recurse shape is the direct
//! ancestor of `Agent::stream`'s cycle loop, generalized with hook dispatch,
//! interrupts, structured-output forcing, and a pluggable `Model` instead of
//! one hardcoded OpenAI-compatible HTTP call.

use crate::aggregator::{aggregate, AggregatorItem};
use crate::conversation::ConversationManager;
use crate::hooks::{AgentEvent, AgentEventKind, HookRegistry};
use crate::interrupt::{InterruptState, ResumeArgs};
use crate::model::{Model, ModelOptions, SystemPrompt, ToolChoice, ToolSpec};
use crate::session::{SessionCollaborator, SessionSnapshot};
use crate::tool_loop::{run_tool_loop, ToolLoopEvent, PARTIAL_RESULTS_CONTEXT_KEY};
use crate::tools::{Tool, ToolRegistry, STRUCTURED_OUTPUT_TOOL_NAME};
use crate::types::{
    AgentOptions, AgentState, ContentBlock, Message, MessageRole, StopReason, StreamEvent, Usage,
};
use crate::{Error, Result};
use futures::stream::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Discovers and lists tools owned outside the core (e.g. an MCP client).
/// Consulted once, the first time an `Agent` is invoked. No implementation
/// ships here; a caller who has nothing to contribute simply never registers
/// one via [`Agent::with_tool_source`].
#[async_trait::async_trait]
pub trait ToolSource: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<Tool>>;
}

/// How an invocation is seeded: a plain prompt, pre-built content blocks for
/// one user message, a batch of whole messages to append verbatim, or
/// responses resuming a prior interrupt.
#[derive(Debug, Clone)]
pub enum InvokeArgs {
    Text(String),
    Blocks(Vec<ContentBlock>),
    Messages(Vec<Message>),
    Resume(ResumeArgs),
}

impl From<&str> for InvokeArgs {
    fn from(s: &str) -> Self {
        InvokeArgs::Text(s.to_string())
    }
}

impl From<String> for InvokeArgs {
    fn from(s: String) -> Self {
        InvokeArgs::Text(s)
    }
}

impl From<Vec<ContentBlock>> for InvokeArgs {
    fn from(blocks: Vec<ContentBlock>) -> Self {
        InvokeArgs::Blocks(blocks)
    }
}

impl From<Vec<Message>> for InvokeArgs {
    fn from(messages: Vec<Message>) -> Self {
        InvokeArgs::Messages(messages)
    }
}

impl From<ResumeArgs> for InvokeArgs {
    fn from(args: ResumeArgs) -> Self {
        InvokeArgs::Resume(args)
    }
}

/// Per-call options layered on top of an `Agent`'s fixed [`AgentOptions`].
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    /// JSON Schema the final answer must be coerced into. When set, the
    /// invocation forces a call to the reserved structured-output tool once
    /// the model would otherwise have ended the turn with plain text.
    pub structured_output: Option<Value>,

    /// Prompt appended when forcing the structured-output tool call. Falls
    /// back to a generic instruction if not supplied.
    pub structured_output_prompt: Option<String>,

    /// Opaque bag merged into the agent's state for the duration of this
    /// invocation (and beyond, since `agent_state` persists across calls).
    pub invocation_state: Value,
}

/// Why an invocation stopped. Unlike [`StopReason`], this also covers
/// outcomes the model itself never reports: an interrupt or exhausting
/// `max_turns`. `ToolUse` never appears here — it always routes into another
/// cycle rather than becoming terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ContentFiltered,
    GuardrailIntervened,
    Interrupt,
    MaxTurns,
}

impl From<StopReason> for AgentStopReason {
    fn from(reason: StopReason) -> Self {
        match reason {
            StopReason::EndTurn => AgentStopReason::EndTurn,
            StopReason::MaxTokens => AgentStopReason::MaxTokens,
            StopReason::StopSequence => AgentStopReason::StopSequence,
            StopReason::ContentFiltered => AgentStopReason::ContentFiltered,
            StopReason::GuardrailIntervened => AgentStopReason::GuardrailIntervened,
            StopReason::ToolUse => {
                unreachable!("ToolUse always routes into the tool sub-loop, never becomes terminal")
            }
        }
    }
}

/// Token/latency accounting accumulated across every model call an
/// invocation made.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvocationMetrics {
    pub usage: Usage,
    pub latency_ms: u64,
}

/// The outcome of one `Agent::invoke`/`Agent::stream` call.
#[derive(Debug, Clone)]
pub struct AgentResult {
    pub stop_reason: AgentStopReason,
    pub last_message: Option<Message>,
    pub metrics: InvocationMetrics,
    /// Non-empty only when `stop_reason == AgentStopReason::Interrupt`.
    pub interrupts: Vec<crate::types::Interrupt>,
    /// Populated only when `InvokeOptions::structured_output` was set and
    /// the forcing cycle succeeded.
    pub structured_output: Option<Value>,
}

/// One event surfaced while an invocation runs: a raw model event, a
/// synthesized complete content block, a lifecycle hook firing, or a tool's
/// own progress update.
#[derive(Debug, Clone)]
pub enum AgentStreamEvent {
    Model(StreamEvent),
    Block(ContentBlock),
    Hook(AgentEventKind),
    ToolProgress { tool_use_id: String, value: Value },
}

type EventSender = mpsc::UnboundedSender<Result<AgentStreamEvent>>;

struct AgentMutableState {
    messages: Vec<Message>,
    agent_state: AgentState,
    initialized: bool,
}

/// Everything an invocation needs, bundled so `Agent::stream` can clone it
/// cheaply into the task it spawns.
struct AgentInner {
    options: AgentOptions,
    model: Arc<dyn Model>,
    tool_registry: Mutex<ToolRegistry>,
    tool_sources: Vec<Arc<dyn ToolSource>>,
    hooks: Arc<HookRegistry>,
    interrupts: Arc<Mutex<InterruptState>>,
    state: Mutex<AgentMutableState>,
    conversation: Mutex<Box<dyn ConversationManager>>,
    session: Mutex<Option<Box<dyn SessionCollaborator>>>,
}

/// Top-level orchestrator. Owns its own history, interrupt bookkeeping, and
/// conversation/session collaborators; safe to hold behind an `Arc` and
/// share across tasks, but only one invocation may be in flight at a time —
/// a second `stream`/`invoke` call while one is running fails immediately
/// with `Error::ConcurrentInvocation` rather than queuing.
pub struct Agent {
    inner: Arc<AgentInner>,
    lock: Arc<Mutex<()>>,
}

impl Agent {
    /// Builds an `Agent` from a model adapter and its core configuration.
    /// Seeds the tool registry from `options.tools()`; duplicate names fail
    /// here with `Error::Configuration`.
    pub fn new(model: Arc<dyn Model>, options: AgentOptions) -> Result<Self> {
        let mut registry = ToolRegistry::new();
        for tool in options.tools() {
            registry.add_arc(tool.clone())?;
        }
        let hooks = Arc::new(options.hooks().clone());

        Ok(Self {
            inner: Arc::new(AgentInner {
                options,
                model,
                tool_registry: Mutex::new(registry),
                tool_sources: Vec::new(),
                hooks,
                interrupts: Arc::new(Mutex::new(InterruptState::new())),
                state: Mutex::new(AgentMutableState {
                    messages: Vec::new(),
                    agent_state: Value::Null,
                    initialized: false,
                }),
                conversation: Mutex::new(Box::new(
                    crate::conversation::WindowedConversationManager::default(),
                )),
                session: Mutex::new(None),
            }),
            lock: Arc::new(Mutex::new(())),
        })
    }

    /// Replaces the default [`crate::conversation::WindowedConversationManager`].
    /// Only meaningful before the first invocation; the history it sees
    /// afterward is whatever the previous manager left behind.
    pub fn with_conversation_manager(self, manager: Box<dyn ConversationManager>) -> Self {
        if let Ok(mut guard) = self.inner.conversation.try_lock() {
            *guard = manager;
        }
        self
    }

    /// Registers a session collaborator to observe this agent's lifecycle.
    pub fn with_session_collaborator(self, collaborator: Box<dyn SessionCollaborator>) -> Self {
        if let Ok(mut guard) = self.inner.session.try_lock() {
            *guard = Some(collaborator);
        }
        self
    }

    /// Adds a tool source (e.g. an MCP client) consulted once at the first
    /// invocation. Can be called multiple times to register several.
    pub fn with_tool_source(mut self, source: Arc<dyn ToolSource>) -> Self {
        Arc::get_mut(&mut self.inner)
            .expect("with_tool_source must run before the Agent is shared")
            .tool_sources
            .push(source);
        self
    }

    /// A handle to this agent's opaque state bag. Tools and hooks that need
    /// access should capture this `Arc` directly when they're constructed —
    /// there is no implicit injection into hook/tool closures, matching how
    /// every other shared resource in this crate is threaded through: by the
    /// caller, explicitly.
    pub fn state_handle(&self) -> StateHandle {
        StateHandle {
            inner: self.inner.clone(),
        }
    }

    /// Restores history, agent state, conversation manager state, and
    /// interrupt bookkeeping from a prior [`SessionSnapshot`]. Must be called
    /// before the first invocation.
    pub async fn restore_from_session(&self, snapshot: SessionSnapshot) -> Result<()> {
        let mut conversation = self.inner.conversation.lock().await;
        let restored = conversation.restore_from_session(snapshot.conversation_manager_state);
        let messages = if restored.is_empty() {
            snapshot.messages
        } else {
            restored
        };

        let mut state = self.inner.state.lock().await;
        state.messages = messages;
        state.agent_state = snapshot.agent_state;

        let mut interrupts = self.inner.interrupts.lock().await;
        *interrupts = InterruptState::from_snapshot(snapshot.interrupt_state);

        Ok(())
    }

    /// Starts an invocation. Fails synchronously with
    /// `Error::ConcurrentInvocation` if another invocation on this `Agent` is
    /// still in flight. Dropping the returned [`AgentStream`] before it's
    /// fully drained aborts the background work and releases the lock.
    pub fn stream(&self, args: impl Into<InvokeArgs>, options: InvokeOptions) -> Result<AgentStream> {
        let guard = self
            .lock
            .clone()
            .try_lock_owned()
            .map_err(|_| Error::ConcurrentInvocation)?;

        let args = args.into();
        let inner = self.inner.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let _guard = guard;
            let result = run_invocation(inner, args, options, tx).await;
            let _ = outcome_tx.send(result);
        });

        Ok(AgentStream {
            rx: UnboundedReceiverStream::new(rx),
            outcome: outcome_rx,
            task,
        })
    }

    /// Convenience for callers that don't need the intermediate stream:
    /// drains it and returns the final [`AgentResult`].
    pub async fn invoke(&self, args: impl Into<InvokeArgs>, options: InvokeOptions) -> Result<AgentResult> {
        self.stream(args, options)?.result().await
    }
}

/// A handle to an `Agent`'s opaque state bag, for tools/hooks that need
/// read/write access to it outside the message stream.
#[derive(Clone)]
pub struct StateHandle {
    inner: Arc<AgentInner>,
}

impl StateHandle {
    pub async fn get(&self) -> Value {
        self.inner.state.lock().await.agent_state.clone()
    }

    pub async fn set(&self, value: Value) {
        self.inner.state.lock().await.agent_state = value;
    }
}

/// The stream of [`AgentStreamEvent`]s an invocation produces. Implements
/// [`Stream`] by draining the background task's channel; dropping it before
/// exhaustion aborts the task, which in turn drops the invocation lock guard
/// it's holding.
pub struct AgentStream {
    rx: UnboundedReceiverStream<Result<AgentStreamEvent>>,
    outcome: oneshot::Receiver<Result<AgentResult>>,
    task: JoinHandle<()>,
}

impl Stream for AgentStream {
    type Item = Result<AgentStreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx).poll_next(cx)
    }
}

impl AgentStream {
    /// Drains any remaining events, then returns the invocation's final
    /// result.
    pub async fn result(mut self) -> Result<AgentResult> {
        while self.next().await.transpose()?.is_some() {}
        (&mut self.outcome)
            .await
            .map_err(|_| Error::stream("agent task ended without producing a result"))?
    }
}

impl Drop for AgentStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn tx_send(tx: &EventSender, event: AgentStreamEvent) -> Result<()> {
    tx.send(Ok(event))
        .map_err(|_| Error::stream("agent event receiver dropped"))
}

async fn dispatch(hooks: &HookRegistry, kind: AgentEventKind, tx: &EventSender) -> Result<AgentEventKind> {
    let mut event = AgentEvent::new(kind);
    hooks.invoke(&mut event).await?;
    tx_send(tx, AgentStreamEvent::Hook(event.kind.clone()))?;
    Ok(event.kind)
}

fn merge_invocation_state(base: &Value, incoming: &Value) -> Value {
    if incoming.is_null() {
        return base.clone();
    }
    match (base.as_object(), incoming.as_object()) {
        (Some(base_obj), Some(incoming_obj)) => {
            let mut merged = base_obj.clone();
            for (k, v) in incoming_obj {
                merged.insert(k.clone(), v.clone());
            }
            Value::Object(merged)
        }
        _ => incoming.clone(),
    }
}

async fn append_and_notify(inner: &AgentInner, message: Message, tx: &EventSender) -> Result<()> {
    {
        let mut state = inner.state.lock().await;
        state.messages.push(message.clone());
        let mut conversation = inner.conversation.lock().await;
        conversation.on_message_added(&mut state.messages);
    }

    dispatch(
        &inner.hooks,
        AgentEventKind::MessageAdded {
            message: message.clone(),
        },
        tx,
    )
    .await?;

    let mut session = inner.session.lock().await;
    if let Some(collaborator) = session.as_mut() {
        collaborator.on_message_added(&message);
    }
    Ok(())
}

fn build_model_options(
    system_prompt: &str,
    registry: &ToolRegistry,
    tool_choice: Option<ToolChoice>,
) -> ModelOptions {
    let tool_specs: Vec<ToolSpec> = registry
        .values()
        .map(|t| ToolSpec {
            name: t.name().to_string(),
            description: t.description().to_string(),
            input_schema: t.input_schema().clone(),
        })
        .collect();

    ModelOptions {
        system_prompt: if system_prompt.is_empty() {
            None
        } else {
            Some(SystemPrompt::text(system_prompt))
        },
        tool_specs,
        tool_choice,
    }
}

/// Drives one model call to completion: `BeforeModelCall`, stream +
/// aggregate, `AfterModelCall`, honoring the `retry` signal by looping back
/// instead of returning. Forwards every raw event and synthesized block to
/// `tx`, and folds usage/latency into `metrics`.
async fn run_model_cycle(
    hooks: &Arc<HookRegistry>,
    model: &Arc<dyn Model>,
    messages: &[Message],
    model_options: &ModelOptions,
    tx: &EventSender,
    metrics: &mut InvocationMetrics,
) -> Result<(Message, StopReason)> {
    loop {
        dispatch(hooks, AgentEventKind::BeforeModelCall { retry: false }, tx).await?;

        let raw_stream = model.stream(messages, model_options);
        let hooks_for_trace = hooks.clone();
        let traced_stream = raw_stream.then(move |item| {
            let hooks_for_trace = hooks_for_trace.clone();
            async move {
                if let Ok(event) = &item {
                    let mut trace_event = AgentEvent::new(AgentEventKind::ModelStreamEvent {
                        event: event.clone(),
                    });
                    let _ = hooks_for_trace.invoke(&mut trace_event).await;
                }
                item
            }
        });

        let (mut agg_stream, outcome_rx) = aggregate(traced_stream);
        while let Some(item) = agg_stream.next().await {
            match item? {
                AggregatorItem::Event(event) => {
                    if let StreamEvent::Metadata { usage, metrics: m, .. } = &event {
                        if let Some(usage) = usage {
                            metrics.usage += *usage;
                        }
                        if let Some(m) = m {
                            metrics.latency_ms += m.latency_ms;
                        }
                    }
                    tx_send(tx, AgentStreamEvent::Model(event))?;
                }
                AggregatorItem::Block(block) => {
                    tx_send(tx, AgentStreamEvent::Block(block))?;
                }
            }
        }

        let outcome = outcome_rx
            .await
            .map_err(|_| Error::stream("model stream aggregator dropped"))??;

        let after_kind = dispatch(
            hooks,
            AgentEventKind::AfterModelCall {
                message: outcome.message.clone(),
                stop_reason: outcome.stop_reason,
                retry: false,
            },
            tx,
        )
        .await?;

        let retry = matches!(after_kind, AgentEventKind::AfterModelCall { retry: true, .. });
        if retry {
            continue;
        }

        return Ok((outcome.message, outcome.stop_reason));
    }
}

async fn build_snapshot(inner: &AgentInner) -> SessionSnapshot {
    let state = inner.state.lock().await;
    let conversation_state = inner.conversation.lock().await.get_state();
    let interrupt_snapshot = inner.interrupts.lock().await.to_snapshot();
    SessionSnapshot::new(
        state.messages.clone(),
        state.agent_state.clone(),
        conversation_state,
        interrupt_snapshot,
    )
}

async fn run_invocation(
    inner: Arc<AgentInner>,
    args: InvokeArgs,
    options: InvokeOptions,
    tx: EventSender,
) -> Result<AgentResult> {
    let outcome = run_cycles(&inner, args, &options, &tx).await;

    let after_dispatch = dispatch(&inner.hooks, AgentEventKind::AfterInvocation, &tx);
    let _ = after_dispatch.await;

    let snapshot = build_snapshot(&inner).await;
    {
        let mut session = inner.session.lock().await;
        if let Some(collaborator) = session.as_mut() {
            collaborator.on_after_invocation(snapshot);
        }
    }

    outcome
}

async fn run_cycles(
    inner: &Arc<AgentInner>,
    args: InvokeArgs,
    options: &InvokeOptions,
    tx: &EventSender,
) -> Result<AgentResult> {
    // Step 2: one-time initialization.
    let already_initialized = inner.state.lock().await.initialized;
    if !already_initialized {
        log::debug!("agent initializing");
        for source in &inner.tool_sources {
            let discovered = source.list_tools().await?;
            if !discovered.is_empty() {
                let mut registry = inner.tool_registry.lock().await;
                registry.add_all(discovered)?;
            }
        }

        dispatch(&inner.hooks, AgentEventKind::AgentInitialized, tx).await?;

        {
            let mut session = inner.session.lock().await;
            if let Some(collaborator) = session.as_mut() {
                collaborator.on_agent_initialized();
            }
        }

        inner.state.lock().await.initialized = true;
    }

    // Step 3: normalize args against interrupt state.
    let mut resumed = false;
    if let InvokeArgs::Resume(resume_args) = &args {
        inner.interrupts.lock().await.resume(resume_args);
        resumed = true;
    }

    if !resumed {
        let is_active = inner.interrupts.lock().await.is_activated();
        if !is_active {
            match args {
                InvokeArgs::Text(text) => {
                    append_and_notify(inner, Message::user(text), tx).await?;
                }
                InvokeArgs::Blocks(blocks) => {
                    append_and_notify(inner, Message::user_with_blocks(blocks), tx).await?;
                }
                InvokeArgs::Messages(messages) => {
                    for message in messages {
                        append_and_notify(inner, message, tx).await?;
                    }
                }
                InvokeArgs::Resume(_) => unreachable!("handled above"),
            }
        }
    }

    if !options.invocation_state.is_null() {
        let mut state = inner.state.lock().await;
        state.agent_state = merge_invocation_state(&state.agent_state, &options.invocation_state);
    }

    // Step 4: register structured output on a per-invocation registry clone.
    // Never mutates the shared registry, so there's nothing to deregister on
    // any exit path, including panics.
    let structured_enabled = options.structured_output.is_some();
    let mut registry_snapshot = inner.tool_registry.lock().await.clone();
    if let Some(schema) = options.structured_output.clone() {
        registry_snapshot.register_structured_output(schema)?;
    }
    let registry_snapshot = Arc::new(registry_snapshot);

    dispatch(&inner.hooks, AgentEventKind::BeforeInvocation, tx).await?;

    let system_prompt = inner.options.system_prompt().to_string();
    let max_turns = inner.options.max_turns();
    let mut metrics = InvocationMetrics::default();
    let mut tool_choice_override: Option<ToolChoice> = None;
    let mut force_attempted = false;

    let mut cycle: u32 = 0;
    loop {
        cycle += 1;
        if cycle > max_turns {
            let last_message = inner.state.lock().await.messages.last().cloned();
            return Ok(AgentResult {
                stop_reason: AgentStopReason::MaxTurns,
                last_message,
                metrics,
                interrupts: Vec::new(),
                structured_output: None,
            });
        }

        let is_resuming = inner.interrupts.lock().await.is_activated();

        let (assistant_message, stop_reason) = if is_resuming {
            let stashed = inner
                .interrupts
                .lock()
                .await
                .context()
                .get("toolUseMessage")
                .cloned();
            let message: Message = match stashed {
                Some(value) => serde_json::from_value(value)
                    .map_err(|e| Error::protocol(format!("corrupt stashed toolUse message: {e}")))?,
                None => {
                    return Err(Error::protocol(
                        "interrupt is active but no stashed toolUse message was found",
                    ))
                }
            };
            (message, StopReason::ToolUse)
        } else {
            let messages_snapshot = inner.state.lock().await.messages.clone();
            let model_options =
                build_model_options(&system_prompt, &registry_snapshot, tool_choice_override.clone());
            run_model_cycle(
                &inner.hooks,
                &inner.model,
                &messages_snapshot,
                &model_options,
                tx,
                &mut metrics,
            )
            .await?
        };

        if stop_reason != StopReason::ToolUse {
            if structured_enabled && !force_attempted {
                force_attempted = true;
                let prompt = options.structured_output_prompt.clone().unwrap_or_else(|| {
                    "Call the required tool with your final answer matching the given schema."
                        .to_string()
                });
                append_and_notify(inner, Message::user(prompt), tx).await?;
                tool_choice_override = Some(ToolChoice::Specific(STRUCTURED_OUTPUT_TOOL_NAME.to_string()));
                continue;
            }

            if structured_enabled && force_attempted {
                return Err(Error::structured_output(
                    "model did not call the structured output tool after forcing",
                ));
            }

            append_and_notify(inner, assistant_message.clone(), tx).await?;
            return Ok(AgentResult {
                stop_reason: stop_reason.into(),
                last_message: Some(assistant_message),
                metrics,
                interrupts: Vec::new(),
                structured_output: None,
            });
        }

        // stop_reason == ToolUse: drive the sub-loop.
        let (mut tool_stream, tool_outcome_rx) = run_tool_loop(
            assistant_message.clone(),
            registry_snapshot.clone(),
            inner.interrupts.clone(),
            inner.hooks.clone(),
        );
        while let Some(event) = tool_stream.next().await {
            match event? {
                ToolLoopEvent::Hook(kind) => tx_send(tx, AgentStreamEvent::Hook(kind))?,
                ToolLoopEvent::ToolProgress { tool_use_id, value } => {
                    tx_send(tx, AgentStreamEvent::ToolProgress { tool_use_id, value })?
                }
            }
        }
        let outcome = tool_outcome_rx
            .await
            .map_err(|_| Error::stream("tool loop task dropped"))??;

        if !outcome.interrupts.is_empty() {
            let partial_results: Vec<_> = outcome
                .results
                .content
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::ToolResult(r) => Some(r.clone()),
                    _ => None,
                })
                .collect();

            let mut interrupts = inner.interrupts.lock().await;
            interrupts.context_mut().insert(
                "toolUseMessage".to_string(),
                serde_json::to_value(&assistant_message)?,
            );
            interrupts.context_mut().insert(
                PARTIAL_RESULTS_CONTEXT_KEY.to_string(),
                serde_json::to_value(&partial_results)?,
            );
            interrupts.activate();
            drop(interrupts);

            return Ok(AgentResult {
                stop_reason: AgentStopReason::Interrupt,
                last_message: Some(assistant_message),
                metrics,
                interrupts: outcome.interrupts,
                structured_output: None,
            });
        }

        {
            let mut interrupts = inner.interrupts.lock().await;
            interrupts.deactivate();
            interrupts.context_mut().remove("toolUseMessage");
            interrupts.context_mut().remove(PARTIAL_RESULTS_CONTEXT_KEY);
        }

        append_and_notify(inner, assistant_message.clone(), tx).await?;
        append_and_notify(inner, outcome.results.clone(), tx).await?;

        let structured_value = assistant_message.content.iter().find_map(|block| match block {
            ContentBlock::ToolUse(tool_use) if tool_use.name == STRUCTURED_OUTPUT_TOOL_NAME => {
                Some(tool_use.input.clone())
            }
            _ => None,
        });

        if let Some(value) = structured_value {
            return Ok(AgentResult {
                stop_reason: AgentStopReason::EndTurn,
                last_message: Some(outcome.results),
                metrics,
                interrupts: Vec::new(),
                structured_output: Some(value),
            });
        }

        tool_choice_override = None;
    }
}
