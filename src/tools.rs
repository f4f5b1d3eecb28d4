//! Tool definition, schema normalization, and the tool registry.
//!
//! A [`Tool`]'s handler is a stream rather than a single future: long-running
//! tools can emit [`ToolStreamEvent::Progress`] events before finishing with
//! `ToolStreamEvent::Result`, and [`crate::tool_loop`] forwards the progress
//! events straight through as agent stream events. Most tools don't need
//! that and are built with [`Tool::simple`]/[`ToolBuilder::build`], which
//! wraps an ordinary `Future<Output = Result<Value>>` into a one-item stream.

use crate::Error;
use crate::interrupt::InterruptState;
use crate::types::ToolResultBlock;
use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Reserved tool name used for forcing structured output. Never available
/// for a user-registered tool.
pub const STRUCTURED_OUTPUT_TOOL_NAME: &str = "__structured_output__";

/// One event a tool's handler stream can emit before terminating with its
/// `Result` variant.
#[derive(Debug, Clone)]
pub enum ToolStreamEvent {
    /// An intermediate progress update, forwarded to the agent's event
    /// stream unchanged.
    Progress(Value),
    /// The tool's final outcome. A handler stream MUST end with exactly one
    /// of these; `tool_loop` treats a stream that ends without one as a
    /// protocol error.
    Result(ToolResultBlock),
}

/// Per-call context handed to a tool's handler: its own `tool_use_id`, and
/// access to the agent's interrupt state so a tool can request human
/// approval mid-execution.
#[derive(Clone)]
pub struct ToolExecCtx {
    pub tool_use_id: String,
    interrupts: Arc<Mutex<InterruptState>>,
}

impl ToolExecCtx {
    pub fn new(tool_use_id: impl Into<String>, interrupts: Arc<Mutex<InterruptState>>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            interrupts,
        }
    }

    /// Raises (or resolves, if previously answered) an interrupt anchored to
    /// this tool call. See [`InterruptState::interrupt`].
    pub async fn interrupt(&self, name: &str, reason: impl Into<String>) -> crate::Result<Value> {
        let mut state = self.interrupts.lock().await;
        state.interrupt(&self.tool_use_id, name, reason)
    }
}

/// Streaming handler type backing a [`Tool`].
pub type ToolHandler = Arc<
    dyn Fn(Value, ToolExecCtx) -> Pin<Box<dyn Stream<Item = crate::Result<ToolStreamEvent>> + Send>>
        + Send
        + Sync,
>;

/// A callable a model can invoke: identity, input schema, and a streaming
/// handler. Immutable once built; cheap to clone (handler is an `Arc`).
#[derive(Clone)]
pub struct Tool {
    name: String,
    description: String,
    input_schema: Value,
    handler: ToolHandler,
}

impl Tool {
    /// Full constructor for a tool whose handler streams progress events.
    ///
    /// ```rust,no_run
    /// use open_agent::{Tool, ToolStreamEvent};
    /// use futures::stream;
    /// use serde_json::json;
    ///
    /// let long_running = Tool::new(
    ///     "process_batch",
    ///     "Process a batch of records",
    ///     json!({"count": "integer"}),
    ///     |args, ctx| {
    ///         Box::pin(stream::once(async move {
    ///             Ok(ToolStreamEvent::Result(open_agent::ToolResultBlock::success(
    ///                 ctx.tool_use_id,
    ///                 json!({"processed": args["count"]}),
    ///             )))
    ///         }))
    ///     },
    /// );
    /// ```
    pub fn new<F, S>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Value, ToolExecCtx) -> S + Send + Sync + 'static,
        S: Stream<Item = crate::Result<ToolStreamEvent>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: convert_schema_to_openai(input_schema),
            handler: Arc::new(move |args, ctx| Box::pin(handler(args, ctx))),
        }
    }

    /// Constructor for the common case: a handler that resolves once with a
    /// plain JSON result, no progress events and no interrupts.
    ///
    /// ```rust,no_run
    /// use open_agent::Tool;
    /// use serde_json::json;
    ///
    /// let add = Tool::simple(
    ///     "add",
    ///     "Add two numbers",
    ///     json!({"a": "number", "b": "number"}),
    ///     |args| async move {
    ///         let a = args["a"].as_f64().unwrap_or(0.0);
    ///         let b = args["b"].as_f64().unwrap_or(0.0);
    ///         Ok(json!({"result": a + b}))
    ///     },
    /// );
    /// ```
    pub fn simple<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = crate::Result<Value>> + Send + 'static,
    {
        Self::new(name, description, input_schema, move |args, ctx| {
            let fut = handler(args);
            stream::once(async move {
                match fut.await {
                    Ok(value) => Ok(ToolStreamEvent::Result(ToolResultBlock::success(
                        ctx.tool_use_id,
                        value,
                    ))),
                    Err(err) => Ok(ToolStreamEvent::Result(ToolResultBlock::error(
                        ctx.tool_use_id,
                        err.to_string(),
                    ))),
                }
            })
        })
    }

    /// Runs the tool, returning its event stream.
    pub fn execute_stream(
        &self,
        input: Value,
        ctx: ToolExecCtx,
    ) -> Pin<Box<dyn Stream<Item = crate::Result<ToolStreamEvent>> + Send>> {
        (self.handler)(input, ctx)
    }

    /// Convenience for callers that don't care about progress events: drains
    /// the stream and returns the terminal result. Fails with
    /// `Error::protocol` if the stream ends without one.
    pub async fn execute(&self, input: Value, ctx: ToolExecCtx) -> crate::Result<ToolResultBlock> {
        let mut stream = self.execute_stream(input, ctx);
        while let Some(event) = stream.next().await {
            if let ToolStreamEvent::Result(result) = event? {
                return Ok(result);
            }
        }
        Err(Error::protocol("tool stream ended without a Result event"))
    }

    pub fn to_openai_format(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.input_schema
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn input_schema(&self) -> &Value {
        &self.input_schema
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish()
    }
}

/// Normalizes a tool's declared schema into full JSON Schema.
///
/// Accepts three input shapes: a full JSON Schema (passed through
/// unchanged), simple type notation (`{"x": "number"}`, all required), or an
/// extended per-property schema (`{"x": {"type": "number", "optional":
/// true}}`). `"optional"`/`"required"` keys are stripped from the output;
/// properties with a `"default"` are treated as optional unless overridden.
fn convert_schema_to_openai(schema: Value) -> Value {
    if schema.is_object() {
        let obj = schema
            .as_object()
            .expect("BUG: is_object() returned true but as_object() returned None");
        if obj.contains_key("type") && obj.contains_key("properties") {
            return schema;
        }

        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for (param_name, param_type) in obj {
            if let Some(type_str) = param_type.as_str() {
                properties.insert(param_name.clone(), type_to_json_schema(type_str));
                required.push(param_name.clone());
            } else if param_type.is_object() {
                let mut prop = param_type.clone();
                let prop_obj = prop
                    .as_object_mut()
                    .expect("BUG: is_object() returned true but as_object_mut() returned None");

                let is_optional = prop_obj
                    .remove("optional")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                let is_required = prop_obj.remove("required").and_then(|v| v.as_bool());
                let has_default = prop_obj.contains_key("default");

                properties.insert(param_name.clone(), prop);

                if let Some(true) = is_required {
                    required.push(param_name.clone());
                } else if is_optional || is_required == Some(false) {
                    // explicitly optional
                } else if !has_default {
                    required.push(param_name.clone());
                }
            }
        }

        return serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required
        });
    }

    serde_json::json!({
        "type": "object",
        "properties": {},
        "required": []
    })
}

/// Maps a friendly type string (`"str"`, `"i64"`, `"vec"`, ...) to its JSON
/// Schema type object, defaulting unknown strings to `"string"`.
fn type_to_json_schema(type_str: &str) -> Value {
    let json_type = match type_str {
        "string" | "str" => "string",
        "integer" | "int" | "i32" | "i64" | "u32" | "u64" => "integer",
        "number" | "float" | "f32" | "f64" => "number",
        "boolean" | "bool" => "boolean",
        "array" | "list" | "vec" => "array",
        "object" | "dict" | "map" => "object",
        _ => "string",
    };

    serde_json::json!({ "type": json_type })
}

/// Fluent builder for simple (non-streaming) tools.
pub struct ToolBuilder {
    name: String,
    description: String,
    schema: Value,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema: serde_json::json!({}),
        }
    }

    /// Sets the complete input schema, replacing any parameters added via
    /// [`Self::param`].
    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }

    /// Adds one required parameter with a simple type string. Resets a
    /// non-object schema to `{}` first.
    pub fn param(mut self, name: &str, type_str: &str) -> Self {
        if !self.schema.is_object() {
            self.schema = serde_json::json!({});
        }

        let obj = self
            .schema
            .as_object_mut()
            .expect("BUG: schema should be an object after initialization");
        obj.insert(name.to_string(), Value::String(type_str.to_string()));

        self
    }

    /// Finishes the tool with a single-shot handler.
    pub fn build<F, Fut>(self, handler: F) -> Tool
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = crate::Result<Value>> + Send + 'static,
    {
        Tool::simple(self.name, self.description, self.schema, handler)
    }

    /// Finishes the tool with a full streaming handler.
    pub fn build_stream<F, S>(self, handler: F) -> Tool
    where
        F: Fn(Value, ToolExecCtx) -> S + Send + Sync + 'static,
        S: Stream<Item = crate::Result<ToolStreamEvent>> + Send + 'static,
    {
        Tool::new(self.name, self.description, self.schema, handler)
    }
}

/// Starts building a tool: `tool("search", "...").param("query", "string").build(...)`.
pub fn tool(name: impl Into<String>, description: impl Into<String>) -> ToolBuilder {
    ToolBuilder::new(name, description)
}

/// Insertion-ordered collection of tools, looked up by name.
///
/// Ordering is preserved because `toolSpecs` sent to the model must list
/// tools in a stable order (spec §4.10); a `HashMap` alone can't provide
/// that.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    order: Vec<String>,
    by_name: HashMap<String, Arc<Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `tool`. Fails with `Error::Configuration` if a tool with
    /// the same name is already registered.
    pub fn add(&mut self, tool: Tool) -> crate::Result<()> {
        self.add_arc(Arc::new(tool))
    }

    pub fn add_arc(&mut self, tool: Arc<Tool>) -> crate::Result<()> {
        if self.by_name.contains_key(tool.name()) {
            return Err(Error::configuration(format!(
                "a tool named '{}' is already registered",
                tool.name()
            )));
        }
        self.order.push(tool.name().to_string());
        self.by_name.insert(tool.name().to_string(), tool);
        Ok(())
    }

    pub fn add_all(&mut self, tools: impl IntoIterator<Item = Tool>) -> crate::Result<()> {
        for tool in tools {
            self.add(tool)?;
        }
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&Arc<Tool>> {
        self.by_name.get(name)
    }

    /// Tools in registration order.
    pub fn values(&self) -> impl Iterator<Item = &Arc<Tool>> {
        self.order.iter().filter_map(|name| self.by_name.get(name))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Registers the synthetic structured-output tool with `schema` as its
    /// input schema, so the model is steered toward the caller's actual
    /// target shape instead of an unconstrained object. Calling it just
    /// echoes its validated input back as the tool result, since the actual
    /// schema coercion happens in `agent.rs` once the call is observed.
    /// Fails if a user tool already claims the reserved name.
    pub fn register_structured_output(&mut self, schema: serde_json::Value) -> crate::Result<()> {
        if self.by_name.contains_key(STRUCTURED_OUTPUT_TOOL_NAME) {
            return Err(Error::configuration(
                "structured output tool is already registered",
            ));
        }
        let synthetic = Tool::simple(
            STRUCTURED_OUTPUT_TOOL_NAME,
            "Return the final structured result.",
            schema,
            |args| async move { Ok(args) },
        );
        self.add(synthetic)
    }

    /// Removes the synthetic structured-output tool, if present.
    pub fn deregister_structured_output(&mut self) -> Option<Arc<Tool>> {
        self.order.retain(|name| name != STRUCTURED_OUTPUT_TOOL_NAME);
        self.by_name.remove(STRUCTURED_OUTPUT_TOOL_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_ctx() -> ToolExecCtx {
        ToolExecCtx::new("call_1", Arc::new(Mutex::new(InterruptState::new())))
    }

    #[test]
    fn test_type_to_json_schema() {
        assert_eq!(type_to_json_schema("string"), json!({"type": "string"}));
        assert_eq!(type_to_json_schema("integer"), json!({"type": "integer"}));
        assert_eq!(type_to_json_schema("number"), json!({"type": "number"}));
        assert_eq!(type_to_json_schema("bool"), json!({"type": "boolean"}));
    }

    #[test]
    fn test_convert_simple_schema() {
        let schema = json!({"location": "string", "units": "string"});
        let result = convert_schema_to_openai(schema);

        assert_eq!(result["type"], "object");
        assert_eq!(result["properties"]["location"]["type"], "string");
        assert_eq!(result["required"], json!(["location", "units"]));
    }

    #[test]
    fn test_convert_full_schema_passthrough() {
        let schema = json!({
            "type": "object",
            "properties": {"name": {"type": "string"}},
            "required": ["name"]
        });
        let result = convert_schema_to_openai(schema.clone());
        assert_eq!(result, schema);
    }

    #[tokio::test]
    async fn test_simple_tool_execution() {
        let add = Tool::simple("add", "Add two numbers", json!({"a": "number", "b": "number"}), |args| async move {
            let a = args["a"].as_f64().unwrap_or(0.0);
            let b = args["b"].as_f64().unwrap_or(0.0);
            Ok(json!({"result": a + b}))
        });

        let result = add.execute(json!({"a": 5.0, "b": 3.0}), test_ctx()).await.unwrap();
        assert!(!result.is_error());
    }

    #[tokio::test]
    async fn test_simple_tool_error_becomes_error_result() {
        let failing = Tool::simple("fail", "Always fails", json!({}), |_args| async move {
            Err(Error::tool("boom"))
        });

        let result = failing.execute(json!({}), test_ctx()).await.unwrap();
        assert!(result.is_error());
    }

    #[tokio::test]
    async fn test_builder_produces_working_tool() {
        let my_tool = tool("test", "Test tool")
            .param("param1", "string")
            .build(|_| async { Ok(json!({})) });

        let format = my_tool.to_openai_format();
        assert_eq!(format["function"]["name"], "test");
        assert!(format["function"]["parameters"]["properties"]["param1"].is_object());
    }

    #[test]
    fn test_param_after_non_object_schema_resets() {
        let my_tool = tool("test", "Test tool")
            .schema(json!("string"))
            .param("key", "number")
            .build(|_| async { Ok(json!({})) });

        let format = my_tool.to_openai_format();
        assert!(format["function"]["parameters"]["properties"]["key"].is_object());
    }

    #[test]
    fn test_registry_preserves_insertion_order() {
        let mut registry = ToolRegistry::new();
        registry.add(tool("b", "").build(|_| async { Ok(json!({})) })).unwrap();
        registry.add(tool("a", "").build(|_| async { Ok(json!({})) })).unwrap();

        let names: Vec<&str> = registry.values().map(|t| t.name()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_registry_rejects_duplicate_names() {
        let mut registry = ToolRegistry::new();
        registry.add(tool("dup", "").build(|_| async { Ok(json!({})) })).unwrap();
        let err = registry
            .add(tool("dup", "").build(|_| async { Ok(json!({})) }))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_register_and_deregister_structured_output() {
        let mut registry = ToolRegistry::new();
        let schema = json!({"type": "object", "properties": {"answer": {"type": "string"}}});
        registry.register_structured_output(schema.clone()).unwrap();
        let tool = registry.find(STRUCTURED_OUTPUT_TOOL_NAME).unwrap();
        assert_eq!(tool.input_schema(), &schema);
        registry.deregister_structured_output();
        assert!(registry.find(STRUCTURED_OUTPUT_TOOL_NAME).is_none());
    }
}
