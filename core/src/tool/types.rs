use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::result::ContextItem;
use super::success::SuccessCheck;
use crate::error::ToolError;
use crate::strategy::StrategyExecutor;
use crate::task::Task;

/// Arguments passed to a tool, keyed by parameter name.
pub type ToolArgs = Map<String, Value>;

pub type ToolResult = Result<ToolReturn, ToolError>;

pub type SyncHandler = Arc<dyn Fn(&ToolArgs, &ToolContext) -> ToolResult + Send + Sync>;
pub type AsyncHandler =
    Arc<dyn Fn(ToolArgs, ToolContext) -> BoxFuture<'static, ToolResult> + Send + Sync>;

type Predicate = Arc<dyn Fn(&ToolContext) -> bool + Send + Sync>;

/// Semantic type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
    pub description: String,
}

impl ToolParameter {
    pub fn required(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: true,
            description: description.into(),
        }
    }

    pub fn optional(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: false,
            description: description.into(),
        }
    }
}

/// What a tool handler sees of the running agent.
#[derive(Clone)]
pub struct ToolContext {
    pub agent_id: String,
    pub plan_id: String,
    /// Snapshot of the task being worked on.
    pub task: Task,
    pub strategy: Arc<dyn StrategyExecutor>,
    /// Descriptions of the registered tools, for tools that prompt a model.
    pub tool_catalog: Arc<Vec<String>>,
}

impl ToolContext {
    pub fn new(
        agent_id: impl Into<String>,
        plan_id: impl Into<String>,
        task: Task,
        strategy: Arc<dyn StrategyExecutor>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            plan_id: plan_id.into(),
            task,
            strategy,
            tool_catalog: Arc::new(Vec::new()),
        }
    }

    pub fn with_tool_catalog(mut self, catalog: Vec<String>) -> Self {
        self.tool_catalog = Arc::new(catalog);
        self
    }
}

impl fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolContext")
            .field("agent_id", &self.agent_id)
            .field("plan_id", &self.plan_id)
            .field("task_id", &self.task.task_id)
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

/// Value returned by a handler, plus typed side effects for the loop.
#[derive(Debug, Clone, Default)]
pub struct ToolReturn {
    pub output: Value,
    pub context_item: Option<ContextItem>,
    pub planned_tasks: Vec<Task>,
}

impl ToolReturn {
    pub fn new(output: impl Into<Value>) -> Self {
        Self {
            output: output.into(),
            ..Self::default()
        }
    }

    pub fn with_context_item(mut self, item: ContextItem) -> Self {
        self.context_item = Some(item);
        self
    }

    pub fn with_planned_tasks(mut self, tasks: Vec<Task>) -> Self {
        self.planned_tasks = tasks;
        self
    }
}

/// Executable body of a tool, decided at registration time.
#[derive(Clone)]
pub enum Handler {
    Sync(SyncHandler),
    Async(AsyncHandler),
}

impl Handler {
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&ToolArgs, &ToolContext) -> ToolResult + Send + Sync + 'static,
    {
        Handler::Sync(Arc::new(f))
    }

    pub fn asynchronous<F, Fut>(f: F) -> Self
    where
        F: Fn(ToolArgs, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        Handler::Async(Arc::new(move |args, ctx| f(args, ctx).boxed()))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Handler::Async(_))
    }
}

/// A named, invocable capability with declared parameters.
#[derive(Clone)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
    pub aliases: Vec<String>,
    /// Hidden tools are callable but left out of the catalog.
    pub hide: bool,
    pub disabled_reason: Option<String>,
    handler: Handler,
    enabled: Option<Predicate>,
    success_check: Option<Arc<dyn SuccessCheck>>,
}

impl Tool {
    pub fn builder(name: impl Into<String>, description: impl Into<String>) -> ToolBuilder {
        ToolBuilder {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            aliases: Vec::new(),
            hide: false,
            disabled_reason: None,
            enabled: None,
            success_check: None,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    pub fn is_async(&self) -> bool {
        self.handler.is_async()
    }

    pub fn is_enabled(&self, ctx: &ToolContext) -> bool {
        self.enabled.as_ref().map(|p| p(ctx)).unwrap_or(true)
    }

    pub fn success_check(&self) -> Option<&Arc<dyn SuccessCheck>> {
        self.success_check.as_ref()
    }

    pub fn with_success_check(mut self, check: Arc<dyn SuccessCheck>) -> Self {
        self.success_check = Some(check);
        self
    }

    /// Check required parameters are present and provided ones have the
    /// declared type.
    pub fn validate_arguments(&self, args: &ToolArgs) -> Result<(), ToolError> {
        for param in &self.parameters {
            match args.get(&param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(ToolError::invalid_arguments(
                        &self.name,
                        format!("missing required parameter '{}'", param.name),
                    ));
                }
                None | Some(Value::Null) => {}
                Some(value) if !param.param_type.accepts(value) => {
                    return Err(ToolError::invalid_arguments(
                        &self.name,
                        format!(
                            "parameter '{}' must be of type {}",
                            param.name,
                            param.param_type.as_str()
                        ),
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Run the handler without validation.
    pub async fn call(&self, args: ToolArgs, ctx: ToolContext) -> ToolResult {
        match &self.handler {
            Handler::Sync(f) => f(&args, &ctx),
            Handler::Async(f) => f(args, ctx).await,
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| {
                if p.required {
                    format!("{}: {}", p.name, p.param_type.as_str())
                } else {
                    format!("{}: Optional[{}]", p.name, p.param_type.as_str())
                }
            })
            .collect();
        write!(
            f,
            "{}: {}. Params: ({})",
            self.name,
            self.description.trim_end_matches('.'),
            params.join(", ")
        )
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("parameters", &self.parameters)
            .field("async", &self.is_async())
            .finish()
    }
}

pub struct ToolBuilder {
    name: String,
    description: String,
    parameters: Vec<ToolParameter>,
    aliases: Vec<String>,
    hide: bool,
    disabled_reason: Option<String>,
    enabled: Option<Predicate>,
    success_check: Option<Arc<dyn SuccessCheck>>,
}

impl ToolBuilder {
    pub fn parameter(mut self, param: ToolParameter) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hide = true;
        self
    }

    pub fn enabled_when<F>(mut self, predicate: F, disabled_reason: impl Into<String>) -> Self
    where
        F: Fn(&ToolContext) -> bool + Send + Sync + 'static,
    {
        self.enabled = Some(Arc::new(predicate));
        self.disabled_reason = Some(disabled_reason.into());
        self
    }

    pub fn success_check(mut self, check: Arc<dyn SuccessCheck>) -> Self {
        self.success_check = Some(check);
        self
    }

    pub fn handler(self, handler: Handler) -> Tool {
        Tool {
            name: self.name,
            description: self.description,
            parameters: self.parameters,
            aliases: self.aliases,
            hide: self.hide,
            disabled_reason: self.disabled_reason,
            handler,
            enabled: self.enabled,
            success_check: self.success_check,
        }
    }
}
