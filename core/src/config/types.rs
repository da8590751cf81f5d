use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::LoopConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub planner: PlannerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub workspace: WorkspaceConfig,
}

impl AppConfig {
    /// Loop limits for one run of `goal` (falls back to `[agent].goal`).
    pub fn loop_config(&self, goal: Option<String>) -> LoopConfig {
        LoopConfig {
            goal: goal.or_else(|| self.agent.goal.clone()),
            max_cycles: self.planner.max_cycles,
            max_task_cycles: self.planner.max_task_cycles,
            max_task_retries: self.planner.max_task_retries,
            history_window: self.planner.history_window,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_name")]
    pub name: String,

    #[serde(default)]
    pub goal: Option<String>,
}

fn default_agent_name() -> String {
    "planloop-agent".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            goal: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_true")]
    pub console: bool,

    /// If true, also log to `planloop.log` under `directory`.
    #[serde(default)]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "planloop_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    #[serde(default)]
    pub directory: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    /// `directory` with `~` expanded; blank means unset.
    pub fn log_dir(&self) -> Option<PathBuf> {
        self.directory
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| PathBuf::from(shellexpand::tilde(d).into_owned()))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            console: true,
            file: false,
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default = "default_max_cycles")]
    pub max_cycles: u32,

    /// 0 disables the per-task limit.
    #[serde(default = "default_max_task_cycles")]
    pub max_task_cycles: u32,

    #[serde(default)]
    pub max_task_retries: u32,

    /// Timeout for async tools, 0 = none.
    #[serde(default)]
    pub tool_timeout_ms: u64,

    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Attach the summarizing success check to the built-in tools.
    #[serde(default)]
    pub summarize_outputs: bool,
}

fn default_max_cycles() -> u32 {
    50
}

fn default_max_task_cycles() -> u32 {
    5
}

fn default_history_window() -> usize {
    20
}

impl PlannerConfig {
    pub fn tool_timeout(&self) -> Option<Duration> {
        (self.tool_timeout_ms > 0).then(|| Duration::from_millis(self.tool_timeout_ms))
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_cycles: default_max_cycles(),
            max_task_cycles: default_max_task_cycles(),
            max_task_retries: 0,
            tool_timeout_ms: 0,
            history_window: default_history_window(),
            summarize_outputs: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory of `<plan_id>.json` files. `~` is expanded.
    #[serde(default = "default_plans_dir")]
    pub plans_dir: String,
}

fn default_plans_dir() -> String {
    "~/.planloop/plans".to_string()
}

impl StorageConfig {
    pub fn plans_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.plans_dir).into_owned())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            plans_dir: default_plans_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Optional JSONL file every stored text is appended to.
    #[serde(default)]
    pub log_path: Option<String>,
}

impl MemoryConfig {
    /// `log_path` with `~` expanded; blank means no log.
    pub fn log_file(&self) -> Option<PathBuf> {
        self.log_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Root the file tools are confined to.
    #[serde(default = "default_workspace_root")]
    pub root: String,
}

fn default_workspace_root() -> String {
    ".".to_string()
}

impl WorkspaceConfig {
    pub fn root_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.root).into_owned())
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
        }
    }
}
