use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use planloop_core::config::AppConfig;
use planloop_core::memory::MemoryStore;
use planloop_core::strategy::{StrategyExecutor, UnavailableStrategy};
use planloop_core::tool::{SuccessCheck, SummarizeOutput, Tool, ToolRegistry};

use crate::memory::LocalMemoryStore;
use crate::strategy::ScriptedStrategyExecutor;
use crate::tools::{
    human_feedback_tool, list_folder_tool, make_initial_plan_tool, read_file_tool,
    write_file_tool, Workspace,
};

/// Registry with every built-in tool, rooted at `[workspace].root`.
pub fn build_registry(cfg: &AppConfig) -> Result<ToolRegistry> {
    let workspace = Arc::new(Workspace::new(cfg.workspace.root_path()));
    let summarize: Option<Arc<dyn SuccessCheck>> = cfg
        .planner
        .summarize_outputs
        .then(|| Arc::new(SummarizeOutput) as Arc<dyn SuccessCheck>);

    let file_tools: Vec<Tool> = vec![
        read_file_tool(workspace.clone()),
        write_file_tool(workspace.clone()),
        list_folder_tool(workspace),
    ];

    let mut registry = ToolRegistry::new().with_timeout(cfg.planner.tool_timeout());
    for tool in file_tools {
        let tool = match &summarize {
            Some(check) => tool.with_success_check(Arc::clone(check)),
            None => tool,
        };
        registry.register(tool)?;
    }
    registry.register(make_initial_plan_tool())?;
    registry.register(human_feedback_tool())?;
    Ok(registry)
}

pub fn build_memory(cfg: &AppConfig) -> Option<Arc<dyn MemoryStore>> {
    if !cfg.memory.enabled {
        return None;
    }
    let store = match cfg.memory.log_file() {
        Some(path) => LocalMemoryStore::with_log(path),
        None => LocalMemoryStore::new(),
    };
    Some(Arc::new(store))
}

/// Scripted responses when a script is given; otherwise every model call
/// fails.
pub fn build_strategy(script: Option<&Path>) -> Result<Arc<dyn StrategyExecutor>> {
    match script {
        Some(path) => Ok(Arc::new(ScriptedStrategyExecutor::load(path)?)),
        None => Ok(Arc::new(UnavailableStrategy)),
    }
}
