use planloop_core::config::AppConfig;
use planloop_core::plan::Plan;
use planloop_core::store::{JsonPlanStore, PlanStore};

use crate::error::CliError;

fn open_store(cfg: &AppConfig) -> Result<JsonPlanStore, CliError> {
    Ok(JsonPlanStore::new(cfg.storage.plans_path())?)
}

pub fn show_cmd(plan_id: &str, cfg: &AppConfig) -> Result<String, CliError> {
    let plan = open_store(cfg)?.load(plan_id)?;
    Ok(plan.render_summary())
}

/// Ready task ids in the order the loop would pick them.
pub fn ready_order(plan: &Plan) -> Vec<String> {
    let mut ready = plan.get_ready_tasks();
    ready.sort_by(|a, b| b.priority.cmp(&a.priority));
    ready.into_iter().map(|t| t.task_id.clone()).collect()
}

pub fn ready_cmd(plan_id: &str, cfg: &AppConfig) -> Result<Vec<String>, CliError> {
    let plan = open_store(cfg)?.load(plan_id)?;
    Ok(ready_order(&plan))
}

pub fn list_cmd(cfg: &AppConfig) -> Result<Vec<String>, CliError> {
    Ok(open_store(cfg)?.list()?)
}
