use std::sync::Arc;

use planloop_core::config::AppConfig;
use planloop_core::engine::{Collaborators, LoopEvent, LoopSummary, PlannerLoop};
use planloop_core::human::HumanIo;
use planloop_core::plan::Plan;
use planloop_core::store::{JsonPlanStore, PlanStore};
use planloop_plugins::factory::{build_memory, build_registry, build_strategy};
use tokio::sync::broadcast;

use super::cli::RunArgs;
use crate::error::CliError;

pub async fn run_cmd(
    args: RunArgs,
    mut cfg: AppConfig,
    human: Arc<dyn HumanIo>,
) -> Result<LoopSummary, CliError> {
    if let Some(root) = args.workspace {
        cfg.workspace.root = root;
    }
    let store = Arc::new(JsonPlanStore::new(cfg.storage.plans_path())?);
    let plan_id = args
        .plan_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let plan = if store.exists(&plan_id) {
        tracing::info!(plan_id = %plan_id, "resuming stored plan");
        store.load(&plan_id)?
    } else {
        Plan::new(plan_id.clone())
    };

    let registry = Arc::new(build_registry(&cfg)?);
    let collab = Collaborators {
        strategy: build_strategy(args.script.as_deref())?,
        store: store.clone(),
        memory: build_memory(&cfg),
        human,
    };
    let mut loop_cfg = cfg.loop_config(args.goal);
    if let Some(max) = args.max_cycles {
        loop_cfg.max_cycles = max;
    }
    if loop_cfg.goal.is_none() && plan.is_empty() {
        return Err(CliError::Config(
            "an empty plan needs a goal (--goal or [agent].goal)".to_string(),
        ));
    }

    let mut planner = PlannerLoop::new(cfg.agent.name.clone(), plan, registry, collab, loop_cfg);
    tokio::spawn(log_events(planner.subscribe()));

    let handle = planner.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current cycle");
            let _ = handle.stop();
        }
    });

    planner.add_initial_tasks()?;
    let summary = planner.run().await?;
    println!(
        "plan {}: {} cycles, {} done, {} failed ({:?})",
        plan_id, summary.cycles, summary.done, summary.failed, summary.exit
    );
    Ok(summary)
}

async fn log_events(mut rx: broadcast::Receiver<LoopEvent>) {
    loop {
        match rx.recv().await {
            Ok(LoopEvent::TaskStateChanged { task_id, from, to }) => {
                tracing::debug!("Task {} {:?} -> {:?}", task_id, from, to);
            }
            Ok(LoopEvent::ToolDispatched {
                task_id,
                command,
                status,
            }) => {
                tracing::info!("Task {} ran {} ({})", task_id, command, status);
            }
            Ok(LoopEvent::LoopExited { cycles, exit }) => {
                tracing::info!("Loop exited after {} cycles ({:?})", cycles, exit);
                break;
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::debug!("event logger skipped {} events", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
