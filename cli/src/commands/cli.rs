use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "planloop", version, about = "Run plan-driven agents")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file to use instead of the default lookup.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Overrides `[storage].plans_dir`.
    #[arg(long, global = true)]
    pub plans_dir: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Resume this plan if it exists, otherwise create it.
    #[arg(long)]
    pub plan_id: Option<String>,

    #[arg(long)]
    pub goal: Option<String>,

    /// JSON file of recorded strategy responses.
    #[arg(long)]
    pub script: Option<PathBuf>,

    #[arg(long)]
    pub max_cycles: Option<u32>,

    /// Overrides `[workspace].root`.
    #[arg(long)]
    pub workspace: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PlanArgs {
    pub plan_id: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the planner loop.
    Run(RunArgs),
    /// Print a stored plan.
    Show(PlanArgs),
    /// Print the ids of ready tasks in run order.
    Ready(PlanArgs),
    /// List stored plans.
    List,
}
