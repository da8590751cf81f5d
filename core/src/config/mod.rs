mod load;
mod types;

pub use load::{
    apply_env_overrides, default_log_directory, get_planloop_data_dir, load_config, load_default,
    load_from_path,
};
pub use types::{
    AgentConfig, AppConfig, LoggingConfig, MemoryConfig, PlannerConfig, StorageConfig,
    WorkspaceConfig,
};
