pub mod scripted;

pub use scripted::ScriptedStrategyExecutor;
