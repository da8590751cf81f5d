pub mod cli;
pub mod run;
pub mod show;
