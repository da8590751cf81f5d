use std::sync::{Arc, OnceLock};

use clap::Parser;
use planloop_cli::commands::{cli, run, show};
use planloop_cli::error::CliError;
use planloop_cli::human::StdioHuman;
use planloop_core::config::{self, LoggingConfig};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            e.exit_code()
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> Result<i32, CliError> {
    let args = cli::Args::parse();
    let mut cfg = config::load_config(args.config.as_deref())
        .map_err(|e| CliError::Config(format!("{e:#}")))?;
    if let Some(dir) = args.plans_dir {
        cfg.storage.plans_dir = dir;
    }
    init_tracing(&cfg.logging).map_err(CliError::Config)?;

    match args.command {
        cli::Commands::Run(run_args) => {
            run::run_cmd(run_args, cfg, Arc::new(StdioHuman)).await?;
            Ok(0)
        }
        cli::Commands::Show(plan) => {
            print!("{}", show::show_cmd(&plan.plan_id, &cfg)?);
            Ok(0)
        }
        cli::Commands::Ready(plan) => {
            for id in show::ready_cmd(&plan.plan_id, &cfg)? {
                println!("{id}");
            }
            Ok(0)
        }
        cli::Commands::List => {
            for id in show::list_cmd(&cfg)? {
                println!("{id}");
            }
            Ok(0)
        }
    }
}

/// Install the subscriber: stderr and/or a file under `[logging].directory`.
/// `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }
    if !logging.console && !logging.file {
        return Err("logging disabled for both console and file".to_string());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(&logging.level).map_err(|e| e.to_string())?,
    };

    let file_layer = logging
        .file
        .then(|| log_file_writer(logging))
        .transpose()?
        .map(|writer| {
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
        });
    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();
    Ok(())
}

fn log_file_writer(logging: &LoggingConfig) -> Result<NonBlocking, String> {
    let dir = logging
        .log_dir()
        .ok_or_else(|| "file logging needs [logging].directory".to_string())?;
    std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir {dir:?} failed: {e}"))?;

    let appender = tracing_appender::rolling::never(dir, "planloop.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    Ok(writer)
}
