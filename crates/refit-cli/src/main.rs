use clap::Parser;
use colored::*;
use std::process;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use refit_cli::{describe, Cli, CliError, Commands};
use refit_core::{
    CompositeNotifier, NoopNotifier, Notifier, RecoveryJournal, RecoveryProcessor,
    RegistryAuthResolver, UpdaterOptions, Worker,
};
use refit_docker::DockerRuntime;
use refit_runtime::ContainerRuntime;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let options = match cli.updater.load() {
        Ok(options) => options,
        Err(CliError::InvalidConfiguration(errors)) => {
            for error in errors {
                eprintln!("{} {}", "Error:".red(), error);
            }
            process::exit(1);
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e);
            process::exit(1);
        }
    };

    let command = cli.command.clone().unwrap_or(Commands::Run);
    if let Err(e) = execute_command(command, options).await {
        eprintln!("{} {:#}", "Error:".red(), e);
        process::exit(1);
    }
}

async fn execute_command(command: Commands, options: UpdaterOptions) -> anyhow::Result<()> {
    match command {
        Commands::Run => run_worker(options).await,
        Commands::Recover => {
            let runtime = connect_runtime(&options).await?;
            let journal = Arc::new(RecoveryJournal::open(&options.data_dir));
            let pending = journal.pending_entries().len();

            RecoveryProcessor::new(journal).recover(&runtime).await;

            println!(
                "{} {} interrupted recreation(s) resolved",
                "✓".green(),
                pending
            );
            Ok(())
        }
        Commands::Journal => {
            let journal = RecoveryJournal::open(&options.data_dir);
            println!("{}", serde_json::to_string_pretty(&journal.pending_entries())?);
            Ok(())
        }
        Commands::Check => {
            println!("{}", "Effective settings".cyan().bold());
            for (key, value) in describe(&options) {
                println!("  {:<20} {}", format!("{}:", key).bold(), value);
            }

            connect_runtime(&options).await?;
            println!("{} Docker endpoint reachable", "✓".green());
            Ok(())
        }
    }
}

async fn run_worker(options: UpdaterOptions) -> anyhow::Result<()> {
    let runtime: Arc<dyn ContainerRuntime> = Arc::new(connect_runtime(&options).await?);

    let notifier = CompositeNotifier::from_options(&options).map_err(CliError::from)?;
    let notifier: Arc<dyn Notifier> = if notifier.is_empty() {
        info!("No notifications configured");
        Arc::new(NoopNotifier)
    } else {
        info!("Session reports go to {} notifier(s)", notifier.len());
        Arc::new(notifier)
    };

    info!(
        "Watching {} with journal in {}",
        options.runtime.effective_host(),
        options.data_dir.display()
    );

    let worker = Worker::from_options(runtime, options, RegistryAuthResolver::from_env(), notifier)
        .map_err(CliError::from)?;

    let cancel = CancellationToken::new();
    let signal_task = tokio::spawn(shutdown_on_signal(cancel.clone()));

    let sessions = worker.run(&cancel).await;
    signal_task.abort();

    info!("Exiting after {} session(s)", sessions);
    Ok(())
}

async fn connect_runtime(options: &UpdaterOptions) -> Result<DockerRuntime, CliError> {
    let runtime = DockerRuntime::connect(&options.runtime)?;
    runtime
        .ping()
        .await
        .map_err(|e| CliError::Unreachable {
            host: options.runtime.effective_host(),
            message: e.to_string(),
        })?;
    Ok(runtime)
}

/// Cancel `cancel` on SIGTERM or Ctrl+C.
async fn shutdown_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                    _ = ctrl_c() => info!("Received SIGINT"),
                }
            }
            Err(e) => {
                warn!("Failed to register SIGTERM handler: {}", e);
                ctrl_c().await;
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c().await;
        info!("Received Ctrl+C");
    }

    info!("Shutdown requested");
    cancel.cancel();
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

fn setup_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    if quiet {
        return;
    }

    let level = if verbose { "debug" } else { "info" };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
