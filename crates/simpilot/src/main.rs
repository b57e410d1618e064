use clap::Parser;
use simpilot_common::SimError;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

mod actions;
mod cli;
mod config;
mod context;
mod device;
mod exec;
mod outcome;
mod output;
mod request;
mod session;
#[cfg(test)]
mod testing;

use cli::{Cli, Commands};
use context::{Context, Overrides};
use output::{spinner_done, Meta, Reporter};
use request::ActionRequest;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays parseable
    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::WARN
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let reporter = Reporter::new(cli.output_mode(), cli.quiet);
    if let Err(err) = run(cli, &reporter).await {
        reporter.failure(&err);
        std::process::exit(err.exit_code());
    }
}

async fn run(cli: Cli, reporter: &Reporter) -> Result<(), SimError> {
    let Cli {
        config: config_path,
        device,
        output_dir,
        timeout,
        command,
        ..
    } = cli;

    if let Commands::Config { command } = command {
        return cli::commands::config::run(command, &config_path, reporter.mode())
            .map_err(|e| SimError::Config(format!("{:#}", e)));
    }

    let config =
        config::load_config(&config_path).map_err(|e| SimError::Config(format!("{:#}", e)))?;
    let request = cli::commands::action::request(command)?;
    let meta = Meta::new(request.name());
    debug!("Running {}", request.name());

    let mut ctx = Context::from_config(
        &config,
        Overrides {
            device,
            env_device: cli::env_device(),
            output_dir,
            timeout_secs: timeout,
        },
    );

    let spinner = match &request {
        ActionRequest::DeviceOpen(_) => reporter.spinner("Booting simulator..."),
        ActionRequest::Record(_) => reporter.spinner("Starting recording..."),
        ActionRequest::View(_) => reporter.spinner("Capturing screen..."),
        _ => None,
    };
    let result = actions::execute(&mut ctx, request).await;
    if let Some(ref pb) = spinner {
        spinner_done(pb);
    }

    reporter.success(&result?, &meta);
    Ok(())
}
