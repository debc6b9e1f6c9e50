use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use iosxr_apply::apply::{self, ApplyRequest};
use iosxr_apply::cli::{self, Args};
use iosxr_apply::config::Config;
use iosxr_apply::device::Target;
use iosxr_apply::error::{exit_code_for, exit_codes};
use iosxr_apply::ssh::SshConnector;
use iosxr_apply::template::{self, Variables};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // A .env file is optional; it only pre-fills IOSXR_* variables
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "iosxr_apply=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => exit_codes::OK,
                _ => exit_codes::FAILURE,
            };
            std::process::exit(code);
        }
    };
    let code = match run(args).await {
        Ok(()) => exit_codes::OK,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

async fn run(args: Args) -> Result<()> {
    let cfg = Config::load();

    // Everything template-related is settled before any credential prompt
    // or network traffic.
    let vars = Variables::collect(&args.vars, args.hostname.as_deref(), &args.host)?;
    println!("Using variables: {}", vars);
    let lines = template::load(&args.config, &vars).await?;
    tracing::info!("Rendered {} lines from {}", lines.len(), args.config.display());

    if args.dry_run {
        println!("Dry-run mode - the following commands would be sent:");
        for line in &lines {
            println!("{}", line);
        }
    }

    let (username, password) = if args.dry_run {
        (args.username.clone().unwrap_or_default(), String::new())
    } else {
        cli::resolve_credentials(&args)?
    };

    let request = ApplyRequest {
        target: Target {
            host: args.host.clone(),
            port: args.port,
            username,
            password,
            fast_cli: args.fast_cli,
            timeouts: cfg.timeouts(),
        },
        lines,
        dry_run: args.dry_run,
        backup: args.backup,
        output_dir: args
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(&cfg.output_dir)),
        timestamp: chrono::Utc::now().timestamp(),
    };

    let report = apply::run(SshConnector, request).await?;
    tracing::debug!("Device output:\n{}", report.output);

    if let Some(backup) = &report.backup_file {
        println!("Backup saved to {}", backup.display());
    }
    if args.dry_run {
        println!("Dry-run complete");
    } else {
        println!("Configuration applied successfully");
    }
    println!("Apply log saved to {}", report.log_file.display());
    Ok(())
}
