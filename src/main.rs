//! MQTT Authorization CLI
//!
//! Lints rule configuration and evaluates single decisions against it.

use anyhow::{bail, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use sentinel_mqtt_authz::{
    AuthorizationEngine, AuthzConfig, EngineOptions, Operation, ResolverChain, RoleResolver,
    RoleSet, RuleCompiler,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// MQTT topic authorization for Sentinel
#[derive(Parser, Debug)]
#[command(name = "sentinel-mqtt-authz")]
#[command(author = "Sentinel Contributors")]
#[command(version)]
#[command(about = "Topic-based MQTT authorization engine", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Enable JSON log format
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate every rule in a configuration file
    Lint {
        /// Configuration file path (JSON)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Evaluate one authorization decision
    Check(CheckArgs),
}

#[derive(ClapArgs, Debug)]
struct CheckArgs {
    /// Configuration file path (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Identity to resolve through the configured identity sources
    #[arg(long, conflicts_with = "role")]
    identity: Option<String>,

    /// Role held by the caller (repeatable)
    #[arg(long)]
    role: Vec<String>,

    /// Topic to check
    #[arg(short, long)]
    topic: String,

    /// Operation: read (subscribe) or write (publish)
    #[arg(long, default_value = "read")]
    op: Operation,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }

    match args.command {
        Command::Lint { config } => lint(&config),
        Command::Check(check_args) => check(&check_args),
    }
}

fn lint(config_path: &Path) -> Result<ExitCode> {
    info!(path = %config_path.display(), "Linting configuration");

    let config = AuthzConfig::from_file(config_path)?;
    let rows = config.acl.load_rules()?;
    let errors = RuleCompiler::new().lint(&rows);

    for error in &errors {
        println!("{}", error);
    }

    if errors.is_empty() {
        println!("{} rules OK", rows.len());
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{} of {} rules invalid", errors.len(), rows.len());
        Ok(ExitCode::FAILURE)
    }
}

fn check(args: &CheckArgs) -> Result<ExitCode> {
    let config = AuthzConfig::from_file(&args.config)?;
    let rows = config.acl.load_rules()?;

    let options = EngineOptions {
        protect_system_topics: config.acl.protect_system_topics,
    };
    let engine = AuthorizationEngine::with_rules(&rows, options)?;

    let roles: RoleSet = match (&args.identity, args.role.is_empty()) {
        (Some(identity), _) => ResolverChain::new(&config.identities)?.resolve(identity)?,
        (None, false) => args.role.iter().cloned().collect(),
        (None, true) => bail!("either --identity or at least one --role is required"),
    };

    let eval = engine.authorize_traced(&roles, &args.topic, args.op);

    match eval.granted_by {
        Some((role, filter)) => println!(
            "allow (snapshot v{}, role '{}', filter '{}')",
            eval.snapshot_version, role, filter
        ),
        None => println!("deny (snapshot v{}, roles {:?})", eval.snapshot_version, roles),
    }

    Ok(if eval.decision.is_allowed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
