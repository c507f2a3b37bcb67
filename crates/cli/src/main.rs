mod config;
mod error;
mod principal;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use granted::Can;
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{Config, ConfigError, RuleConfig};
use error::{Error, Result};
use principal::Principal;

const RULES_FILE: &str = "granted.toml";

#[derive(Parser)]
#[command(name = "grantctl")]
#[command(about = "Evaluate permission rules from a rules file", long_about = None)]
#[command(version)]
struct Cli {
    /// Rules file
    #[arg(short, long, global = true, env = "GRANTED_RULES", default_value = RULES_FILE)]
    rules: PathBuf,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, env = "GRANTED_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a principal may perform an action on a target
    Check {
        /// Action name
        action: String,
        /// Target name from the rules file
        #[arg(short, long)]
        target: String,
        /// Principal name
        #[arg(long = "as", default_value = "anonymous")]
        name: String,
        /// Kinds the principal belongs to (repeatable)
        #[arg(short, long = "kind")]
        kinds: Vec<String>,
        /// Options passed to checks, as JSON
        #[arg(long)]
        options: Option<String>,
    },
    /// List the rules defined for each target
    Rules {
        /// Only show this target
        #[arg(short, long)]
        target: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.to_string().into());

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_rules(&cli.rules)?;

    match cli.command {
        Commands::Check {
            action,
            target,
            name,
            kinds,
            options,
        } => cmd_check(&config, &action, &target, Principal::new(name, kinds), options).await,
        Commands::Rules { target } => cmd_rules(&config, target.as_deref()),
    }
}

async fn cmd_check(
    config: &Config,
    action: &str,
    target: &str,
    principal: Principal,
    options: Option<String>,
) -> Result<()> {
    let options: Option<Value> = options.as_deref().map(serde_json::from_str).transpose()?;
    let resource = config.target(target)?;

    debug!(
        principal = %principal.name,
        kinds = ?principal.kinds,
        action,
        target = %resource.name,
        "checking"
    );
    let principal = principal.can(action, &resource, options.as_ref()).await?;
    info!(principal = %principal.name, action, target = %resource.name, "granted");

    println!("allowed");
    Ok(())
}

fn cmd_rules(config: &Config, only: Option<&str>) -> Result<()> {
    if let Some(name) = only.filter(|name| !config.targets.contains_key(*name)) {
        return Err(ConfigError::UnknownTarget(name.to_string()).into());
    }

    println!("{:<16}  {:<6}  {:<16}  {:<12}  VALUE", "TARGET", "RULE", "ACTION", "KIND");
    println!("{}", "-".repeat(64));

    for (name, target) in &config.targets {
        if only.is_some_and(|only| only != name.as_str()) {
            continue;
        }
        print_rules(name, "grant", &target.grant);
        print_rules(name, "deny", &target.deny);
    }

    Ok(())
}

fn print_rules(target: &str, polarity: &str, rules: &[RuleConfig]) {
    for rule in rules {
        let kind = rule.kind.as_deref().unwrap_or("*");
        for action in rule.actions.names() {
            println!(
                "{target:<16}  {polarity:<6}  {action:<16}  {kind:<12}  {}",
                rule.value
            );
        }
    }
}

fn load_rules(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(Error::RulesNotFound {
            path: path.to_path_buf(),
        });
    }

    let config = Config::load(path)?;
    info!(path = %path.display(), targets = config.targets.len(), "loaded rules");
    Ok(config)
}
