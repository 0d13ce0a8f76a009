use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use stagegate_artifact::canonical_hash;
use stagegate_guard::{ActionEffector, FsWorkspace, MemoryWorkspace};
use stagegate_kernel::telemetry::init_tracing;
use stagegate_kernel::{
    AuditLog, AuditSink, FanoutAuditSink, GovernanceConfig, GovernanceKernel, InMemoryStore, TracingAuditSink,
};
use std::path::PathBuf;
use std::sync::Arc;

mod demo;

fn cli() -> Command {
    Command::new("stagegate")
        .version(stagegate_kernel::VERSION)
        .about("Governance core for human-gated multi-stage pipelines")
        .arg_required_else_help(true)
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("Path to a TOML governance config"),
        )
        .subcommand(
            Command::new("demo")
                .about("Run an in-memory pipeline through every approval and a guarded build")
                .arg(
                    Arg::new("workspace")
                        .long("workspace")
                        .value_parser(clap::value_parser!(PathBuf))
                        .help("Write build output beneath this directory instead of memory"),
                ),
        )
        .subcommand(
            Command::new("hash")
                .about("Print the canonical hash of a JSON document")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .help("JSON file to hash"),
                )
                .arg(
                    Arg::new("exclude")
                        .long("exclude")
                        .value_delimiter(',')
                        .action(ArgAction::Append)
                        .help("Fields to strip before hashing (defaults to the configured list)"),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => GovernanceConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => GovernanceConfig::default(),
    };
    init_tracing(&config.log)?;

    match matches.subcommand() {
        Some(("demo", args)) => {
            let effector: Arc<dyn ActionEffector> = match args.get_one::<PathBuf>("workspace") {
                Some(root) => Arc::new(FsWorkspace::new(root)),
                None => Arc::new(MemoryWorkspace::new()),
            };
            let audit = Arc::new(AuditLog::new());
            let sink: Arc<dyn AuditSink> = Arc::new(
                FanoutAuditSink::new()
                    .with(audit.clone())
                    .with(Arc::new(TracingAuditSink)),
            );
            let kernel = GovernanceKernel::new(config, Arc::new(InMemoryStore::new()), sink);
            demo::run(&kernel, &audit, effector).await?;
        }
        Some(("hash", args)) => {
            let path = args
                .get_one::<PathBuf>("file")
                .context("missing file argument")?;
            let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            let value: serde_json::Value =
                serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
            let excluded: Vec<String> = match args.get_many::<String>("exclude") {
                Some(fields) => fields.cloned().collect(),
                None => config.excluded_fields.clone(),
            };
            println!("{}", canonical_hash(&value, excluded.as_slice())?);
        }
        Some((other, _)) => anyhow::bail!("unknown subcommand {other}"),
        None => anyhow::bail!("a subcommand is required"),
    }
    Ok(())
}
