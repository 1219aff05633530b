//! metal-ansible CLI entrypoint.
//!
//! Runs as a resource module, dynamic inventory or lookup. When the binary is
//! installed under a module name such as `metal_network`, it behaves like an
//! Ansible binary module and reads its arguments file from the first argument.
//! Installed as `metal_inventory`, it is an Ansible inventory script.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use metal_ansible_modules::cli::{Cli, Commands, OutputFormat, OutputFormatter, program_command};
use metal_ansible_modules::config::{ApiParams, InventoryConfig, ModuleArgs, load_dotenv};
use metal_ansible_modules::error::{ConfigError, MetalError, Result};
use metal_ansible_modules::inventory;
use metal_ansible_modules::lookup::{self, EntityKind, RequestKind};
use metal_ansible_modules::metal::MetalClient;
use metal_ansible_modules::resources::{ModuleKind, run_module};

use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let (command, options) = match program_command(std::env::args_os()) {
        Some(Ok(command)) => (command, Options::defaults()),
        Some(Err(e)) => e.exit(),
        None => {
            let cli = Cli::parse();
            let options = Options {
                env_file: cli.env_file,
                verbose: cli.verbose,
                log_json: cli.log_json,
                output: cli.output,
            };
            (cli.command, options)
        }
    };

    init_logging(options.verbose, options.log_json);
    let formatter = OutputFormatter::new(options.output);

    // Run async runtime
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = load_dotenv(options.env_file.as_deref())
        .and_then(|()| runtime.block_on(run(command, &formatter)));

    match result {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            println!("{}", formatter.format_failure(&e));
            ExitCode::FAILURE
        }
    }
}

/// Global options, from flags or defaults when invoked under a program name.
struct Options {
    env_file: Option<PathBuf>,
    verbose: bool,
    log_json: bool,
    output: OutputFormat,
}

impl Options {
    /// Options when invoked by Ansible under a program name.
    const fn defaults() -> Self {
        Self {
            env_file: None,
            verbose: false,
            log_json: false,
            output: OutputFormat::Json,
        }
    }
}

/// Initializes the logging system. Logs go to stderr; stdout carries results.
fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Main async entry point. Returns what to print on stdout.
async fn run(command: Commands, formatter: &OutputFormatter) -> Result<String> {
    match command {
        Commands::Inventory { host, config, .. } => cmd_inventory(host, config.as_deref()).await,
        Commands::Lookup {
            request,
            entity,
            query,
        } => cmd_lookup(&request, &entity, &query, formatter).await,
        module => {
            let (kind, args_file) = module
                .module()
                .ok_or_else(|| MetalError::Internal(String::from("not a module command")))?;
            cmd_module(kind, args_file, formatter).await
        }
    }
}

/// Runs a resource module.
async fn cmd_module(
    kind: ModuleKind,
    args_file: &Path,
    formatter: &OutputFormatter,
) -> Result<String> {
    if args_file.as_os_str().is_empty() {
        return Err(ConfigError::FileNotFound {
            path: args_file.to_path_buf(),
        }
        .into());
    }

    debug!("Running {kind} with arguments from {}", args_file.display());
    let args = ModuleArgs::load_file(args_file)?;
    let outcome = run_module(kind, &args).await?;
    Ok(formatter.format_outcome(&outcome))
}

/// Prints the dynamic inventory.
async fn cmd_inventory(host: Option<String>, config: Option<&Path>) -> Result<String> {
    if let Some(host) = host {
        return inventory::render_pretty(&inventory::host_vars(&host));
    }

    let config = InventoryConfig::load(config)?;
    let client = MetalClient::new(&config.api_config()?)?;
    inventory::fetch(&client, &config).await?.render()
}

/// Runs a lookup against the metal-api.
async fn cmd_lookup(
    request: &str,
    entity: &str,
    query: &[String],
    formatter: &OutputFormatter,
) -> Result<String> {
    let request: RequestKind = request.parse()?;
    let entity: EntityKind = entity.parse()?;
    let query = lookup::parse_query(query)?;

    let client = MetalClient::new(&ApiParams::default().resolve()?)?;
    let result = lookup::lookup(&client, request, entity, &query).await?;
    Ok(formatter.format_value(&result))
}
