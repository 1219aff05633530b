//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Args, Parser, Subcommand};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::resources::ModuleKind;

/// metal-ansible - Idempotent metal-stack modules, inventory and lookup.
#[derive(Parser, Debug)]
#[command(name = "metal-ansible")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a `.env` file loaded before settings are resolved. Must exist
    /// when given; otherwise `./.env` is loaded if present.
    #[arg(long, global = true, env = "METAL_ANSIBLE_ENV_FILE")]
    pub env_file: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Write logs to stderr as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Output format (json, text).
    #[arg(long, global = true, default_value = "json")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Program name under which the binary acts as an Ansible inventory script.
pub const INVENTORY_PROGRAM: &str = "metal_inventory";

/// Arguments of the inventory script, as passed by Ansible.
#[derive(Parser, Debug)]
#[command(name = INVENTORY_PROGRAM)]
pub struct InventoryScript {
    /// List groups and hosts (the default).
    #[arg(long, conflicts_with = "host")]
    pub list: bool,

    /// Print variables of a single host.
    #[arg(long)]
    pub host: Option<String>,

    /// Path to the inventory configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl From<InventoryScript> for Commands {
    fn from(script: InventoryScript) -> Self {
        Self::Inventory {
            list: script.list,
            host: script.host,
            config: script.config,
        }
    }
}

/// Resolves the command from the name the binary was invoked under.
///
/// `metal_inventory` parses the inventory script flags, a module name such as
/// `metal_ip` takes the arguments file from the first argument. Returns `None`
/// for any other name, leaving the arguments to [`Cli`].
pub fn program_command<I, T>(args: I) -> Option<Result<Commands, clap::Error>>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let name = Path::new(args.first()?).file_stem()?.to_str()?;

    if name == INVENTORY_PROGRAM {
        return Some(InventoryScript::try_parse_from(args.iter()).map(Commands::from));
    }

    let kind = ModuleKind::from_program_name(name)?;
    let args_file = args.get(1).map(PathBuf::from).unwrap_or_default();
    Some(Ok(Commands::for_module(kind, ModuleCommand { args_file })))
}

/// Arguments shared by every resource module.
#[derive(Args, Debug, Clone)]
pub struct ModuleCommand {
    /// File holding the module parameters as JSON or YAML.
    pub args_file: PathBuf,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile a child network.
    Network(ModuleCommand),

    /// Reconcile an IP address.
    Ip(ModuleCommand),

    /// Reconcile a machine allocation.
    Machine(ModuleCommand),

    /// Reconcile a firewall allocation.
    Firewall(ModuleCommand),

    /// Reconcile a project through the v1 API.
    Project(ModuleCommand),

    /// Reconcile a tenant through the v2 API.
    Tenant(ModuleCommand),

    /// Reconcile a project through the v2 API.
    ProjectV2(ModuleCommand),

    /// Reconcile an API token through the v2 API.
    ApiToken(ModuleCommand),

    /// Print the dynamic inventory.
    Inventory {
        /// List groups and hosts (the default).
        #[arg(long, conflicts_with = "host")]
        list: bool,

        /// Print variables of a single host.
        #[arg(long)]
        host: Option<String>,

        /// Path to the inventory configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Look up metal-api entities.
    Lookup {
        /// Request type (get, search).
        request: String,

        /// Entity type (image, ip, firewall, machine, network, partition, project, size, switch).
        entity: String,

        /// Query term as key=value, repeatable.
        #[arg(short, long = "query")]
        query: Vec<String>,
    },
}

impl Commands {
    /// The subcommand running the given resource module.
    #[must_use]
    pub fn for_module(kind: ModuleKind, cmd: ModuleCommand) -> Self {
        match kind {
            ModuleKind::Network => Self::Network(cmd),
            ModuleKind::Ip => Self::Ip(cmd),
            ModuleKind::Machine => Self::Machine(cmd),
            ModuleKind::Firewall => Self::Firewall(cmd),
            ModuleKind::Project => Self::Project(cmd),
            ModuleKind::Tenant => Self::Tenant(cmd),
            ModuleKind::ProjectV2 => Self::ProjectV2(cmd),
            ModuleKind::ApiToken => Self::ApiToken(cmd),
        }
    }

    /// The resource module and its arguments file, if this is a module command.
    #[must_use]
    pub fn module(&self) -> Option<(ModuleKind, &Path)> {
        let (kind, cmd) = match self {
            Self::Network(cmd) => (ModuleKind::Network, cmd),
            Self::Ip(cmd) => (ModuleKind::Ip, cmd),
            Self::Machine(cmd) => (ModuleKind::Machine, cmd),
            Self::Firewall(cmd) => (ModuleKind::Firewall, cmd),
            Self::Project(cmd) => (ModuleKind::Project, cmd),
            Self::Tenant(cmd) => (ModuleKind::Tenant, cmd),
            Self::ProjectV2(cmd) => (ModuleKind::ProjectV2, cmd),
            Self::ApiToken(cmd) => (ModuleKind::ApiToken, cmd),
            Self::Inventory { .. } | Self::Lookup { .. } => return None,
        };
        Some((kind, cmd.args_file.as_path()))
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON as expected by Ansible.
    #[default]
    Json,
    /// Human-readable text output.
    Text,
}
