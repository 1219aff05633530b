//! CLI module for the metal-stack Ansible plugins.
//!
//! This module provides the command-line interface shared by the resource
//! modules, the dynamic inventory and the lookup helper.

mod commands;
mod output;

pub use commands::{
    Cli, Commands, INVENTORY_PROGRAM, InventoryScript, ModuleCommand, OutputFormat,
    program_command,
};
pub use output::{OutputFormatter, failure_json};
