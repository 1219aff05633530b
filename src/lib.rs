// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// Tests unwrap freely
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

// ============================================================================
// Crate Documentation
// ============================================================================

//! # metal-ansible modules
//!
//! Idempotent automation for metal-stack bare-metal resources, shaped for
//! Ansible: resource modules, a dynamic inventory and a lookup helper.
//!
//! ## Overview
//!
//! Every resource module follows the same protocol:
//!
//! - Resolve the entity by id, or by a natural key unique within a scope
//! - Create it when missing, carrying the ownership tag
//!   `ci.metal-stack.io/manager=ansible`
//! - Update only the fields that differ, and only on entities it owns
//! - Delete it only if it owns it
//!
//! Re-running a module with the same parameters changes nothing.
//!
//! ## Architecture
//!
//! 1. **Parameters**: Read from the Ansible arguments file
//! 2. **Remote state**: Queried from metal-api (v1) or metal-apiserver (v2)
//! 3. **Reconciler**: Decides create, update, delete or no-op through a
//!    per-entity [`reconciler::Resource`] adapter
//!
//! ## Modules
//!
//! - [`config`]: Module arguments, API credentials, inventory configuration
//! - [`metal`]: metal-api v1 client with HMAC or token authentication
//! - [`apiv2`]: metal-apiserver v2 client (connect protocol)
//! - [`reconciler`]: Identity resolution, diffing, ownership and the decision table
//! - [`resources`]: One adapter per entity type
//! - [`inventory`]: Dynamic inventory of managed machines
//! - [`lookup`]: Read-only entity lookup
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! - name: ensure a child network exists
//!   metal_network:
//!     name: backend
//!     partition: fra-equ01
//!     project: 6f1b2e5c-0000-4000-8000-000000000001
//!     description: backend services
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod apiv2;
pub mod cli;
pub mod config;
pub mod error;
pub mod inventory;
pub mod lookup;
pub mod metal;
pub mod reconciler;
pub mod resources;

// ============================================================================
// Re-exports
// ============================================================================

pub use apiv2::ApiV2Client;
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ApiConfig, InventoryConfig, ModuleArgs};
pub use error::{MetalError, Result};
pub use inventory::Inventory;
pub use metal::MetalClient;
pub use reconciler::{Outcome, Reconciler, Resource, TargetState};
pub use resources::{ModuleKind, run_module};
