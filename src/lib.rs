// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Jira issue summaries as Git branch aliases.
//!
//! Branch names like "feature_PROJ-42" are hard to tell apart at a glance.
//! Branch-alias extracts the issue key out of each branch name, looks up the
//! summary of that issue in Jira, and remembers the result as an __alias__,
//! e.g., "PROJ-42: Fix login". Aliases are cached per repository so that
//! listing branches never has to wait on the network.
//!
//! # Moving Parts
//!
//! - [`extract`] pulls issue keys out of branch names.
//! - [`store`] holds the alias cache and a bit of view state.
//! - [`sync`] keeps the alias cache in step with Git and Jira.
//! - [`view`] orders branches and aliases for presentation.
//! - [`manager`] ties everything together for user interfaces.

pub mod config;
pub mod event;
pub mod extract;
pub mod git;
pub mod jira;
pub mod manager;
pub mod notify;
pub mod path;
pub mod status;
pub mod store;
pub mod sync;
pub mod view;
pub mod watch;

pub use manager::BranchAliasManager;
pub use sync::{SyncEngine, SyncKind, SyncResult};
