//! # commit-divider
//!
//! Proposes how to split a commit range, or a coordinated set of commit
//! ranges across repositories, into smaller conventional commits.
//!
//! ## Quick Start
//!
//! ```rust
//! use commit_divider::config::EngineConfig;
//! use commit_divider::proposal::{DivisionProposalBuilder, ProposalOptions};
//!
//! let diff = "diff --git a/docs/guide.md b/docs/guide.md\n\
//!             --- a/docs/guide.md\n\
//!             +++ b/docs/guide.md\n\
//!             @@ -1 +1,2 @@\n # Guide\n+More words.\n";
//! let builder = DivisionProposalBuilder::new(&EngineConfig::default());
//! let proposal = builder.build_from_diff(diff, "a1", "b2", &ProposalOptions::default(), None);
//! assert_eq!(proposal.total_changes, 1);
//! assert!(proposal.proposed_commits[0].message.starts_with("docs:"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod analysis;
pub mod cli;
pub mod config;
pub mod data;
pub mod diff;
pub mod error;
pub mod execute;
pub mod git;
#[cfg(feature = "mcp")]
pub mod mcp;
pub mod multi_repo;
pub mod proposal;
pub mod tools;

pub use crate::cli::Cli;
pub use crate::error::{BackendError, DivisionError, Result};

/// The current version of commit-divider.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
