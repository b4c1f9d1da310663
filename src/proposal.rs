//! Division proposals: message synthesis, assembly and validation.

pub mod builder;
pub mod message;
pub mod validate;

pub use builder::{
    CommitDivisionProposal, DivisionProposalBuilder, DivisionStrategy, ProposalOptions,
    ProposedCommit,
};
pub use message::{message_for_description, message_for_pattern, parse_prefix};
pub use validate::{proposal_from_value, validate_coverage, validate_proposal};
