//! Coordinated splitting of commit ranges across several repositories.

pub mod analyzer;
pub mod generator;
pub mod graph;
pub mod registry;

pub use analyzer::{MultiRepoAnalysis, MultiRepoAnalyzer, MultiRepoReport, RepositoryAnalysis};
pub use generator::{
    generate_cross_repo_proposal, CommitGroup, CrossRepoCommit, CrossRepoProposal, RevisionRange,
};
pub use graph::{CrossRepoDependency, CrossRepoDiff, DependencyGraph, DependencyKind};
pub use registry::{Repository, RepositoryRegistry};
