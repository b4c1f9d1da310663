//! Structural checks on proposals supplied by callers.

use std::collections::BTreeSet;

use serde_json::Value;

use super::builder::CommitDivisionProposal;
use super::message::parse_prefix;
use crate::error::{DivisionError, Result};

/// Deserializes a caller-supplied proposal, rejecting missing fields.
pub fn proposal_from_value(value: &Value) -> Result<CommitDivisionProposal> {
    if !value.is_object() {
        return Err(DivisionError::InvalidProposalFormat(
            "proposal must be an object".to_string(),
        ));
    }
    for field in ["originalCommitId", "targetCommitId", "proposedCommits"] {
        if value.get(field).is_none() {
            return Err(DivisionError::InvalidProposalFormat(format!(
                "missing required field '{field}'"
            )));
        }
    }
    serde_json::from_value(value.clone())
        .map_err(|e| DivisionError::InvalidProposalFormat(e.to_string()))
}

/// Checks a proposal's internal consistency.
///
/// Every commit needs a conventional message and a confidence in `[0, 1]`;
/// no path may appear in two commits; `totalChanges` must match the
/// distinct paths.
pub fn validate_proposal(proposal: &CommitDivisionProposal) -> Result<()> {
    let invalid = |msg: String| Err(DivisionError::InvalidProposalFormat(msg));

    if proposal.original_commit_id.trim().is_empty() {
        return invalid("originalCommitId is empty".to_string());
    }
    if proposal.proposed_commits.is_empty() {
        return invalid("proposal has no commits".to_string());
    }
    if !(0.0..=1.0).contains(&proposal.confidence_score) {
        return invalid(format!(
            "confidenceScore {} is outside [0, 1]",
            proposal.confidence_score
        ));
    }

    let mut seen = BTreeSet::new();
    for (index, commit) in proposal.proposed_commits.iter().enumerate() {
        if parse_prefix(&commit.message).is_none() {
            return invalid(format!(
                "commit {index} message '{}' has no conventional type prefix",
                commit.message
            ));
        }
        if !(0.0..=1.0).contains(&commit.confidence) {
            return invalid(format!(
                "commit {index} confidence {} is outside [0, 1]",
                commit.confidence
            ));
        }
        for change in &commit.changes {
            if change.path.is_empty() {
                return invalid(format!("commit {index} has a change without a path"));
            }
            if !seen.insert(change.path.as_str()) {
                return invalid(format!("path '{}' appears in more than one commit", change.path));
            }
        }
    }

    if seen.len() != proposal.total_changes {
        return invalid(format!(
            "totalChanges is {} but commits cover {} files",
            proposal.total_changes,
            seen.len()
        ));
    }
    Ok(())
}

/// Checks that a proposal covers exactly the given files.
pub fn validate_coverage(proposal: &CommitDivisionProposal, files: &BTreeSet<String>) -> Result<()> {
    let covered = proposal.paths();
    let expected: BTreeSet<&str> = files.iter().map(String::as_str).collect();

    if let Some(missing) = expected.difference(&covered).next() {
        return Err(DivisionError::InvalidProposalFormat(format!(
            "file '{missing}' is not covered by any commit"
        )));
    }
    if let Some(extra) = covered.difference(&expected).next() {
        return Err(DivisionError::InvalidProposalFormat(format!(
            "file '{extra}' is not part of the changes"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::proposal::{DivisionProposalBuilder, ProposalOptions};
    use serde_json::json;

    fn built() -> CommitDivisionProposal {
        let diff = "diff --git a/src/a.rs b/src/a.rs\n--- a/src/a.rs\n+++ b/src/a.rs\n@@ -1 +1,2 @@\n x\n+// fix\n\
                    diff --git a/README.md b/README.md\n--- a/README.md\n+++ b/README.md\n@@ -1 +1,2 @@\n x\n+y\n";
        DivisionProposalBuilder::new(&EngineConfig::default()).build_from_diff(
            diff,
            "abc",
            "def",
            &ProposalOptions::default(),
            None,
        )
    }

    #[test]
    fn built_proposals_validate() {
        let p = built();
        validate_proposal(&p).unwrap();
        let files = BTreeSet::from(["src/a.rs".to_string(), "README.md".to_string()]);
        validate_coverage(&p, &files).unwrap();
    }

    #[test]
    fn json_round_trip_validates() {
        let value = serde_json::to_value(built()).unwrap();
        let parsed = proposal_from_value(&value).unwrap();
        validate_proposal(&parsed).unwrap();
    }

    #[test]
    fn missing_fields_are_rejected() {
        let err = proposal_from_value(&json!({"originalCommitId": "a"})).unwrap_err();
        assert!(matches!(err, DivisionError::InvalidProposalFormat(_)));
        assert!(err.to_string().contains("targetCommitId"));

        let err = proposal_from_value(&json!({
            "originalCommitId": "a",
            "targetCommitId": "b",
            "proposedCommits": [{"message": "fix: x"}],
            "totalChanges": 0,
            "confidenceScore": 0.5
        }))
        .unwrap_err();
        assert!(matches!(err, DivisionError::InvalidProposalFormat(_)));

        assert!(proposal_from_value(&json!([1, 2])).is_err());
    }

    #[test]
    fn duplicate_paths_are_rejected() {
        let mut p = built();
        let dup = p.proposed_commits[0].changes[0].clone();
        p.proposed_commits[1].changes.push(dup);
        p.total_changes += 1;
        let err = validate_proposal(&p).unwrap_err();
        assert!(err.to_string().contains("more than one commit"));
    }

    #[test]
    fn bad_prefix_and_counts_are_rejected() {
        let mut p = built();
        p.proposed_commits[0].message = "update things".to_string();
        assert!(validate_proposal(&p).is_err());

        let mut p = built();
        p.total_changes = 7;
        assert!(validate_proposal(&p).is_err());

        let mut p = built();
        p.confidence_score = 1.5;
        assert!(validate_proposal(&p).is_err());
    }

    #[test]
    fn coverage_reports_missing_and_extra_files() {
        let p = built();
        let files = BTreeSet::from(["src/a.rs".to_string()]);
        assert!(validate_coverage(&p, &files).unwrap_err().to_string().contains("README.md"));
    }
}
