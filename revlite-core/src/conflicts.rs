use crate::models::Revision;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// What the store does when an update's expected parent is no longer current.
///
/// `RecordSiblings` accepts the write as a sibling revision and records a
/// conflict; nothing is ever silently dropped. `FailOnConflict` rejects the
/// write instead, forcing the caller to re-read and retry with a fresh
/// parent. Sibling recording is the default: it is what offline, multi-writer
/// use requires.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConflictPolicy {
    RecordSiblings,
    FailOnConflict,
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        ConflictPolicy::RecordSiblings
    }
}

/// Order leaf revisions deterministically, winner first.
///
/// Live leaves sort before tombstones; within each group, higher generation
/// wins, then the lexically greater digest. The same inputs produce the same
/// order in every process, so resolution UIs are stable across calls.
pub fn order_leaves(mut leaves: Vec<Revision>) -> Vec<Revision> {
    leaves.sort_by(|a, b| {
        a.deleted
            .cmp(&b.deleted)
            .then_with(|| b.rev_id.generation().cmp(&a.rev_id.generation()))
            .then_with(|| b.rev_id.digest().cmp(a.rev_id.digest()))
    });
    leaves
}

/// The winning revision among ordered leaves, if any live revision exists.
pub fn select_winner(ordered_leaves: &[Revision]) -> Option<&Revision> {
    ordered_leaves.first().filter(|rev| !rev.deleted)
}
