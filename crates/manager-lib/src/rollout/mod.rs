//! Deployment revision history and rollback target selection
//!
//! Works on an in-memory collection of [`RevisionRecord`]s that the caller
//! already fetched. Nothing here mutates the collection or talks to the
//! cluster; applying the selected template is the caller's job.

mod replicaset;

pub use replicaset::{
    history_for, owned_by, plan_rollback, revision_of, revision_record, rollback_template,
    RollbackPlan, CHANGE_CAUSE_ANNOTATION, POD_TEMPLATE_HASH_LABEL, REVISION_ANNOTATION,
};

use crate::error::RevisionError;
use crate::models::RevisionRecord;
use tracing::debug;

/// Order records most recent first
///
/// The sort is stable: records sharing a revision number keep their input
/// order.
pub fn build_history(records: &[RevisionRecord]) -> Vec<RevisionRecord> {
    let mut history = records.to_vec();
    history.sort_by(|a, b| b.revision_number.cmp(&a.revision_number));
    history
}

/// Select the record a rollback should restore
///
/// With `target_revision` set, the first record carrying that number is
/// returned. Without it, the record right after the highest revision is
/// picked, which is numerically second and not necessarily the
/// chronologically previous one when the history has gaps.
pub fn select_rollback_target(
    records: &[RevisionRecord],
    target_revision: Option<u64>,
) -> Result<RevisionRecord, RevisionError> {
    if records.is_empty() {
        return Err(RevisionError::NoHistoryAvailable);
    }

    let history = build_history(records);

    match target_revision {
        Some(revision) => history
            .into_iter()
            .find(|record| record.revision_number == revision)
            .ok_or(RevisionError::RevisionNotFound(revision)),
        None => {
            let mut ordered = history.into_iter();
            let current = ordered.next().ok_or(RevisionError::NoHistoryAvailable)?;
            let previous = ordered.next().ok_or(RevisionError::NoPreviousRevision)?;

            if current.revision_number.saturating_sub(previous.revision_number) > 1 {
                debug!(
                    current = current.revision_number,
                    previous = previous.revision_number,
                    "Revision history has a gap, rolling back to the next lower revision"
                );
            }

            Ok(previous)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(revision: u64, source: &str) -> RevisionRecord {
        RevisionRecord {
            revision_number: revision,
            change_cause: String::new(),
            created_at: None,
            desired_replica_count: 0,
            ready_replica_count: 0,
            container_image_reference: format!("nginx:1.{}", revision),
            source_name: source.to_string(),
        }
    }

    fn revisions(history: &[RevisionRecord]) -> Vec<u64> {
        history.iter().map(|r| r.revision_number).collect()
    }

    #[test]
    fn test_build_history_empty() {
        assert!(build_history(&[]).is_empty());
    }

    #[test]
    fn test_build_history_single() {
        let records = vec![record(7, "web-7")];
        assert_eq!(build_history(&records), records);
    }

    #[test]
    fn test_build_history_sorts_descending() {
        let records = vec![record(2, "b"), record(5, "e"), record(1, "a"), record(3, "c")];
        assert_eq!(revisions(&build_history(&records)), vec![5, 3, 2, 1]);
    }

    #[test]
    fn test_build_history_keeps_duplicate_order() {
        let records = vec![record(1, "one"), record(2, "two-a"), record(2, "two-b")];
        let history = build_history(&records);

        assert_eq!(revisions(&history), vec![2, 2, 1]);
        assert_eq!(history[0].source_name, "two-a");
        assert_eq!(history[1].source_name, "two-b");
    }

    #[test]
    fn test_select_previous_revision() {
        let records = vec![record(3, "web-3"), record(1, "web-1")];
        let target = select_rollback_target(&records, None).unwrap();
        assert_eq!(target.revision_number, 1);
        assert_eq!(target.source_name, "web-1");
    }

    #[test]
    fn test_select_previous_from_unordered_input() {
        let records = vec![record(1, "a"), record(4, "d"), record(3, "c")];
        let target = select_rollback_target(&records, None).unwrap();
        assert_eq!(target.revision_number, 3);
    }

    #[test]
    fn test_select_previous_with_single_record() {
        let records = vec![record(1, "web-1")];
        assert_eq!(
            select_rollback_target(&records, None),
            Err(RevisionError::NoPreviousRevision)
        );
    }

    #[test]
    fn test_select_explicit_revision() {
        let records = vec![record(1, "a"), record(2, "b"), record(3, "c")];
        let target = select_rollback_target(&records, Some(2)).unwrap();
        assert_eq!(target.source_name, "b");
    }

    #[test]
    fn test_select_explicit_revision_missing() {
        let records = vec![record(1, "a"), record(3, "c")];
        assert_eq!(
            select_rollback_target(&records, Some(5)),
            Err(RevisionError::RevisionNotFound(5))
        );
    }

    #[test]
    fn test_select_explicit_duplicate_takes_first() {
        let records = vec![record(2, "first"), record(1, "x"), record(2, "second")];
        let target = select_rollback_target(&records, Some(2)).unwrap();
        assert_eq!(target.source_name, "first");
    }

    #[test]
    fn test_select_on_empty_history() {
        assert_eq!(
            select_rollback_target(&[], None),
            Err(RevisionError::NoHistoryAvailable)
        );
        assert_eq!(
            select_rollback_target(&[], Some(1)),
            Err(RevisionError::NoHistoryAvailable)
        );
    }

    #[test]
    fn test_select_with_gap_picks_numerically_second() {
        let records = vec![record(10, "ten"), record(4, "four"), record(2, "two")];
        let target = select_rollback_target(&records, None).unwrap();
        assert_eq!(target.revision_number, 4);
    }

    #[test]
    fn test_select_does_not_mutate_input() {
        let records = vec![record(1, "a"), record(2, "b")];
        let before = records.clone();
        let _ = select_rollback_target(&records, None);
        assert_eq!(records, before);
    }

    proptest! {
        #[test]
        fn history_is_non_increasing(numbers in proptest::collection::vec(0u64..50, 0..40)) {
            let records: Vec<_> = numbers
                .iter()
                .enumerate()
                .map(|(i, n)| record(*n, &i.to_string()))
                .collect();
            let history = build_history(&records);

            prop_assert_eq!(history.len(), records.len());
            prop_assert!(history
                .windows(2)
                .all(|pair| pair[0].revision_number >= pair[1].revision_number));
        }

        #[test]
        fn history_is_stable_for_duplicates(numbers in proptest::collection::vec(0u64..5, 0..40)) {
            let records: Vec<_> = numbers
                .iter()
                .enumerate()
                .map(|(i, n)| record(*n, &format!("{:04}", i)))
                .collect();
            let history = build_history(&records);

            for pair in history.windows(2) {
                if pair[0].revision_number == pair[1].revision_number {
                    prop_assert!(pair[0].source_name < pair[1].source_name);
                }
            }
        }
    }
}
