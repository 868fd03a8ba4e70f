use serde::{Deserialize, Serialize};

use crate::contract::{EventSourceSpec, ExistingEventSourceMapping, NewEventSourceMapping};

/// One provider call needed to move the bound mappings toward the desired set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ReconciliationOp {
    Create(NewEventSourceMapping),
    Update { uuid: String, source: EventSourceSpec },
    Delete { uuid: String },
}

impl ReconciliationOp {
    /// Identifier a failure of this op is reported against.
    pub fn target(&self) -> &str {
        match self {
            Self::Create(mapping) => &mapping.event_source_arn,
            Self::Update { uuid, .. } | Self::Delete { uuid } => uuid,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }
}

/// Diffs bound mappings against the desired list, keyed by source arn.
///
/// Creates and updates follow desired-list order; deletes are appended in
/// existing-list order. Only `enabled` and `batch_size` travel with an update
/// because nothing else is mutable once a mapping exists.
pub fn reconcile(
    existing: &[ExistingEventSourceMapping],
    desired: &[EventSourceSpec],
) -> Vec<ReconciliationOp> {
    let mut ops = Vec::with_capacity(desired.len() + existing.len());

    for source in desired {
        let matched = existing
            .iter()
            .find(|mapping| mapping.event_source_arn == source.event_source_arn);
        match matched {
            Some(mapping) => ops.push(ReconciliationOp::Update {
                uuid: mapping.uuid.clone(),
                source: EventSourceSpec {
                    event_source_arn: source.event_source_arn.clone(),
                    enabled: source.enabled,
                    batch_size: source.batch_size,
                    starting_position: None,
                },
            }),
            None => ops.push(ReconciliationOp::Create(source.with_defaults())),
        }
    }

    for mapping in existing {
        let still_desired = desired
            .iter()
            .any(|source| source.event_source_arn == mapping.event_source_arn);
        if !still_desired {
            ops.push(ReconciliationOp::Delete {
                uuid: mapping.uuid.clone(),
            });
        }
    }

    ops
}

#[cfg(test)]
mod tests {
    use crate::contract::StartingPosition;

    use super::*;

    fn existing(arn: &str, uuid: &str, enabled: bool) -> ExistingEventSourceMapping {
        ExistingEventSourceMapping {
            event_source_arn: arn.to_string(),
            uuid: uuid.to_string(),
            enabled,
            batch_size: Some(10),
        }
    }

    #[test]
    fn unmatched_desired_source_is_created_with_defaults() {
        let ops = reconcile(&[], &[EventSourceSpec::new("X")]);

        assert_eq!(
            ops,
            vec![ReconciliationOp::Create(NewEventSourceMapping {
                event_source_arn: "X".to_string(),
                enabled: false,
                batch_size: 100,
                starting_position: StartingPosition::Latest,
            })]
        );
    }

    #[test]
    fn matched_source_is_updated_with_existing_uuid() {
        let desired = EventSourceSpec {
            enabled: Some(true),
            ..EventSourceSpec::new("X")
        };
        let ops = reconcile(&[existing("X", "u1", false)], &[desired]);

        assert_eq!(ops.len(), 1);
        match &ops[0] {
            ReconciliationOp::Update { uuid, source } => {
                assert_eq!(uuid, "u1");
                assert_eq!(source.enabled, Some(true));
                assert_eq!(source.batch_size, None);
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn unmatched_existing_mapping_is_deleted() {
        let ops = reconcile(&[existing("Y", "u2", true)], &[]);

        assert_eq!(
            ops,
            vec![ReconciliationOp::Delete {
                uuid: "u2".to_string()
            }]
        );
    }

    #[test]
    fn explicit_fields_override_creation_defaults() {
        let desired = EventSourceSpec {
            event_source_arn: "arn:aws:kinesis:us-east-1:1:stream/clicks".to_string(),
            enabled: Some(true),
            batch_size: Some(500),
            starting_position: Some(StartingPosition::TrimHorizon),
        };
        let ops = reconcile(&[], std::slice::from_ref(&desired));

        assert_eq!(
            ops,
            vec![ReconciliationOp::Create(NewEventSourceMapping {
                event_source_arn: desired.event_source_arn.clone(),
                enabled: true,
                batch_size: 500,
                starting_position: StartingPosition::TrimHorizon,
            })]
        );
    }

    #[test]
    fn ops_follow_desired_order_then_existing_order_for_deletes() {
        let existing_mappings = vec![
            existing("gone-1", "u-gone-1", true),
            existing("B", "u-b", true),
            existing("gone-2", "u-gone-2", false),
        ];
        let desired = vec![EventSourceSpec::new("A"), EventSourceSpec::new("B")];

        let ops = reconcile(&existing_mappings, &desired);
        let summary: Vec<(&str, &str)> = ops.iter().map(|op| (op.kind(), op.target())).collect();

        assert_eq!(
            summary,
            vec![
                ("create", "A"),
                ("update", "u-b"),
                ("delete", "u-gone-1"),
                ("delete", "u-gone-2"),
            ]
        );
    }

    #[test]
    fn every_identifier_produces_exactly_one_op() {
        let existing_mappings = vec![
            existing("shared-1", "u-1", true),
            existing("stale", "u-2", true),
            existing("shared-2", "u-3", false),
        ];
        let desired = vec![
            EventSourceSpec::new("shared-2"),
            EventSourceSpec::new("fresh"),
            EventSourceSpec::new("shared-1"),
        ];

        let ops = reconcile(&existing_mappings, &desired);

        let creates: Vec<&str> = ops
            .iter()
            .filter(|op| op.kind() == "create")
            .map(ReconciliationOp::target)
            .collect();
        let updates: Vec<&str> = ops
            .iter()
            .filter(|op| op.kind() == "update")
            .map(ReconciliationOp::target)
            .collect();
        let deletes: Vec<&str> = ops
            .iter()
            .filter(|op| op.kind() == "delete")
            .map(ReconciliationOp::target)
            .collect();

        assert_eq!(creates, vec!["fresh"]);
        assert_eq!(updates, vec!["u-3", "u-1"]);
        assert_eq!(deletes, vec!["u-2"]);
    }

    #[test]
    fn reconcile_is_deterministic_for_identical_input() {
        let existing_mappings = vec![existing("A", "u-a", false), existing("C", "u-c", true)];
        let desired = vec![EventSourceSpec::new("B"), EventSourceSpec::new("A")];

        let first = reconcile(&existing_mappings, &desired);
        let second = reconcile(&existing_mappings, &desired);

        assert_eq!(first, second);
    }
}
