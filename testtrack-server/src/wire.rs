//! Versioned JSON response shapes for the local serving plane. Every
//! struct here mirrors one of the wire variants the split registry and
//! visitor endpoints have accumulated over time; nothing is shared across
//! versions beyond the `Schema`/`AssignmentOverrides` they're built from.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use testtrack_core::overrides::AssignmentOverrides;
use testtrack_core::schema::Schema;

/// The local service never persists real visitors; every request is
/// answered as this one fixed visitor.
pub const SENTINEL_VISITOR_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Constant sampling weight the fake server reports — there's no real
/// sampling population to measure against.
const EXPERIENCE_SAMPLING_WEIGHT: u32 = 1;

#[derive(Debug, Serialize)]
pub struct SplitEntryV2 {
    pub weights: BTreeMap<String, u32>,
    pub feature_gate: bool,
}

#[derive(Debug, Serialize)]
pub struct SplitRegistryV2 {
    pub experience_sampling_weight: u32,
    pub splits: BTreeMap<String, SplitEntryV2>,
}

#[derive(Debug, Serialize)]
pub struct VariantV4 {
    pub name: String,
    pub weight: u32,
}

#[derive(Debug, Serialize)]
pub struct SplitEntryV4 {
    pub name: String,
    pub variants: Vec<VariantV4>,
    pub feature_gate: bool,
}

#[derive(Debug, Serialize)]
pub struct SplitRegistryV4 {
    pub splits: Vec<SplitEntryV4>,
}

pub fn split_registry_v1(schema: &Schema) -> BTreeMap<String, BTreeMap<String, u32>> {
    schema.splits.iter().map(|s| (s.name.clone(), s.weights.as_map().clone())).collect()
}

pub fn split_registry_v2(schema: &Schema) -> SplitRegistryV2 {
    let splits = schema
        .splits
        .iter()
        .map(|s| {
            (
                s.name.clone(),
                SplitEntryV2 {
                    weights: s.weights.as_map().clone(),
                    feature_gate: s.feature_gate(),
                },
            )
        })
        .collect();
    SplitRegistryV2 {
        experience_sampling_weight: EXPERIENCE_SAMPLING_WEIGHT,
        splits,
    }
}

pub fn split_registry_v4(schema: &Schema) -> SplitRegistryV4 {
    let splits = schema
        .splits
        .iter()
        .map(|s| SplitEntryV4 {
            name: s.name.clone(),
            variants: s
                .weights
                .iter()
                .map(|(name, weight)| VariantV4 { name: name.to_string(), weight })
                .collect(),
            feature_gate: s.feature_gate(),
        })
        .collect();
    SplitRegistryV4 { splits }
}

#[derive(Debug, Serialize)]
pub struct VisitorAssignmentV1 {
    pub split_name: String,
    pub variant: String,
    pub context: serde_json::Value,
    pub unsynced: bool,
}

#[derive(Debug, Serialize)]
pub struct VisitorAssignmentV4 {
    pub split_name: String,
    pub variant: String,
}

#[derive(Debug, Serialize)]
pub struct VisitorV1 {
    pub id: String,
    pub assignments: Vec<VisitorAssignmentV1>,
}

#[derive(Debug, Serialize)]
pub struct VisitorV4 {
    pub id: String,
    pub assignments: Vec<VisitorAssignmentV4>,
}

/// Every override the local service hands out is "unsynced": it only ever
/// lives in `assignments.yml`, never in a migration, so it has nothing to
/// report in `context` beyond that fact.
fn assignment_context() -> serde_json::Value {
    serde_json::json!({ "assignment_source": "override" })
}

pub fn visitor_v1(overrides: &AssignmentOverrides) -> VisitorV1 {
    let assignments = overrides
        .iter()
        .map(|(split_name, variant)| VisitorAssignmentV1 {
            split_name: split_name.to_string(),
            variant: variant.to_string(),
            context: assignment_context(),
            unsynced: true,
        })
        .collect();
    VisitorV1 {
        id: SENTINEL_VISITOR_ID.to_string(),
        assignments,
    }
}

pub fn visitor_v4(overrides: &AssignmentOverrides) -> VisitorV4 {
    let assignments = overrides
        .iter()
        .map(|(split_name, variant)| VisitorAssignmentV4 {
            split_name: split_name.to_string(),
            variant: variant.to_string(),
        })
        .collect();
    VisitorV4 {
        id: SENTINEL_VISITOR_ID.to_string(),
        assignments,
    }
}

#[derive(Debug, Serialize)]
pub struct VisitorAssignmentDetail {
    pub split_name: String,
    pub variant: String,
    pub context: serde_json::Value,
    pub unsynced: bool,
    pub feature_gate: bool,
    pub assignment_source: &'static str,
}

#[derive(Debug, Serialize)]
pub struct VisitorDetail {
    pub id: String,
    pub assignments: Vec<VisitorAssignmentDetail>,
}

pub fn visitor_detail(schema: &Schema, overrides: &AssignmentOverrides) -> VisitorDetail {
    let assignments = overrides
        .iter()
        .map(|(split_name, variant)| {
            let feature_gate = schema.splits.iter().find(|s| s.name == split_name).map(|s| s.feature_gate()).unwrap_or(false);
            VisitorAssignmentDetail {
                split_name: split_name.to_string(),
                variant: variant.to_string(),
                context: assignment_context(),
                unsynced: true,
                feature_gate,
                assignment_source: "override",
            }
        })
        .collect();
    VisitorDetail {
        id: SENTINEL_VISITOR_ID.to_string(),
        assignments,
    }
}

#[derive(Debug, Serialize)]
pub struct VisitorConfigV1 {
    pub experience_sampling_weight: u32,
    pub splits: BTreeMap<String, SplitEntryV2>,
    pub visitor: VisitorV1,
}

#[derive(Debug, Serialize)]
pub struct VisitorConfigV4 {
    pub splits: Vec<SplitEntryV4>,
    pub visitor: VisitorV4,
}

pub fn visitor_config_v1(schema: &Schema, overrides: &AssignmentOverrides) -> VisitorConfigV1 {
    let registry = split_registry_v2(schema);
    VisitorConfigV1 {
        experience_sampling_weight: registry.experience_sampling_weight,
        splits: registry.splits,
        visitor: visitor_v1(overrides),
    }
}

pub fn visitor_config_v4(schema: &Schema, overrides: &AssignmentOverrides) -> VisitorConfigV4 {
    VisitorConfigV4 {
        splits: split_registry_v4(schema).splits,
        visitor: visitor_v4(overrides),
    }
}

/// Split-detail is a deliberate stub: the upstream service that would
/// answer this with real audit history doesn't exist here, so every split
/// id gets the same constant shape back.
#[derive(Debug, Serialize)]
pub struct SplitDetails {
    pub id: String,
    pub name: String,
    pub variant_calculator_type: &'static str,
    pub weighting_registry: BTreeMap<String, u32>,
    pub created_at: &'static str,
    pub updated_at: &'static str,
}

pub fn split_details_stub(id: &str) -> SplitDetails {
    SplitDetails {
        id: id.to_string(),
        name: id.to_string(),
        variant_calculator_type: "fixed",
        weighting_registry: BTreeMap::new(),
        created_at: "1970-01-01T00:00:00Z",
        updated_at: "1970-01-01T00:00:00Z",
    }
}

#[derive(Debug, Deserialize)]
pub struct AssignmentEntry {
    pub split_name: String,
    pub variant: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as StdMap;
    use testtrack_core::resource::Split;
    use testtrack_core::weights::Weights;

    fn weights(pairs: &[(&str, u32)]) -> Weights {
        let map: StdMap<String, u32> = pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        Weights::from_map(map).unwrap()
    }

    #[test]
    fn v4_registry_marks_feature_gates() {
        let mut schema = Schema::empty();
        schema.splits.push(Split {
            name: "foo_enabled".to_string(),
            weights: weights(&[("true", 100), ("false", 0)]),
            decided: false,
            owner: None,
        });
        let registry = split_registry_v4(&schema);
        assert_eq!(registry.splits.len(), 1);
        assert!(registry.splits[0].feature_gate);
    }

    #[test]
    fn visitor_v1_reports_every_override_as_unsynced() {
        let mut overrides = AssignmentOverrides::empty();
        overrides.assign("foo_experiment", "a");
        let visitor = visitor_v1(&overrides);
        assert_eq!(visitor.id, SENTINEL_VISITOR_ID);
        assert_eq!(visitor.assignments.len(), 1);
        assert!(visitor.assignments[0].unsynced);
    }
}
