//! Parsing, normalization, merging, and decision-reweighting of per-variant
//! integer weights. Backed by a `BTreeMap` so on-disk/on-wire serialization
//! is always in ascending variant-name order without a separate sort step.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TestTrackError};
use crate::validators;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Weights(BTreeMap<String, u32>);

impl Weights {
    pub fn from_map(map: BTreeMap<String, u32>) -> Result<Self> {
        Self::validate_sum(&map)?;
        Ok(Self(map))
    }

    /// Parses `"v1: 25, v2: 75"` the way the CLI's `--weights` flag does:
    /// trim, split on `,`, split each pair on `:` (max two parts), validate
    /// each variant name as snake_case, parse a non-negative decimal weight.
    pub fn from_str_repr(raw: &str) -> Result<Self> {
        let mut map = BTreeMap::new();
        for pair in raw.trim().split(',') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let mut parts = pair.splitn(2, ':');
            let variant = parts
                .next()
                .ok_or_else(|| TestTrackError::InvalidInput(format!("malformed weights entry '{pair}'")))?
                .trim();
            let weight = parts
                .next()
                .ok_or_else(|| TestTrackError::InvalidInput(format!("malformed weights entry '{pair}'")))?
                .trim();
            validators::snake_case("variant", variant)?;
            let weight: u32 = weight.parse().map_err(|_| {
                TestTrackError::InvalidInput(format!("weight '{weight}' for '{variant}' must be a non-negative integer"))
            })?;
            map.insert(variant.to_string(), weight);
        }
        Self::from_map(map)
    }

    fn validate_sum(map: &BTreeMap<String, u32>) -> Result<()> {
        let sum: u64 = map.values().map(|&w| w as u64).sum();
        if sum != 100 {
            return Err(TestTrackError::InvalidInput(format!(
                "weights must sum to 100, got {sum}"
            )));
        }
        Ok(())
    }

    pub fn contains(&self, variant: &str) -> bool {
        self.0.contains_key(variant)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(k, &v)| (k.as_str(), v))
    }

    pub fn as_map(&self) -> &BTreeMap<String, u32> {
        &self.0
    }

    /// Sets every existing variant to 0, then overlays `other` on top —
    /// variants that disappear from the new set survive at weight 0 rather
    /// than being dropped, so clients that cached the old variant name
    /// don't crash on an unknown key.
    pub fn merge(&self, other: &Weights) -> Weights {
        let mut merged: BTreeMap<String, u32> = self.0.keys().map(|k| (k.clone(), 0)).collect();
        for (k, v) in other.0.iter() {
            merged.insert(k.clone(), *v);
        }
        Weights(merged)
    }

    /// Requires `variant` to already be present, then sets it to 100 and
    /// every other variant to 0.
    pub fn reweight_to_decision(&self, variant: &str) -> Result<Weights> {
        if !self.contains(variant) {
            return Err(TestTrackError::NotFoundInSchema {
                name: variant.to_string(),
            });
        }
        let reweighted = self
            .0
            .keys()
            .map(|k| (k.clone(), if k == variant { 100 } else { 0 }))
            .collect();
        Ok(Weights(reweighted))
    }
}

impl std::fmt::Display for Weights {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        write!(f, "{}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, u32)]) -> BTreeMap<String, u32> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn from_map_requires_sum_100() {
        assert!(Weights::from_map(map(&[("a", 50), ("b", 49)])).is_err());
        assert!(Weights::from_map(map(&[("a", 50), ("b", 50)])).is_ok());
    }

    #[test]
    fn from_str_repr_round_trips_through_display() {
        let w = Weights::from_str_repr("control: 50, treatment: 50").unwrap();
        assert_eq!(w.as_map()["control"], 50);
        let again = Weights::from_str_repr(&w.to_string()).unwrap();
        assert_eq!(w, again);
    }

    #[test]
    fn merge_zeroes_missing_variants_instead_of_dropping() {
        let base = Weights::from_map(map(&[("a", 50), ("b", 50)])).unwrap();
        let incoming = Weights::from_map(map(&[("a", 100)])).unwrap();
        let merged = base.merge(&incoming);
        assert_eq!(merged.as_map()["a"], 100);
        assert_eq!(merged.as_map()["b"], 0);
    }

    #[test]
    fn reweight_to_decision_requires_presence() {
        let base = Weights::from_map(map(&[("a", 50), ("b", 50)])).unwrap();
        assert!(base.reweight_to_decision("c").is_err());
        let decided = base.reweight_to_decision("a").unwrap();
        assert_eq!(decided.as_map()["a"], 100);
        assert_eq!(decided.as_map()["b"], 0);
    }
}
