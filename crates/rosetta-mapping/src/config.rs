//! Engine configuration.

use rosetta_ontology::ConceptId;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Hard ceiling on the number of concepts one expansion may explore.
pub const MAX_EXPANSION_CAP: usize = 120;

/// A system-organ class and the intermediary organ it stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassOrgan {
    pub class: ConceptId,
    pub organ: ConceptId,
}

/// Tunables of the translation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Budget used when a request does not carry one.
    pub default_max_penalty: u32,
    /// Requests asking for more are clamped to this.
    pub max_penalty_ceiling: u32,
    /// Concepts one expansion may add to its excluded set. Clamped to
    /// [`MAX_EXPANSION_CAP`].
    pub expansion_cap: usize,
    /// Extra room above the budget granted by `sort_and_filter` to small
    /// result sets.
    pub filter_allowance: f64,
    /// Result sets larger than this get no allowance.
    pub filter_allowance_threshold: usize,
    /// Structural splits are not expanded when more results than this exist
    /// already and the split has more concepts than this.
    pub oversized_split_limit: usize,
    /// Intermediary concepts that are never climbed through or descended from.
    pub do_not_expand: Vec<ConceptId>,
    /// Generic body structures; recombinations involving them score negatively.
    pub body_structure_ids: Vec<ConceptId>,
    /// Organ used for a clinical term only locatable through its class.
    pub class_organs: Vec<ClassOrgan>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let ids = |raw: &[u32]| raw.iter().copied().map(ConceptId::new).collect::<Vec<_>>();
        let class_organs = [
            (35200000, 4217142),
            (35400000, 4037611),
            (35600000, 4305329),
            (35700000, 4046957),
            (35900000, 4009105),
            (36000000, 4021240),
            (36500000, 4095277),
            (37000000, 4271678),
            (37100000, 4076121),
            (37300000, 4132865),
        ]
        .into_iter()
        .map(|(class, organ)| ClassOrgan {
            class: ConceptId::new(class),
            organ: ConceptId::new(organ),
        })
        .collect();

        Self {
            default_max_penalty: 2,
            max_penalty_ceiling: 6,
            expansion_cap: MAX_EXPANSION_CAP,
            filter_allowance: 0.9,
            filter_allowance_threshold: 10,
            oversized_split_limit: 5,
            do_not_expand: ids(&[40481827, 4034052, 4237366, 70002975, 70000004, 4175951]),
            body_structure_ids: ids(&[40481827, 4034052, 4237366, 70002975, 70000004]),
            class_organs,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// The budget to use for a request.
    pub fn budget(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_max_penalty)
            .min(self.max_penalty_ceiling)
    }

    pub fn expansion_cap(&self) -> usize {
        self.expansion_cap.min(MAX_EXPANSION_CAP)
    }

    pub fn is_expansion_blocked(&self, id: ConceptId) -> bool {
        self.do_not_expand.contains(&id)
    }

    pub fn is_body_structure(&self, id: ConceptId) -> bool {
        self.body_structure_ids.contains(&id)
    }

    pub fn organ_for_class(&self, class: ConceptId) -> Option<ConceptId> {
        self.class_organs
            .iter()
            .find(|c| c.class == class)
            .map(|c| c.organ)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_is_clamped() {
        let config = EngineConfig::default();
        assert_eq!(config.budget(None), 2);
        assert_eq!(config.budget(Some(0)), 0);
        assert_eq!(config.budget(Some(50)), 6);
    }

    #[test]
    fn test_expansion_cap_never_exceeds_ceiling() {
        let config = EngineConfig {
            expansion_cap: 10_000,
            ..EngineConfig::default()
        };
        assert_eq!(config.expansion_cap(), MAX_EXPANSION_CAP);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"max_penalty_ceiling": 3}"#).unwrap();
        assert_eq!(config.max_penalty_ceiling, 3);
        assert_eq!(config.expansion_cap, MAX_EXPANSION_CAP);
        assert_eq!(
            config.organ_for_class(ConceptId::new(35400000)),
            Some(ConceptId::new(4037611))
        );
    }
}
