//! Scored translation chains.
//!
//! A [`Mapping`] is one step of a translation: it takes the OR-alternatives in
//! `from` to the OR-alternatives in `to`, costs `penalty`, and links back to the
//! step it continues. Chains are persistent: a step never changes once built
//! and predecessors are shared through `Arc`.
//!
//! ```text
//!   root (from = source)          step                       terminal
//!  ┌──────────────────┐      ┌──────────────────┐      ┌──────────────────┐
//!  │ {PT} -> {SNOMED} │◄─────│ {SNOMED} -> {A,B}│◄─────│ {A,B} -> {X,Y}   │
//!  │ penalty 0        │      │ penalty 0        │      │ penalty 0.1      │
//!  └──────────────────┘      └──────────────────┘      └──────────────────┘
//! ```
//!
//! ## Penalties
//!
//! | step                                   | penalty             |
//! |----------------------------------------|---------------------|
//! | hierarchical step                      | 1.0                 |
//! | whole ↔ part structural step           | 0.1                 |
//! | splitting n OR-alternatives            | 0.1 × (n − 1)       |
//! | dropping k concepts of a combination   | k                   |
//!
//! Negative penalties mark chains that reached something but not what was
//! asked for. Negativity is infectious: once any step is negative the total
//! is the negated sum of absolute values.

use crate::error::{MappingError, Result};
use crate::item::MappingItem;
use rosetta_ontology::Concept;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

pub const DEFAULT_STEP_PENALTY: f64 = 1.0;
pub const STRUCTURAL_STEP_PENALTY: f64 = 0.1;
pub const SPLIT_PENALTY: f64 = 0.1;

/// Description of the step that splits OR-alternatives apart.
pub const DESCR_TO_SINGLE_OR: &str = "Multiple ORs to one mapping";

/// Direction of a hierarchical step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    /// Toward an ancestor.
    Uphill,
    /// Toward a descendant.
    Downhill,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Direction::Uphill => "Uphill",
            Direction::Downhill => "Downhill",
        }
    }
}

/// Penalty of a hierarchical step from `from` to `to`.
///
/// Whole/part transitions between anatomical concepts cost
/// [`STRUCTURAL_STEP_PENALTY`]; every other step costs [`DEFAULT_STEP_PENALTY`].
pub fn step_penalty(from: &Concept, to: &Concept, direction: Direction) -> f64 {
    let from = from.name.to_lowercase();
    let to = to.name.to_lowercase();
    let structural = match direction {
        Direction::Downhill => {
            (to.contains("entire") && from.contains("part"))
                || (from.contains("structure") && to.contains("part"))
        }
        Direction::Uphill => {
            (to.contains("structure") && from.contains("entire"))
                || (from.contains("part") && to.contains("structure"))
        }
    };
    if structural {
        STRUCTURAL_STEP_PENALTY
    } else {
        DEFAULT_STEP_PENALTY
    }
}

/// Total of a step given its own penalty and its predecessor's total.
pub fn accumulate(penalty: f64, preceding_total: Option<f64>) -> f64 {
    match preceding_total {
        None => penalty,
        Some(prev) if prev < 0.0 || penalty < 0.0 => -(penalty.abs() + prev.abs()),
        Some(prev) => penalty + prev,
    }
}

// ============================================================================
// Mapping
// ============================================================================

/// One step of a translation chain.
#[derive(Debug, Clone, Serialize)]
pub struct Mapping {
    from: BTreeSet<MappingItem>,
    to: BTreeSet<MappingItem>,
    description: String,
    penalty: f64,
    total_penalty: f64,
    #[serde(rename = "preceding_mapping", skip_serializing_if = "Option::is_none")]
    preceding: Option<Arc<Mapping>>,
}

impl Mapping {
    /// A chain root. Empty items are dropped from `to`.
    pub fn new(
        from: impl IntoIterator<Item = MappingItem>,
        to: impl IntoIterator<Item = MappingItem>,
    ) -> Self {
        Self {
            from: from.into_iter().collect(),
            to: non_empty(to),
            description: String::new(),
            penalty: 0.0,
            total_penalty: 0.0,
            preceding: None,
        }
    }

    /// A step continuing `preceding`; its `from` is the predecessor's `to`.
    pub fn after(preceding: &Arc<Mapping>, to: impl IntoIterator<Item = MappingItem>) -> Self {
        Self {
            from: preceding.to.clone(),
            to: non_empty(to),
            description: String::new(),
            penalty: 0.0,
            total_penalty: accumulate(0.0, Some(preceding.total_penalty)),
            preceding: Some(Arc::clone(preceding)),
        }
    }

    /// The terminal "nothing resolved" chain for `item`.
    pub fn no_mapping(item: MappingItem) -> Self {
        let description = format!("No mappings available for {}", item.human_readable());
        Self::new([item], []).with_description(description)
    }

    /// A hierarchical step from `from` to `to`, penalised by [`step_penalty`].
    pub fn expanded(self, from: &Concept, to: &Concept, direction: Direction) -> Self {
        let penalty = step_penalty(from, to, direction);
        self.with_penalty(penalty)
            .with_description(format!("{} mapping of {}", direction.label(), from.name))
    }

    pub fn with_penalty(mut self, penalty: f64) -> Self {
        self.penalty = penalty;
        self.total_penalty = accumulate(penalty, self.preceding.as_ref().map(|p| p.total_penalty));
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// The same step re-attached behind `preceding`.
    pub fn rebased(&self, preceding: &Arc<Mapping>) -> Self {
        Mapping::after(preceding, self.to.iter().cloned())
            .with_penalty(self.penalty)
            .with_description(self.description.clone())
    }

    /// The same step with a new root `from` and no predecessor.
    pub fn rerooted(&self, from: impl IntoIterator<Item = MappingItem>) -> Self {
        Mapping::new(from, self.to.iter().cloned())
            .with_penalty(self.penalty)
            .with_description(self.description.clone())
    }

    pub fn shared(self) -> Arc<Mapping> {
        Arc::new(self)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn from(&self) -> &BTreeSet<MappingItem> {
        &self.from
    }

    pub fn to(&self) -> &BTreeSet<MappingItem> {
        &self.to
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn penalty(&self) -> f64 {
        self.penalty
    }

    pub fn total_penalty(&self) -> f64 {
        self.total_penalty
    }

    pub fn preceding(&self) -> Option<&Arc<Mapping>> {
        self.preceding.as_ref()
    }

    /// True for chains that reached nothing.
    pub fn is_no_mapping(&self) -> bool {
        self.to.is_empty()
    }

    /// This step followed by its predecessors, newest first.
    pub fn steps(&self) -> impl Iterator<Item = &Mapping> {
        std::iter::successors(Some(self), |m| m.preceding.as_deref())
    }

    /// Number of steps in the chain.
    pub fn levels(&self) -> usize {
        self.steps().count()
    }

    /// The first step of the chain.
    pub fn root(&self) -> &Mapping {
        self.steps().last().unwrap_or(self)
    }

    /// Every concept reached, across all alternatives.
    pub fn to_concepts(&self) -> BTreeSet<Arc<Concept>> {
        self.to
            .iter()
            .flat_map(|item| item.iter().cloned())
            .collect()
    }

    /// The only alternative in `to`.
    pub fn single_to_item(&self) -> Result<&MappingItem> {
        if self.to.len() != 1 {
            return Err(MappingError::inconsistent(format!(
                "expected exactly one result item, found {}",
                self.to.len()
            )));
        }
        self.to
            .iter()
            .next()
            .ok_or_else(|| MappingError::inconsistent("empty result set"))
    }

    pub fn is_to_single_concept(&self) -> bool {
        self.to.len() == 1 && self.to.iter().all(|item| item.len() == 1)
    }

    // ========================================================================
    // Explanation
    // ========================================================================

    /// Render the chain from its result back to the input.
    pub fn explanation_string(&self) -> String {
        let mut out = String::from("\nRESULT:\n");
        out.push_str(&render_items(&self.to));
        out.push_str(&format!("\nTotal penalty: {}", self.total_penalty));

        let mut step = self;
        loop {
            out.push_str(&format!("\nStep: {}", step.description));
            if step.penalty != 0.0 {
                out.push_str(&format!(" (penalty: {})", step.penalty));
            }
            match step.preceding.as_deref() {
                Some(prev) => {
                    out.push_str("\n\nFROM:\n");
                    out.push_str(&render_items(&prev.to));
                    out.push('\n');
                    step = prev;
                }
                None => {
                    out.push_str("\n\nFROM INPUT:\n");
                    out.push_str(&render_items(&step.from));
                    break;
                }
            }
        }
        out
    }
}

fn non_empty(items: impl IntoIterator<Item = MappingItem>) -> BTreeSet<MappingItem> {
    items.into_iter().filter(|i| !i.is_empty()).collect()
}

fn render_items(items: &BTreeSet<MappingItem>) -> String {
    if items.is_empty() {
        return "No mapping".to_string();
    }
    items
        .iter()
        .map(MappingItem::human_readable)
        .collect::<Vec<_>>()
        .join("\n OR \n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use rosetta_ontology::{Domain, Vocabulary};

    fn concept(id: u32, name: &str) -> Arc<Concept> {
        Arc::new(Concept::new(id, name, id.to_string(), Vocabulary::Snomed, Domain::SpecAnatomicSite, "Body Structure"))
    }

    fn item(id: u32, name: &str) -> MappingItem {
        MappingItem::single(concept(id, name))
    }

    #[test]
    fn test_root_total_is_own_penalty() {
        let m = Mapping::new([item(1, "a")], [item(2, "b")]).with_penalty(0.7);
        assert_relative_eq!(m.total_penalty(), 0.7);
    }

    #[test]
    fn test_negative_step_is_infectious() {
        let a = Mapping::new([item(1, "a")], [item(2, "b")]).with_penalty(1.0).shared();
        let b = Mapping::after(&a, [item(3, "c")]).with_penalty(-1.0);
        assert_relative_eq!(b.total_penalty(), -2.0);

        let c = Mapping::after(&b.shared(), [item(4, "d")]).with_penalty(0.5);
        assert_relative_eq!(c.total_penalty(), -2.5);
    }

    #[test]
    fn test_structural_steps_are_discounted() {
        let entire = concept(1, "Entire liver");
        let structure = concept(2, "Liver structure");
        let part = concept(3, "Part of liver");
        let organ = concept(4, "Abdominal organ");

        assert_relative_eq!(step_penalty(&entire, &structure, Direction::Uphill), 0.1);
        assert_relative_eq!(step_penalty(&part, &structure, Direction::Uphill), 0.1);
        assert_relative_eq!(step_penalty(&structure, &part, Direction::Downhill), 0.1);
        assert_relative_eq!(step_penalty(&part, &entire, Direction::Downhill), 0.1);
        assert_relative_eq!(step_penalty(&structure, &organ, Direction::Uphill), 1.0);
    }

    #[test]
    fn test_expanded_step_description() {
        let root = Mapping::new([item(1, "Entire liver")], [item(1, "Entire liver")]).shared();
        let step = Mapping::after(&root, [item(2, "Liver structure")]).expanded(
            &concept(1, "Entire liver"),
            &concept(2, "Liver structure"),
            Direction::Uphill,
        );
        assert_eq!(step.description(), "Uphill mapping of Entire liver");
        assert_relative_eq!(step.penalty(), 0.1);
    }

    #[test]
    fn test_empty_items_are_dropped() {
        let m = Mapping::new([item(1, "a")], [MappingItem::default(), item(2, "b")]);
        assert_eq!(m.to().len(), 1);
    }

    #[test]
    fn test_no_mapping_explains_itself() {
        let m = Mapping::no_mapping(item(9, "Nowhere"));
        assert!(m.is_no_mapping());
        assert_eq!(m.description(), "No mappings available for Nowhere (SNOMED: 9)");
        let text = m.explanation_string();
        assert!(text.contains("No mapping"));
        assert!(text.contains("FROM INPUT:\nNowhere (SNOMED: 9)"));
    }

    #[test]
    fn test_explanation_walks_back_to_input() {
        let a = Mapping::new([item(1, "a")], [item(2, "b")])
            .with_description("first")
            .shared();
        let b = Mapping::after(&a, [item(3, "c"), item(4, "d")])
            .with_penalty(0.1)
            .with_description("second");
        let text = b.explanation_string();
        assert!(text.starts_with("\nRESULT:\nc (SNOMED: 3)\n OR \nd (SNOMED: 4)"));
        assert!(text.contains("Step: second (penalty: 0.1)"));
        assert!(text.contains("FROM:\nb (SNOMED: 2)"));
        assert!(text.contains("Step: first\n\nFROM INPUT:\na (SNOMED: 1)"));
        assert_eq!(b.levels(), 2);
        assert_eq!(b.root().description(), "first");
    }

    #[test]
    fn test_single_to_item_requires_one_alternative() {
        let m = Mapping::new([item(1, "a")], [item(2, "b"), item(3, "c")]);
        assert!(m.single_to_item().is_err());
        assert!(!m.is_to_single_concept());
    }

    proptest! {
        #[test]
        fn prop_totals_never_cancel(penalties in prop::collection::vec(-3.0f64..3.0, 1..8)) {
            let mut chain = Mapping::new([item(0, "start")], [item(1, "n1")])
                .with_penalty(penalties[0])
                .shared();
            for (i, p) in penalties.iter().enumerate().skip(1) {
                chain = Mapping::after(&chain, [item(i as u32 + 1, "n")]).with_penalty(*p).shared();
            }

            let magnitude: f64 = penalties.iter().map(|p| p.abs()).sum();
            if penalties.iter().any(|p| *p < 0.0) {
                prop_assert!((chain.total_penalty() + magnitude).abs() < 1e-9);
            } else {
                prop_assert!((chain.total_penalty() - magnitude).abs() < 1e-9);
            }
        }
    }
}
