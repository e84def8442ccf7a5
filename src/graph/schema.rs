//! Type-level side information: type assertions, type hierarchy, domains and ranges.
//!
//! The ranking pipeline hands these to models untouched. Models that use
//! types (the statistical validator, the relational classifier with type
//! and domain/range features, ProjE with type facts) read them through the
//! accessors here.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{EntityId, RelationId};

/// Zero-based type identifier.
pub type TypeId = u32;

/// Entity → asserted types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeAssertions {
    n_types: usize,
    /// Sorted, unique type ids per entity.
    by_entity: Vec<Vec<TypeId>>,
}

impl TypeAssertions {
    /// Build from `(entity, type)` pairs. Entities outside `n_entities` are dropped.
    pub fn new(
        n_entities: usize,
        n_types: usize,
        pairs: impl IntoIterator<Item = (EntityId, TypeId)>,
    ) -> Self {
        let mut by_entity = vec![Vec::new(); n_entities];
        for (e, t) in pairs {
            if let Some(types) = by_entity.get_mut(e as usize) {
                types.push(t);
            }
        }
        for types in &mut by_entity {
            types.sort_unstable();
            types.dedup();
        }
        let n_types = by_entity
            .iter()
            .flatten()
            .map(|&t| t as usize + 1)
            .max()
            .unwrap_or(0)
            .max(n_types);
        Self { n_types, by_entity }
    }

    /// Number of distinct type ids.
    pub fn n_types(&self) -> usize {
        self.n_types
    }

    /// Types asserted for `entity` (empty when untyped or unknown).
    pub fn types_of(&self, entity: EntityId) -> &[TypeId] {
        self.by_entity
            .get(entity as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All `(entity, type)` assertions.
    pub fn pairs(&self) -> impl Iterator<Item = (EntityId, TypeId)> + '_ {
        self.by_entity
            .iter()
            .enumerate()
            .flat_map(|(e, ts)| ts.iter().map(move |&t| (e as EntityId, t)))
    }

    /// Types of every entity closed under the hierarchy's ancestors.
    pub fn expanded(&self, hierarchy: &TypeHierarchy) -> Vec<Vec<TypeId>> {
        self.by_entity
            .iter()
            .map(|types| {
                let mut all: BTreeSet<TypeId> = types.iter().copied().collect();
                for &t in types {
                    all.extend(hierarchy.ancestors(t));
                }
                all.into_iter().collect()
            })
            .collect()
    }
}

/// Child type → direct parent types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeHierarchy {
    parents: BTreeMap<TypeId, Vec<TypeId>>,
}

impl TypeHierarchy {
    /// Build from `(child, parent)` edges.
    pub fn new(edges: impl IntoIterator<Item = (TypeId, TypeId)>) -> Self {
        let mut parents: BTreeMap<TypeId, Vec<TypeId>> = BTreeMap::new();
        for (child, parent) in edges {
            parents.entry(child).or_default().push(parent);
        }
        Self { parents }
    }

    /// Direct parents of `t`.
    pub fn parents(&self, t: TypeId) -> &[TypeId] {
        self.parents.get(&t).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Transitive ancestors of `t`, excluding `t` itself. Cycles are tolerated.
    pub fn ancestors(&self, t: TypeId) -> BTreeSet<TypeId> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<TypeId> = self.parents(t).to_vec();
        while let Some(p) = stack.pop() {
            if p != t && seen.insert(p) {
                stack.extend_from_slice(self.parents(p));
            }
        }
        seen
    }
}

/// Relation → allowed types on one side (domain or range).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationConstraints {
    by_relation: BTreeMap<RelationId, Vec<TypeId>>,
}

impl RelationConstraints {
    /// Build from `(relation, type)` pairs.
    pub fn new(pairs: impl IntoIterator<Item = (RelationId, TypeId)>) -> Self {
        let mut by_relation: BTreeMap<RelationId, Vec<TypeId>> = BTreeMap::new();
        for (r, t) in pairs {
            by_relation.entry(r).or_default().push(t);
        }
        for ts in by_relation.values_mut() {
            ts.sort_unstable();
            ts.dedup();
        }
        Self { by_relation }
    }

    /// Allowed types for `relation`; empty means unconstrained.
    pub fn types_for(&self, relation: RelationId) -> &[TypeId] {
        self.by_relation
            .get(&relation)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assertions_sort_and_dedup() {
        let ta = TypeAssertions::new(3, 0, [(0, 2), (0, 1), (0, 2), (5, 0)]);
        assert_eq!(ta.types_of(0), &[1, 2]);
        assert!(ta.types_of(1).is_empty());
        assert!(ta.types_of(5).is_empty());
        assert_eq!(ta.n_types(), 3);
    }

    #[test]
    fn ancestors_are_transitive_and_cycle_safe() {
        let h = TypeHierarchy::new([(0, 1), (1, 2), (2, 0)]);
        let anc: Vec<_> = h.ancestors(0).into_iter().collect();
        assert_eq!(anc, vec![1, 2]);
    }

    #[test]
    fn expansion_adds_ancestors() {
        let ta = TypeAssertions::new(2, 3, [(0, 0)]);
        let h = TypeHierarchy::new([(0, 1), (1, 2)]);
        let expanded = ta.expanded(&h);
        assert_eq!(expanded[0], vec![0, 1, 2]);
        assert!(expanded[1].is_empty());
    }

    #[test]
    fn sparse_ids_allocate_nothing_dense() {
        let h = TypeHierarchy::new([(4_000_000_000, 0)]);
        assert_eq!(h.parents(4_000_000_000), &[0]);
        assert!(h.parents(1).is_empty());
        let c = RelationConstraints::new([(u32::MAX, 1)]);
        assert_eq!(c.types_for(u32::MAX), &[1]);
    }

    #[test]
    fn constraints_default_to_unconstrained() {
        let c = RelationConstraints::new([(1, 4), (1, 3)]);
        assert!(c.types_for(0).is_empty());
        assert_eq!(c.types_for(1), &[3, 4]);
    }
}
