//! Dependency tracking between formula fields

use crate::config::CompilerConfig;
use crate::resolver::FieldResolver;
use ahash::{AHashMap, AHashSet};
use sheetbase_core::{FieldId, TableSchema};

/// Dependency graph for formula fields
///
/// Tracks which fields depend on which other fields, so recompilation after
/// a schema change can run dependencies before dependants.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// Field → Fields that depend on it (dependents)
    dependents: AHashMap<FieldId, AHashSet<FieldId>>,
    /// Field → Fields it depends on (precedents)
    precedents: AHashMap<FieldId, AHashSet<FieldId>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph of every formula field in a table, parsing formulas
    /// under the limits of `config`
    pub fn from_table(table: &TableSchema, config: &CompilerConfig) -> Self {
        let mut graph = Self::new();
        for field in table.formula_fields() {
            graph.set_dependencies(field.id, &table.dependencies(field.id, config));
        }
        graph
    }

    /// Add a dependency: dependent depends on precedent
    pub fn add_dependency(&mut self, precedent: FieldId, dependent: FieldId) {
        self.dependents
            .entry(precedent)
            .or_default()
            .insert(dependent);
        self.precedents
            .entry(dependent)
            .or_default()
            .insert(precedent);
    }

    /// Replace the precedents of a field, e.g. after it was recompiled
    pub fn set_dependencies(&mut self, field: FieldId, precedents: &[FieldId]) {
        self.remove_precedents(field);
        for &precedent in precedents {
            self.add_dependency(precedent, field);
        }
    }

    /// Remove all dependencies for a field, e.g. when it is deleted
    pub fn clear_dependencies(&mut self, field: FieldId) {
        // Remove from all precedents' dependents list
        self.remove_precedents(field);

        // Remove as a precedent for others
        if let Some(dependents) = self.dependents.remove(&field) {
            for dependent in dependents {
                if let Some(precs) = self.precedents.get_mut(&dependent) {
                    precs.remove(&field);
                }
            }
        }
    }

    fn remove_precedents(&mut self, field: FieldId) {
        if let Some(precedents) = self.precedents.remove(&field) {
            for precedent in precedents {
                if let Some(deps) = self.dependents.get_mut(&precedent) {
                    deps.remove(&field);
                }
            }
        }
    }

    /// Get fields that depend on the given field
    pub fn dependents(&self, field: FieldId) -> impl Iterator<Item = FieldId> + '_ {
        self.dependents
            .get(&field)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Get fields that the given field depends on
    pub fn precedents(&self, field: FieldId) -> impl Iterator<Item = FieldId> + '_ {
        self.precedents
            .get(&field)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Fields to recompile when the given fields change, dependencies first
    ///
    /// The changed fields themselves are included.
    pub fn recalc_order(&self, changed: &[FieldId]) -> Vec<FieldId> {
        let mut result = Vec::new();
        let mut visited = AHashSet::new();
        let mut in_stack = AHashSet::new();

        for &field in changed {
            self.topological_sort(field, &mut result, &mut visited, &mut in_stack);
        }

        // The DFS emits dependants before the fields they depend on
        result.reverse();
        result
    }

    /// Order `fields` so every field comes after the fields it depends on
    ///
    /// Fields on a cycle are still emitted; their relative order is arbitrary.
    pub fn topological_order(&self, fields: &[FieldId]) -> Vec<FieldId> {
        let mut sorted: Vec<FieldId> = fields.to_vec();
        sorted.sort_unstable();

        let mut result = Vec::with_capacity(sorted.len());
        let mut visited = AHashSet::new();
        let mut in_stack = AHashSet::new();
        for &field in &sorted {
            self.visit_precedents(field, &mut result, &mut visited, &mut in_stack);
        }

        let wanted: AHashSet<FieldId> = sorted.into_iter().collect();
        result.retain(|field| wanted.contains(field));
        result
    }

    /// Topological sort helper (DFS over dependents)
    fn topological_sort(
        &self,
        field: FieldId,
        result: &mut Vec<FieldId>,
        visited: &mut AHashSet<FieldId>,
        in_stack: &mut AHashSet<FieldId>,
    ) {
        if visited.contains(&field) {
            return;
        }

        if in_stack.contains(&field) {
            // Circular reference - skip (rejected by the type checker)
            return;
        }

        in_stack.insert(field);

        // Visit all dependents first, in a stable order
        let mut dependents: Vec<FieldId> = self.dependents(field).collect();
        dependents.sort_unstable();
        for dependent in dependents {
            self.topological_sort(dependent, result, visited, in_stack);
        }

        in_stack.remove(&field);
        visited.insert(field);
        result.push(field);
    }

    /// Post-order DFS over precedents
    fn visit_precedents(
        &self,
        field: FieldId,
        result: &mut Vec<FieldId>,
        visited: &mut AHashSet<FieldId>,
        in_stack: &mut AHashSet<FieldId>,
    ) {
        if visited.contains(&field) || in_stack.contains(&field) {
            return;
        }

        in_stack.insert(field);

        let mut precedents: Vec<FieldId> = self.precedents(field).collect();
        precedents.sort_unstable();
        for precedent in precedents {
            self.visit_precedents(precedent, result, visited, in_stack);
        }

        in_stack.remove(&field);
        visited.insert(field);
        result.push(field);
    }

    /// Detect circular references involving a field
    pub fn has_circular_reference(&self, field: FieldId) -> bool {
        let mut visited = AHashSet::new();
        let mut in_stack = AHashSet::new();
        self.detect_cycle(field, &mut visited, &mut in_stack)
    }

    fn detect_cycle(
        &self,
        field: FieldId,
        visited: &mut AHashSet<FieldId>,
        in_stack: &mut AHashSet<FieldId>,
    ) -> bool {
        if in_stack.contains(&field) {
            return true;
        }
        if visited.contains(&field) {
            return false;
        }

        visited.insert(field);
        in_stack.insert(field);

        if let Some(precedents) = self.precedents.get(&field) {
            for &precedent in precedents {
                if self.detect_cycle(precedent, visited, in_stack) {
                    return true;
                }
            }
        }

        in_stack.remove(&field);
        false
    }
}
