use crate::core::field::CustomFieldDefinition;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

/// Names referenced by `{...}` tokens in a formula, in order of appearance.
///
/// An unterminated `{` ends the scan; the leftover text then fails the
/// arithmetic character check at evaluation time.
pub fn formula_references(formula: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = formula;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                names.push(&after[..close]);
                rest = &after[close + 1..];
            }
            None => break,
        }
    }
    names
}

/// Dependency graph between calculated fields, keyed by field name.
///
/// An edge `a -> b` means formula `a` references field `b`. References to
/// manual fields and base metrics are leaves and do not appear.
///
/// # Examples
///
/// ```
/// use hedge_mtm_engine::core::field::CustomFieldDefinition;
/// use hedge_mtm_engine::formula::dependency::DependencyGraph;
///
/// let defs = vec![
///     CustomFieldDefinition::calculated("a", "A", "{B} + 1"),
///     CustomFieldDefinition::calculated("b", "B", "{A} + 1"),
///     CustomFieldDefinition::calculated("c", "C", "{Monto USD}"),
/// ];
/// let refs: Vec<&CustomFieldDefinition> = defs.iter().collect();
/// let graph = DependencyGraph::build(&refs);
///
/// assert_eq!(graph.cycles(), vec![vec!["A".to_string(), "B".to_string()]]);
/// assert!(!graph.is_cyclic(2));
/// ```
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<usize, ()>,
    names: Vec<String>,
    /// Field name -> index of the first calculated field with that name.
    by_name: HashMap<String, usize>,
    /// Evaluation order, dependencies before dependents.
    order: Vec<usize>,
    cyclic: HashSet<usize>,
    groups: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Build the graph over `fields`; indices in the API refer to this slice.
    pub fn build(fields: &[&CustomFieldDefinition]) -> Self {
        let mut graph = DiGraph::<usize, ()>::new();
        let nodes: Vec<NodeIndex> = (0..fields.len()).map(|i| graph.add_node(i)).collect();

        let mut by_name: HashMap<String, usize> = HashMap::new();
        for (i, field) in fields.iter().enumerate() {
            by_name.entry(field.name.clone()).or_insert(i);
        }

        for (i, field) in fields.iter().enumerate() {
            let formula = field.formula.as_deref().unwrap_or_default();
            for name in formula_references(formula) {
                if let Some(&dep) = by_name.get(name) {
                    graph.update_edge(nodes[i], nodes[dep], ());
                }
            }
        }

        // Tarjan emits components in reverse topological order of the
        // edges, which for "references" edges is dependencies first.
        let mut order = Vec::with_capacity(fields.len());
        let mut cyclic = HashSet::new();
        let mut groups = Vec::new();
        for component in tarjan_scc(&graph) {
            let is_cycle = component.len() > 1
                || component
                    .first()
                    .map(|&n| graph.contains_edge(n, n))
                    .unwrap_or(false);
            let mut members: Vec<usize> = component.iter().map(|&n| graph[n]).collect();
            members.sort_unstable();
            if is_cycle {
                cyclic.extend(members.iter().copied());
                groups.push(members.clone());
            }
            order.extend(members);
        }

        Self {
            graph,
            names: fields.iter().map(|f| f.name.clone()).collect(),
            by_name,
            order,
            cyclic,
            groups,
        }
    }

    /// Field indices in an order where every field follows the fields it
    /// references (members of a cycle are grouped together).
    pub fn evaluation_order(&self) -> &[usize] {
        &self.order
    }

    pub fn is_cyclic(&self, index: usize) -> bool {
        self.cyclic.contains(&index)
    }

    /// The calculated field a name refers to, if any.
    pub fn field_named(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Calculated fields `index` references directly.
    pub fn dependencies(&self, index: usize) -> Vec<usize> {
        let mut deps: Vec<usize> = self
            .graph
            .neighbors(NodeIndex::new(index))
            .map(|n| self.graph[n])
            .collect();
        deps.sort_unstable();
        deps
    }

    /// Each dependency cycle as the sorted names of its members.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = self
            .groups
            .iter()
            .map(|group| group.iter().map(|&i| self.names[i].clone()).collect())
            .collect();
        for cycle in &mut cycles {
            cycle.sort();
        }
        cycles.sort();
        cycles
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calc(id: &str, name: &str, formula: &str) -> CustomFieldDefinition {
        CustomFieldDefinition::calculated(id, name, formula)
    }

    fn build(defs: &[CustomFieldDefinition]) -> DependencyGraph {
        let refs: Vec<&CustomFieldDefinition> = defs.iter().collect();
        DependencyGraph::build(&refs)
    }

    #[test]
    fn test_references() {
        assert_eq!(
            formula_references("{Monto USD} * ({Rate} - 1)"),
            vec!["Monto USD", "Rate"]
        );
        assert!(formula_references("1 + 2").is_empty());
        assert_eq!(formula_references("{A} + {B"), vec!["A"]);
    }

    #[test]
    fn test_chain_orders_dependencies_first() {
        // C depends on B depends on A, declared in reverse.
        let defs = vec![
            calc("c", "C", "{B} * 2"),
            calc("b", "B", "{A} + 1"),
            calc("a", "A", "{Monto USD}"),
        ];
        let graph = build(&defs);
        assert_eq!(graph.evaluation_order(), &[2, 1, 0]);
        assert!(graph.cycles().is_empty());
        assert_eq!(graph.dependencies(0), vec![1]);
    }

    #[test]
    fn test_self_reference_is_cyclic() {
        let defs = vec![calc("a", "A", "{A} + 1"), calc("b", "B", "{A}")];
        let graph = build(&defs);
        assert!(graph.is_cyclic(0));
        assert!(!graph.is_cyclic(1));
        assert_eq!(graph.cycles(), vec![vec!["A".to_string()]]);
    }

    #[test]
    fn test_three_way_cycle() {
        let defs = vec![
            calc("a", "A", "{C}"),
            calc("b", "B", "{A}"),
            calc("c", "C", "{B}"),
            calc("d", "D", "1"),
        ];
        let graph = build(&defs);
        assert_eq!(graph.cycles().len(), 1);
        assert_eq!(graph.cycles()[0].len(), 3);
        assert!(!graph.is_cyclic(3));
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn test_duplicate_names_resolve_to_first() {
        let defs = vec![calc("a1", "A", "1"), calc("a2", "A", "2")];
        let graph = build(&defs);
        assert_eq!(graph.field_named("A"), Some(0));
        assert_eq!(graph.field_named("Z"), None);
    }
}
