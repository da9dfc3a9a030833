use std::collections::{HashMap, HashSet};

use gridbook_core::Address;

use crate::{parser, FormulaError};

/// The dependency graph of a sheet: each formula cell maps to the cells its
/// formula reads. Rebuilt from the stored cells on every edit; leaves appear
/// only as values.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: HashMap<Address, HashSet<Address>>,
}

impl DependencyGraph {
    /// Build the graph from `(address, raw value)` pairs. Non-formula cells
    /// contribute no entry. A formula whose references no longer resolve is
    /// treated as having no dependencies rather than poisoning the graph.
    pub fn build<'a>(cells: impl IntoIterator<Item = (Address, &'a str)>) -> Self {
        let mut edges = HashMap::new();

        for (addr, raw) in cells {
            if !parser::is_formula(raw) {
                continue;
            }
            match parser::extract_refs(raw) {
                Ok(deps) => {
                    edges.insert(addr, deps);
                }
                Err(err) => {
                    tracing::warn!("dropping dependencies of {addr}: {err}");
                }
            }
        }

        DependencyGraph { edges }
    }

    pub fn dependencies(&self, addr: Address) -> Option<&HashSet<Address>> {
        self.edges.get(&addr)
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// A linear order in which every cell appears after everything it depends
    /// on. Cells unrelated by dependency may appear in any relative order.
    pub fn topo_sort(&self) -> Result<Vec<Address>, FormulaError> {
        let mut nodes: HashSet<Address> = self.edges.keys().copied().collect();
        for deps in self.edges.values() {
            nodes.extend(deps.iter().copied());
        }

        let mut order = Vec::with_capacity(nodes.len());
        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();

        for node in &nodes {
            if !visited.contains(node) {
                self.visit(*node, &mut visited, &mut visiting, &mut order)?;
            }
        }

        Ok(order)
    }

    fn visit(
        &self,
        node: Address,
        visited: &mut HashSet<Address>,
        visiting: &mut HashSet<Address>,
        order: &mut Vec<Address>,
    ) -> Result<(), FormulaError> {
        if visiting.contains(&node) {
            return Err(FormulaError::Cycle(format!(
                "circular dependency involving cell {node}"
            )));
        }
        if visited.contains(&node) {
            return Ok(());
        }

        visiting.insert(node);
        if let Some(deps) = self.edges.get(&node) {
            for dep in deps {
                self.visit(*dep, visited, visiting, order)?;
            }
        }
        visiting.remove(&node);
        visited.insert(node);

        // Post-order: dependencies land before their dependents.
        order.push(node);

        Ok(())
    }

    /// Would replacing `src`'s dependencies with `deps` make the graph
    /// cyclic? Checked against a probe copy so the committed graph is never
    /// touched. A self-reference is always a cycle.
    pub fn would_create_cycle(&self, src: Address, deps: &HashSet<Address>) -> bool {
        let mut probe = self.clone();
        probe.edges.insert(src, deps.clone());
        probe.topo_sort().is_err()
    }

    /// Every cell that transitively reads `target`. Terminates even on a
    /// cyclic graph.
    pub fn transitive_dependents(&self, target: Address) -> HashSet<Address> {
        let mut dependents = HashSet::new();
        let mut visited = HashSet::new();
        let mut stack = vec![target];

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            for (cell, deps) in &self.edges {
                if deps.contains(&current) && dependents.insert(*cell) {
                    stack.push(*cell);
                }
            }
        }

        dependents
    }
}
