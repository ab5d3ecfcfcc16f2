//! FK-aware table creation order.
//!
//! Tables referenced by foreign keys are created before the tables that
//! reference them. The search is an iterative depth-first walk over
//! strongly connected components, so mutual references (A → B → A) are
//! emitted together instead of failing the sort; the edges that point
//! forward inside such a group are reported as deferred, for the importer
//! to add with a later ALTER.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::ResolutionError;

/// A table and the tables it references.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableDeps {
    /// Table name.
    pub table: String,
    /// Referenced table names, in declaration order.
    pub dependencies: Vec<String>,
}

impl TableDeps {
    /// Creates a dependency entry.
    #[must_use]
    pub fn new(table: impl Into<String>, dependencies: Vec<String>) -> Self {
        Self {
            table: table.into(),
            dependencies,
        }
    }
}

/// A foreign-key edge that must be applied after both tables exist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeferredKey {
    /// Table holding the foreign key.
    pub table: String,
    /// Referenced table, created after `table`.
    pub references: String,
}

/// Output of [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Resolution {
    /// Creation order.
    pub order: Vec<String>,
    /// Edges broken to order cyclic tables.
    pub deferred: Vec<DeferredKey>,
}

impl Resolution {
    /// Tables whose references from `table` are deferred.
    #[must_use]
    pub fn deferred_for(&self, table: &str) -> Vec<String> {
        self.deferred
            .iter()
            .filter(|d| d.table == table)
            .map(|d| d.references.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    /// On the component stack: visited, component not yet emitted.
    InProgress,
    Done,
}

struct Frame {
    node: usize,
    next_edge: usize,
}

/// Table names in input order, deduplicated, and for each table the
/// indices of the tables it references.
fn dependency_graph(tables: &[TableDeps]) -> (Vec<&str>, Vec<Vec<usize>>) {
    let mut names: Vec<&str> = Vec::with_capacity(tables.len());
    let mut index: HashMap<&str, usize> = HashMap::new();
    for entry in tables {
        if !index.contains_key(entry.table.as_str()) {
            index.insert(&entry.table, names.len());
            names.push(&entry.table);
        }
    }

    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); names.len()];
    for entry in tables {
        let from = index[entry.table.as_str()];
        for dependency in &entry.dependencies {
            match index.get(dependency.as_str()) {
                Some(&to) if to != from && !edges[from].contains(&to) => edges[from].push(to),
                Some(_) => {}
                None => trace!(table = %entry.table, dependency = %dependency, "ignoring unknown dependency"),
            }
        }
    }
    (names, edges)
}

/// Computes the creation order of `tables`.
///
/// Unrelated tables keep their input order. Self references and references
/// to tables not in the input are ignored.
///
/// # Errors
///
/// Returns [`ResolutionError`] when the traversal overruns its step limit or
/// leaves tables unordered.
pub fn resolve(tables: &[TableDeps]) -> Result<Resolution, ResolutionError> {
    let (names, edges) = dependency_graph(tables);
    let count = names.len();
    let edge_count: usize = edges.iter().map(Vec::len).sum();
    let limit = 2 * count + edge_count + 1;

    let mut marks = vec![Mark::Unvisited; count];
    let mut discovered = vec![0usize; count];
    let mut low = vec![0usize; count];
    let mut counter = 0usize;
    let mut stack: Vec<usize> = Vec::new();
    let mut frames: Vec<Frame> = Vec::new();
    let mut steps = 0usize;

    let mut resolution = Resolution::default();

    for root in 0..count {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        discovered[root] = counter;
        low[root] = counter;
        counter += 1;
        marks[root] = Mark::InProgress;
        stack.push(root);
        frames.push(Frame {
            node: root,
            next_edge: 0,
        });

        while let Some(frame) = frames.last_mut() {
            steps += 1;
            if steps > limit {
                return Err(ResolutionError::TraversalOverflow {
                    limit,
                    tables: count,
                });
            }

            let node = frame.node;
            if let Some(&next) = edges[node].get(frame.next_edge) {
                frame.next_edge += 1;
                match marks[next] {
                    Mark::Unvisited => {
                        discovered[next] = counter;
                        low[next] = counter;
                        counter += 1;
                        marks[next] = Mark::InProgress;
                        stack.push(next);
                        frames.push(Frame {
                            node: next,
                            next_edge: 0,
                        });
                    }
                    Mark::InProgress => low[node] = low[node].min(discovered[next]),
                    Mark::Done => {}
                }
                continue;
            }

            frames.pop();
            if let Some(parent) = frames.last() {
                low[parent.node] = low[parent.node].min(low[node]);
            }
            if low[node] != discovered[node] {
                continue;
            }

            let mut component = Vec::new();
            while let Some(member) = stack.pop() {
                marks[member] = Mark::Done;
                component.push(member);
                if member == node {
                    break;
                }
            }
            component.sort_unstable();
            emit_component(&component, &edges, &names, &mut resolution);
        }
    }

    if resolution.order.len() != count {
        let missing = names
            .iter()
            .filter(|n| !resolution.order.iter().any(|o| o == *n))
            .map(|n| (*n).to_string())
            .collect();
        return Err(ResolutionError::Unordered(missing));
    }
    Ok(resolution)
}

/// Appends one component in input order. Edges from a member to a member
/// emitted after it are deferred.
fn emit_component(
    component: &[usize],
    edges: &[Vec<usize>],
    names: &[&str],
    resolution: &mut Resolution,
) {
    for (position, &member) in component.iter().enumerate() {
        for &target in &edges[member] {
            if component[position + 1..].contains(&target) {
                debug!(table = %names[member], references = %names[target], "deferring foreign key");
                resolution.deferred.push(DeferredKey {
                    table: names[member].to_string(),
                    references: names[target].to_string(),
                });
            }
        }
        resolution.order.push(names[member].to_string());
    }
}

/// Computes the creation order of `tables`, discarding deferral details.
///
/// # Errors
///
/// Same as [`resolve`].
pub fn resolve_order(tables: &[TableDeps]) -> Result<Vec<String>, ResolutionError> {
    resolve(tables).map(|r| r.order)
}
