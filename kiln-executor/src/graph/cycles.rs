//! Cycle detection over the dependency multigraph.

use kiln_core::types::VertexId;
use std::collections::HashSet;
use std::fmt;

/// A closed walk `v0 -> v1 -> ... -> v0`, rotated to start at its smallest vertex.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cycle {
    vertices: Vec<VertexId>,
}

impl Cycle {
    fn normalized(mut vertices: Vec<VertexId>) -> Self {
        if let Some(start) = vertices
            .iter()
            .enumerate()
            .min_by_key(|(_, vertex)| **vertex)
            .map(|(position, _)| position)
        {
            vertices.rotate_left(start);
        }
        Self { vertices }
    }

    /// Vertices in walk order; the edge back to the first is implied.
    pub fn vertices(&self) -> &[VertexId] {
        &self.vertices
    }

    /// Number of edges in the walk.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Always false; a cycle has at least one vertex.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Consecutive `(from, to)` pairs of the walk, closing back to the start.
    pub fn steps(&self) -> impl Iterator<Item = (VertexId, VertexId)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for vertex in &self.vertices {
            write!(f, "{} -> ", vertex)?;
        }
        match self.vertices.first() {
            Some(first) => write!(f, "{}", first),
            None => Ok(()),
        }
    }
}

/// Every distinct cycle found by one verification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    cycles: Vec<Cycle>,
}

impl CycleReport {
    /// Whether the graph is acyclic.
    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    /// Number of distinct cycles.
    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    /// The cycles found.
    pub fn cycles(&self) -> &[Cycle] {
        &self.cycles
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Colour {
    White,
    Grey,
    Black,
}

/// Three-colour depth-first search, one cycle per back edge.
///
/// `successors[v]` lists the targets of v's outgoing edges, with repeats for
/// parallel edges. Traversal is iterative so deep chains cannot overflow the
/// stack.
pub(crate) fn find_cycles(successors: &[Vec<VertexId>]) -> CycleReport {
    let n = successors.len();
    let mut colour = vec![Colour::White; n];
    // Position of each grey vertex on the current path.
    let mut on_path: Vec<Option<usize>> = vec![None; n];
    let mut path: Vec<usize> = Vec::new();
    // (vertex, index of the next successor to visit)
    let mut stack: Vec<(usize, usize)> = Vec::new();

    let mut seen = HashSet::new();
    let mut cycles = Vec::new();

    for root in 0..n {
        if colour[root] != Colour::White {
            continue;
        }
        colour[root] = Colour::Grey;
        on_path[root] = Some(path.len());
        path.push(root);
        stack.push((root, 0));

        while let Some((vertex, next)) = stack.last_mut() {
            let vertex = *vertex;
            let Some(&target) = successors[vertex].get(*next) else {
                colour[vertex] = Colour::Black;
                on_path[vertex] = None;
                path.pop();
                stack.pop();
                continue;
            };
            *next += 1;

            let target = target.index();
            match colour[target] {
                Colour::White => {
                    colour[target] = Colour::Grey;
                    on_path[target] = Some(path.len());
                    path.push(target);
                    stack.push((target, 0));
                }
                Colour::Grey => {
                    if let Some(start) = on_path[target] {
                        let walk = path[start..]
                            .iter()
                            .map(|&v| VertexId::new(v as u32))
                            .collect();
                        let cycle = Cycle::normalized(walk);
                        if seen.insert(cycle.clone()) {
                            cycles.push(cycle);
                        }
                    }
                }
                Colour::Black => {}
            }
        }
    }

    CycleReport { cycles }
}
