//! Native static motif counter: the 13 connected directed triad classes.
//!
//! The sample's edges induce a static directed graph (self-loops dropped,
//! parallel edges collapsed). Every connected node triple is classified by
//! its isomorphism class. A triple's 6-bit adjacency code lists the pairs
//! (0,1) (1,0) (0,2) (2,0) (1,2) (2,1). The class is the smallest code over
//! all node relabellings. Output column `k` counts the `k`-th connected
//! class in ascending canonical-code order.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tw_common::{EdgeRecord, Result};

use super::{ExtractParams, FeatureExtractor, MotifKind, SampleInput};

const PAIRS: [(usize, usize); 6] = [(0, 1), (1, 0), (0, 2), (2, 0), (1, 2), (2, 1)];

const PERMUTATIONS: [[usize; 3]; 6] = [
    [0, 1, 2],
    [0, 2, 1],
    [1, 0, 2],
    [1, 2, 0],
    [2, 0, 1],
    [2, 1, 0],
];

fn bit(i: usize, j: usize) -> u8 {
    let pos = PAIRS
        .iter()
        .position(|&p| p == (i, j))
        .unwrap_or_default();
    1 << pos
}

fn canonical(code: u8) -> u8 {
    PERMUTATIONS
        .iter()
        .map(|perm| {
            PAIRS
                .iter()
                .enumerate()
                .filter(|(b, _)| code & (1 << b) != 0)
                .fold(0u8, |acc, (_, &(i, j))| acc | bit(perm[i], perm[j]))
        })
        .min()
        .unwrap_or(code)
}

fn is_connected(code: u8) -> bool {
    let linked = [code & 0b000011, code & 0b001100, code & 0b110000]
        .iter()
        .filter(|&&m| m != 0)
        .count();
    linked >= 2
}

/// Counts connected directed triads of the static graph.
#[derive(Debug, Clone)]
pub struct StaticMotifCounter {
    /// Maps every 6-bit code to its class column, if connected.
    class_of: [Option<u8>; 64],
}

impl Default for StaticMotifCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticMotifCounter {
    pub fn new() -> Self {
        let classes: BTreeSet<u8> = (0u8..64)
            .filter(|&c| is_connected(c))
            .map(canonical)
            .collect();
        let columns: BTreeMap<u8, u8> = classes
            .into_iter()
            .enumerate()
            .map(|(col, code)| (code, col as u8))
            .collect();

        let mut class_of = [None; 64];
        for code in 0u8..64 {
            if is_connected(code) {
                class_of[code as usize] = columns.get(&canonical(code)).copied();
            }
        }
        StaticMotifCounter { class_of }
    }

    /// Count triad classes over a set of edges.
    pub fn count(&self, edges: &[EdgeRecord]) -> Vec<u64> {
        let mut ids: BTreeMap<&str, usize> = BTreeMap::new();
        for e in edges {
            let next = ids.len();
            ids.entry(e.source.as_str()).or_insert(next);
            let next = ids.len();
            ids.entry(e.target.as_str()).or_insert(next);
        }

        let n = ids.len();
        let mut arcs: HashSet<(usize, usize)> = HashSet::new();
        let mut neighbors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
        for e in edges.iter().filter(|e| !e.is_self_loop()) {
            let (s, t) = (ids[e.source.as_str()], ids[e.target.as_str()]);
            arcs.insert((s, t));
            neighbors[s].insert(t);
            neighbors[t].insert(s);
        }

        let code_of = |a: usize, b: usize, c: usize| -> u8 {
            let nodes = [a, b, c];
            PAIRS
                .iter()
                .enumerate()
                .filter(|(_, &(i, j))| arcs.contains(&(nodes[i], nodes[j])))
                .fold(0u8, |acc, (bit, _)| acc | (1 << bit))
        };

        let mut counts = vec![0u64; MotifKind::Static.arity()];
        for (v, adj) in neighbors.iter().enumerate() {
            let adj: Vec<usize> = adj.iter().copied().collect();
            for (x, &u) in adj.iter().enumerate() {
                for &w in &adj[x + 1..] {
                    let closed = neighbors[u].contains(&w);
                    // A triangle is seen from all three centers; count it once.
                    if closed && (u < v || w < v) {
                        continue;
                    }
                    if let Some(col) = self.class_of[code_of(v, u, w) as usize] {
                        counts[col as usize] += 1;
                    }
                }
            }
        }
        counts
    }
}

impl FeatureExtractor for StaticMotifCounter {
    fn kind(&self) -> MotifKind {
        MotifKind::Static
    }

    fn extract(&self, sample: &SampleInput<'_>, _params: &ExtractParams) -> Result<Vec<u64>> {
        Ok(self.count(sample.edges))
    }
}
