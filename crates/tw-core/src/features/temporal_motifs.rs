//! Native δ-temporal motif counter over three-edge, three-node motifs.
//!
//! Every index-ordered edge triple `e1 < e2 < e3` whose timestamps satisfy
//! `t3 - t1 <= δ` is an instance. Nodes are relabelled by first appearance:
//! `e1` becomes `0 -> 1`, the next unseen node becomes `2`. Instances that
//! need a fourth node or contain a self-loop are not counted. The pattern
//! column is `6 * pos(e2) + pos(e3)` where `pos` is the edge's position in
//! [`PAIRS`].

use tw_common::{EdgeRecord, Result};

use super::{ExtractParams, FeatureExtractor, MotifKind, SampleInput};

/// Ordered node pairs in column order.
pub const PAIRS: [(u8, u8); 6] = [(0, 1), (1, 0), (0, 2), (2, 0), (1, 2), (2, 1)];

/// Counts the 36 δ-temporal motif patterns.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalMotifCounter;

/// Node relabelling for one candidate instance.
struct Relabel<'e> {
    nodes: [Option<&'e str>; 3],
}

impl<'e> Relabel<'e> {
    fn new(first: &'e EdgeRecord) -> Self {
        Relabel {
            nodes: [Some(first.source.as_str()), Some(first.target.as_str()), None],
        }
    }

    fn label(&mut self, node: &'e str) -> Option<u8> {
        for (i, slot) in self.nodes.iter_mut().enumerate() {
            match *slot {
                Some(n) if n == node => return Some(i as u8),
                None => {
                    *slot = Some(node);
                    return Some(i as u8);
                }
                _ => {}
            }
        }
        None
    }

    fn pair(&mut self, edge: &'e EdgeRecord) -> Option<usize> {
        let s = self.label(edge.source.as_str())?;
        let t = self.label(edge.target.as_str())?;
        PAIRS.iter().position(|&p| p == (s, t))
    }
}

impl TemporalMotifCounter {
    pub fn new() -> Self {
        TemporalMotifCounter
    }

    /// Count motif instances completing within `delta_secs`.
    ///
    /// Edges are taken in timestamp order; ties keep input order.
    pub fn count(&self, edges: &[EdgeRecord], delta_secs: i64) -> Vec<u64> {
        let mut order: Vec<&EdgeRecord> = edges.iter().filter(|e| !e.is_self_loop()).collect();
        order.sort_by_key(|e| e.timestamp);

        let mut counts = vec![0u64; MotifKind::Temporal.arity()];
        let within =
            |a: &EdgeRecord, b: &EdgeRecord| b.timestamp.saturating_sub(a.timestamp) <= delta_secs;

        for (i, &e1) in order.iter().enumerate() {
            for (j, &e2) in order.iter().enumerate().skip(i + 1) {
                if !within(e1, e2) {
                    break;
                }
                for &e3 in &order[j + 1..] {
                    if !within(e1, e3) {
                        break;
                    }
                    let mut relabel = Relabel::new(e1);
                    let Some(a) = relabel.pair(e2) else { continue };
                    let Some(b) = relabel.pair(e3) else { continue };
                    counts[6 * a + b] += 1;
                }
            }
        }
        counts
    }
}

impl FeatureExtractor for TemporalMotifCounter {
    fn kind(&self) -> MotifKind {
        MotifKind::Temporal
    }

    fn extract(&self, sample: &SampleInput<'_>, params: &ExtractParams) -> Result<Vec<u64>> {
        Ok(self.count(sample.edges, params.delta_secs))
    }
}
