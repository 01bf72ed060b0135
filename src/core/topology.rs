//! Network topology generation.
//!
//! Every generator produces a symmetric 0/1 adjacency matrix with a zero
//! diagonal, stored row-major as a flat `n * n` buffer, plus a redundant edge
//! list (each undirected edge once, `i < j`). Randomized generators take the
//! caller's `Prng` so graphs are reproducible under a fixed seed.
//!
//! Probabilities are deliberately not range-checked: an out-of-range `p`
//! yields a degenerate (empty or complete) graph, never an error.

use crate::prng::Prng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How many rewiring candidates to try before leaving an edge in place.
const REWIRE_ATTEMPTS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TopologyKind {
    AllToAll,
    Random { p: f64 },
    SmallWorld { k: usize, beta: f64 },
    ScaleFree { m: usize },
    Ring { k: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DegreeStats {
    pub avg: f64,
    pub min: usize,
    pub max: usize,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Topology {
    n: usize,
    kind: TopologyKind,
    /// Row-major n*n coupling weights (0.0 or 1.0).
    adjacency: Vec<f64>,
    /// Undirected edge list, each edge once with i < j.
    edges: Vec<(usize, usize)>,
}

impl Topology {
    /// Every pair connected.
    pub fn all_to_all(n: usize) -> Self {
        let mut t = Self::empty(n, TopologyKind::AllToAll);
        for i in 0..n {
            for j in (i + 1)..n {
                t.set_edge(i, j);
            }
        }
        t.rebuild_edges();
        t
    }

    /// Erdos-Renyi: each unordered pair connected with probability `p`.
    pub fn random(n: usize, p: f64, rng: &mut Prng) -> Self {
        let mut t = Self::empty(n, TopologyKind::Random { p });
        for i in 0..n {
            for j in (i + 1)..n {
                if rng.gen_bool(p) {
                    t.set_edge(i, j);
                }
            }
        }
        t.rebuild_edges();
        t
    }

    /// Watts-Strogatz: ring lattice with `k/2` neighbor offsets per side,
    /// then each edge rewired with probability `beta`.
    ///
    /// Odd `k` drops one offset through integer division; `k >= n` degenerates
    /// toward dense coupling. Both behaviors are kept as observed in the
    /// reference dynamics rather than corrected.
    pub fn small_world(n: usize, k: usize, beta: f64, rng: &mut Prng) -> Self {
        let mut t = Self::empty(n, TopologyKind::SmallWorld { k, beta });
        if n > 1 {
            for i in 0..n {
                for off in 1..=(k / 2) {
                    let j = (i + off) % n;
                    if j != i {
                        t.set_edge(i, j);
                    }
                }
            }
        }
        t.rebuild_edges();

        // Rewiring pass: keep endpoint i, move the far end to a random
        // non-neighbor. Total edge count never changes; an edge whose
        // candidate search stalls is silently left in place.
        let snapshot = t.edges.clone();
        for (i, j) in snapshot {
            if !rng.gen_bool(beta) {
                continue;
            }
            for _ in 0..REWIRE_ATTEMPTS {
                let cand = rng.gen_range_usize(0, n);
                if cand == i || t.has_edge(i, cand) {
                    continue;
                }
                t.unset_edge(i, j);
                t.set_edge(i, cand);
                break;
            }
        }
        t.rebuild_edges();
        t
    }

    /// Barabasi-Albert preferential attachment: complete seed graph on
    /// `min(m + 1, n)` nodes, each later node attached to `min(m, existing)`
    /// distinct nodes chosen by cumulative-degree roulette.
    ///
    /// When the roulette fails to produce enough distinct targets within the
    /// pass, the remaining slots fall back to uniform-random picks. For small
    /// graphs this measurably skews the attachment distribution; it is kept
    /// because downstream presets rely on the qualitative behavior.
    pub fn scale_free(n: usize, m: usize, rng: &mut Prng) -> Self {
        let mut t = Self::empty(n, TopologyKind::ScaleFree { m });
        let seed = usize::min(m + 1, n);
        for i in 0..seed {
            for j in (i + 1)..seed {
                t.set_edge(i, j);
            }
        }

        let mut degree: Vec<usize> = (0..n).map(|i| t.degree(i)).collect();

        for v in seed..n {
            let want = usize::min(m, v);
            let mut chosen: Vec<usize> = Vec::with_capacity(want);

            let mut spins = 0usize;
            while chosen.len() < want && spins < want * 10 {
                spins += 1;
                let total: usize = degree[..v].iter().sum();
                if total == 0 {
                    break;
                }
                let mut ticket = rng.gen_range_usize(0, total);
                let mut pick = 0usize;
                for (c, &d) in degree[..v].iter().enumerate() {
                    if ticket < d {
                        pick = c;
                        break;
                    }
                    ticket -= d;
                }
                if !chosen.contains(&pick) {
                    chosen.push(pick);
                }
            }

            // Uniform fallback for whatever the roulette did not fill.
            let mut attempts = 0usize;
            while chosen.len() < want && attempts < REWIRE_ATTEMPTS {
                attempts += 1;
                let cand = rng.gen_range_usize(0, v);
                if !chosen.contains(&cand) {
                    chosen.push(cand);
                }
            }

            for &c in &chosen {
                t.set_edge(v, c);
                degree[v] += 1;
                degree[c] += 1;
            }
        }
        t.rebuild_edges();
        t
    }

    /// Ring lattice: each node connected to the `k` nodes clockwise from it
    /// (degree 2k when n > 2k), wrapping via modular arithmetic.
    pub fn ring(n: usize, k: usize) -> Self {
        let mut t = Self::empty(n, TopologyKind::Ring { k });
        if n > 1 {
            for i in 0..n {
                for off in 1..=k {
                    let j = (i + off) % n;
                    if j != i {
                        t.set_edge(i, j);
                    }
                }
            }
        }
        t.rebuild_edges();
        t
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn kind(&self) -> TopologyKind {
        self.kind
    }

    #[inline]
    pub fn weight(&self, i: usize, j: usize) -> f64 {
        self.adjacency[i * self.n + j]
    }

    pub fn adjacency(&self) -> &[f64] {
        &self.adjacency
    }

    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn has_edge(&self, i: usize, j: usize) -> bool {
        self.adjacency[i * self.n + j] != 0.0
    }

    pub fn degree(&self, i: usize) -> usize {
        self.adjacency[i * self.n..(i + 1) * self.n]
            .iter()
            .filter(|&&w| w != 0.0)
            .count()
    }

    pub fn degree_stats(&self) -> DegreeStats {
        if self.n == 0 {
            return DegreeStats {
                avg: 0.0,
                min: 0,
                max: 0,
            };
        }
        let mut min = usize::MAX;
        let mut max = 0usize;
        let mut sum = 0usize;
        for i in 0..self.n {
            let d = self.degree(i);
            min = min.min(d);
            max = max.max(d);
            sum += d;
        }
        DegreeStats {
            avg: sum as f64 / self.n as f64,
            min,
            max,
        }
    }

    fn empty(n: usize, kind: TopologyKind) -> Self {
        Self {
            n,
            kind,
            adjacency: vec![0.0; n * n],
            edges: Vec::new(),
        }
    }

    fn set_edge(&mut self, i: usize, j: usize) {
        self.adjacency[i * self.n + j] = 1.0;
        self.adjacency[j * self.n + i] = 1.0;
    }

    fn unset_edge(&mut self, i: usize, j: usize) {
        self.adjacency[i * self.n + j] = 0.0;
        self.adjacency[j * self.n + i] = 0.0;
    }

    fn rebuild_edges(&mut self) {
        self.edges.clear();
        for i in 0..self.n {
            for j in (i + 1)..self.n {
                if self.has_edge(i, j) {
                    self.edges.push((i, j));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_symmetric_zero_diag(t: &Topology) {
        let n = t.n();
        for i in 0..n {
            assert_eq!(t.weight(i, i), 0.0, "diagonal at {i}");
            for j in 0..n {
                assert_eq!(t.weight(i, j), t.weight(j, i), "asymmetry at ({i},{j})");
            }
        }
    }

    #[test]
    fn all_to_all_is_complete() {
        let t = Topology::all_to_all(10);
        assert_symmetric_zero_diag(&t);
        assert_eq!(t.edge_count(), 10 * 9 / 2);
        let nonzero = t.adjacency().iter().filter(|&&w| w != 0.0).count();
        assert_eq!(nonzero, 10 * 9);
    }

    #[test]
    fn random_degenerates_at_probability_bounds() {
        let mut rng = Prng::new(3);
        let empty = Topology::random(12, 0.0, &mut rng);
        assert_eq!(empty.edge_count(), 0);
        let full = Topology::random(12, 1.0, &mut rng);
        assert_eq!(full.edge_count(), 12 * 11 / 2);
        assert_symmetric_zero_diag(&full);
    }

    #[test]
    fn ring_has_uniform_degree() {
        let t = Topology::ring(20, 3);
        assert_symmetric_zero_diag(&t);
        for i in 0..20 {
            assert_eq!(t.degree(i), 6, "node {i}");
        }
        let stats = t.degree_stats();
        assert_eq!(stats.min, 6);
        assert_eq!(stats.max, 6);
    }

    #[test]
    fn small_world_preserves_edge_count() {
        let n = 30;
        let k = 4;
        let baseline = {
            let mut rng = Prng::new(5);
            Topology::small_world(n, k, 0.0, &mut rng).edge_count()
        };
        assert_eq!(baseline, n * (k / 2));
        for seed in [1u64, 2, 3, 4] {
            let mut rng = Prng::new(seed);
            let t = Topology::small_world(n, k, 0.6, &mut rng);
            assert_eq!(t.edge_count(), baseline, "seed {seed}");
            assert_symmetric_zero_diag(&t);
        }
    }

    #[test]
    fn small_world_odd_k_drops_an_offset() {
        let mut rng = Prng::new(9);
        let t = Topology::small_world(20, 5, 0.0, &mut rng);
        // k/2 rounds down: same ring as k = 4.
        assert_eq!(t.edge_count(), 20 * 2);
    }

    #[test]
    fn scale_free_edge_count_and_min_degree() {
        let n = 30;
        let m = 2;
        let mut rng = Prng::new(11);
        let t = Topology::scale_free(n, m, &mut rng);
        assert_symmetric_zero_diag(&t);
        // Complete seed on m+1 nodes, then m edges per added node.
        let seed = m + 1;
        assert_eq!(t.edge_count(), seed * (seed - 1) / 2 + (n - seed) * m);
        for i in 0..n {
            assert!(t.degree(i) >= m, "node {i} degree {}", t.degree(i));
        }
    }

    #[test]
    fn scale_free_tiny_graphs() {
        let mut rng = Prng::new(13);
        let t = Topology::scale_free(1, 3, &mut rng);
        assert_eq!(t.edge_count(), 0);
        let t = Topology::scale_free(2, 3, &mut rng);
        assert_eq!(t.edge_count(), 1);
    }
}
