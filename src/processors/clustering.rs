//! HDBSCAN density-based clustering over the standardized feature space.
//!
//! The hierarchy is built the classic way:
//! - core distances from a `kiddo` KD-tree k-nearest-neighbor query
//! - a minimum spanning tree of the mutual reachability graph (Prim, with the
//!   per-step relaxation parallelized by `rayon`)
//! - a single-linkage dendrogram assembled with union-find
//! - a condensed cluster tree pruned at `min_cluster_size`
//! - leaf or excess-of-mass cluster selection
//!
//! # Example
//!
//! ```
//! use comoving_groups::config::ClusterSelection;
//! use comoving_groups::processors::clustering::{hdbscan, HdbscanParams};
//!
//! let params = HdbscanParams {
//!     min_cluster_size: 5,
//!     min_samples: 3,
//!     selection: ClusterSelection::Leaf,
//! };
//! let features = vec![[0.0f64; 6]; 3];
//! let labels = hdbscan(&features, &params).unwrap();
//! assert_eq!(labels, vec![-1, -1, -1]);
//! ```

use std::collections::HashMap;

use kiddo::{ImmutableKdTree, SquaredEuclidean};
use rayon::prelude::*;
use thiserror::Error;

use crate::config::{ClusterSelection, ClusteringConfig};
use crate::processors::features::{Feature, FEATURE_DIMS};

/// Label assigned to points outside every cluster.
pub const NOISE: i32 = -1;

/// Below this many points core distances come from a direct scan instead of
/// a KD-tree.
const BRUTE_FORCE_LIMIT: usize = 2048;

/// Errors raised by the clusterer.
#[derive(Debug, Error)]
pub enum ClusteringError {
    #[error("invalid clustering parameter: {0}")]
    InvalidParameter(String),
}

/// Result type for clustering operations.
pub type Result<T> = std::result::Result<T, ClusteringError>;

/// HDBSCAN hyper-parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HdbscanParams {
    /// Smallest group that can become a cluster
    pub min_cluster_size: usize,
    /// Neighbor count for the core distance, the point itself included
    pub min_samples: usize,
    pub selection: ClusterSelection,
}

impl HdbscanParams {
    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.min_cluster_size < 2 {
            return Err(ClusteringError::InvalidParameter(format!(
                "min_cluster_size must be >= 2, got {}",
                self.min_cluster_size
            )));
        }
        if self.min_samples < 1 {
            return Err(ClusteringError::InvalidParameter(
                "min_samples must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<&ClusteringConfig> for HdbscanParams {
    fn from(config: &ClusteringConfig) -> Self {
        Self {
            min_cluster_size: config.min_cluster_size,
            min_samples: config.min_samples,
            selection: config.selection,
        }
    }
}

/// Sequential union-find used to assemble the single-linkage dendrogram.
///
/// Holds `2n - 1` slots: the `n` points followed by one node per merge.
/// Roots are always the most recently created merge node of their set.
struct LinkageUnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
    next_label: usize,
}

impl LinkageUnionFind {
    fn new(n: usize) -> Self {
        let slots = 2 * n - 1;
        let mut size = vec![0; slots];
        size[..n].fill(1);
        Self {
            parent: (0..slots).collect(),
            size,
            next_label: n,
        }
    }

    /// Find the root of `x`, compressing the path behind it.
    fn find(&mut self, mut x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[x] != root {
            let next = self.parent[x];
            self.parent[x] = root;
            x = next;
        }
        root
    }

    /// Merge two roots under a fresh node and return its size.
    fn union(&mut self, a: usize, b: usize) -> usize {
        let node = self.next_label;
        self.parent[a] = node;
        self.parent[b] = node;
        self.size[node] = self.size[a] + self.size[b];
        self.next_label += 1;
        self.size[node]
    }
}

/// One merge of the single-linkage dendrogram. Merge `i` creates node `n + i`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub distance: f64,
    pub size: usize,
}

/// One edge of the condensed tree: a point or a sub-cluster leaving `parent`
/// at density `lambda = 1 / distance`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CondensedEdge {
    pub parent: usize,
    pub child: usize,
    pub lambda: f64,
    pub child_size: usize,
}

#[inline]
fn euclidean(a: &Feature, b: &Feature) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Distance from each point to its `min_samples`-th nearest other point.
///
/// The point itself is not counted. With fewer than `min_samples` other
/// points the farthest one is used.
pub fn core_distances(features: &[Feature], min_samples: usize) -> Vec<f64> {
    let n = features.len();
    if n == 0 {
        return Vec::new();
    }
    // every query finds itself at distance 0 first
    let k = (min_samples + 1).min(n);

    if n <= BRUTE_FORCE_LIMIT {
        return features
            .par_iter()
            .map(|query| {
                let mut dists: Vec<f64> = features.iter().map(|p| euclidean(query, p)).collect();
                let (_, kth, _) = dists.select_nth_unstable_by(k - 1, |a, b| a.total_cmp(b));
                *kth
            })
            .collect();
    }

    let tree: ImmutableKdTree<f64, FEATURE_DIMS> = ImmutableKdTree::new_from_slice(features);

    features
        .par_iter()
        .map(|query| {
            tree.nearest_n::<SquaredEuclidean>(query, k)
                .last()
                .map(|nn| nn.distance.sqrt())
                .unwrap_or(0.0)
        })
        .collect()
}

/// Minimum spanning tree of the mutual reachability graph.
///
/// The mutual reachability distance between `a` and `b` is
/// `max(core[a], core[b], d(a, b))`. Returns `n - 1` edges `(a, b, weight)`
/// in the order Prim's algorithm adds them, starting from point 0.
pub fn mutual_reachability_mst(features: &[Feature], core: &[f64]) -> Vec<(usize, usize, f64)> {
    let n = features.len();
    if n < 2 {
        return Vec::new();
    }

    let mut in_tree = vec![false; n];
    let mut best = vec![f64::INFINITY; n];
    let mut edges = Vec::with_capacity(n - 1);
    let mut current = 0usize;

    for _ in 1..n {
        in_tree[current] = true;
        let current_point = &features[current];
        let current_core = core[current];

        best.par_iter_mut().enumerate().for_each(|(j, best_j)| {
            if in_tree[j] {
                return;
            }
            let reach = euclidean(current_point, &features[j])
                .max(current_core)
                .max(core[j]);
            if reach < *best_j {
                *best_j = reach;
            }
        });

        // first minimum wins, so ties resolve by index
        let next = best
            .par_iter()
            .enumerate()
            .filter(|(j, _)| !in_tree[*j])
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(j, &w)| (j, w));

        let Some((next, weight)) = next else { break };
        edges.push((current, next, weight));
        current = next;
    }

    edges
}

/// Build the single-linkage dendrogram from spanning tree edges.
pub fn single_linkage(n: usize, mut mst: Vec<(usize, usize, f64)>) -> Vec<Merge> {
    if n < 2 {
        return Vec::new();
    }
    mst.sort_by(|a, b| a.2.total_cmp(&b.2));

    let mut uf = LinkageUnionFind::new(n);
    let mut merges = Vec::with_capacity(n - 1);

    for (a, b, distance) in mst {
        let left = uf.find(a);
        let right = uf.find(b);
        let size = uf.union(left, right);
        merges.push(Merge {
            left,
            right,
            distance,
            size,
        });
    }

    merges
}

/// Breadth-first node order of the dendrogram below `root`.
fn dendrogram_bfs(merges: &[Merge], n: usize, root: usize) -> Vec<usize> {
    let mut order = Vec::new();
    let mut level = vec![root];
    while !level.is_empty() {
        order.extend_from_slice(&level);
        level = level
            .iter()
            .filter(|&&node| node >= n)
            .flat_map(|&node| {
                let m = &merges[node - n];
                [m.left, m.right]
            })
            .collect();
    }
    order
}

#[inline]
fn node_size(merges: &[Merge], n: usize, node: usize) -> usize {
    if node >= n {
        merges[node - n].size
    } else {
        1
    }
}

/// Condense the dendrogram: splits where both sides hold at least
/// `min_cluster_size` points create two new clusters, anything smaller falls
/// out of its parent as individual points.
///
/// Points keep their indices `0..n`; the root cluster is `n` and new clusters
/// are numbered upward from `n + 1`.
pub fn condense_tree(merges: &[Merge], n: usize, min_cluster_size: usize) -> Vec<CondensedEdge> {
    if merges.is_empty() {
        return Vec::new();
    }

    let root = 2 * (n - 1);
    let mut relabel = vec![0usize; root + 1];
    let mut ignore = vec![false; root + 1];
    let mut next_label = n + 1;
    relabel[root] = n;

    let mut edges = Vec::with_capacity(2 * n);

    for node in dendrogram_bfs(merges, n, root) {
        if ignore[node] || node < n {
            continue;
        }

        let m = merges[node - n];
        let lambda = if m.distance > 0.0 {
            1.0 / m.distance
        } else {
            f64::INFINITY
        };
        let parent = relabel[node];
        let left_count = node_size(merges, n, m.left);
        let right_count = node_size(merges, n, m.right);
        let left_big = left_count >= min_cluster_size;
        let right_big = right_count >= min_cluster_size;

        let fall_out = |side: usize, ignore: &mut [bool], edges: &mut Vec<CondensedEdge>| {
            for sub in dendrogram_bfs(merges, n, side) {
                if sub < n {
                    edges.push(CondensedEdge {
                        parent,
                        child: sub,
                        lambda,
                        child_size: 1,
                    });
                }
                ignore[sub] = true;
            }
        };

        match (left_big, right_big) {
            (true, true) => {
                for (side, count) in [(m.left, left_count), (m.right, right_count)] {
                    relabel[side] = next_label;
                    edges.push(CondensedEdge {
                        parent,
                        child: next_label,
                        lambda,
                        child_size: count,
                    });
                    next_label += 1;
                }
            }
            (false, false) => {
                fall_out(m.left, &mut ignore, &mut edges);
                fall_out(m.right, &mut ignore, &mut edges);
            }
            (false, true) => {
                relabel[m.right] = parent;
                fall_out(m.left, &mut ignore, &mut edges);
            }
            (true, false) => {
                relabel[m.left] = parent;
                fall_out(m.right, &mut ignore, &mut edges);
            }
        }
    }

    edges
}

/// Stability of every condensed cluster, keyed by cluster id.
///
/// Stability is the sum over members of `lambda_leave - lambda_birth`, each
/// member weighted by the number of points it carries.
pub fn cluster_stability(tree: &[CondensedEdge]) -> HashMap<usize, f64> {
    let mut stability = HashMap::new();
    let Some(root) = tree.iter().map(|e| e.parent).min() else {
        return stability;
    };

    let mut birth: HashMap<usize, f64> = HashMap::new();
    birth.insert(root, 0.0);
    for edge in tree.iter().filter(|e| e.child_size > 1) {
        birth.insert(edge.child, edge.lambda);
    }

    for edge in tree {
        let born = birth.get(&edge.parent).copied().unwrap_or(0.0);
        *stability.entry(edge.parent).or_insert(0.0) +=
            (edge.lambda - born) * edge.child_size as f64;
    }
    for &cluster in birth.keys() {
        stability.entry(cluster).or_insert(0.0);
    }

    stability
}

/// Pick the clusters to report. The root is never selected.
pub fn select_clusters(tree: &[CondensedEdge], selection: ClusterSelection) -> Vec<usize> {
    let Some(root) = tree.iter().map(|e| e.parent).min() else {
        return Vec::new();
    };

    let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
    for edge in tree.iter().filter(|e| e.child_size > 1) {
        children.entry(edge.parent).or_default().push(edge.child);
    }
    let mut clusters: Vec<usize> = tree
        .iter()
        .filter(|e| e.child_size > 1)
        .map(|e| e.child)
        .collect();
    clusters.sort_unstable();

    let mut selected: Vec<usize> = match selection {
        ClusterSelection::Leaf => clusters
            .iter()
            .copied()
            .filter(|c| !children.contains_key(c))
            .collect(),
        ClusterSelection::ExcessOfMass => {
            let mut stability = cluster_stability(tree);
            let mut is_selected: HashMap<usize, bool> =
                clusters.iter().map(|&c| (c, true)).collect();

            // children always carry larger ids than their parent
            for &node in clusters.iter().rev() {
                let subtree: f64 = children
                    .get(&node)
                    .map(|kids| kids.iter().map(|k| stability[k]).sum())
                    .unwrap_or(0.0);
                if subtree > stability[&node] {
                    is_selected.insert(node, false);
                    stability.insert(node, subtree);
                } else {
                    let mut stack: Vec<usize> =
                        children.get(&node).cloned().unwrap_or_default();
                    while let Some(sub) = stack.pop() {
                        is_selected.insert(sub, false);
                        if let Some(kids) = children.get(&sub) {
                            stack.extend_from_slice(kids);
                        }
                    }
                }
            }

            clusters
                .iter()
                .copied()
                .filter(|c| is_selected[c])
                .collect()
        }
    };

    selected.retain(|&c| c != root);
    selected.sort_unstable();
    selected
}

/// Assign each point the dense label of the selected cluster it descends
/// from, or [`NOISE`].
pub fn label_points(tree: &[CondensedEdge], selected: &[usize], n: usize) -> Vec<i32> {
    let mut labels = vec![NOISE; n];
    let Some(root) = tree.iter().map(|e| e.parent).min() else {
        return labels;
    };

    let cluster_label: HashMap<usize, i32> = selected
        .iter()
        .enumerate()
        .map(|(i, &c)| (c, i as i32))
        .collect();
    let cluster_parent: HashMap<usize, usize> = tree
        .iter()
        .filter(|e| e.child_size > 1)
        .map(|e| (e.child, e.parent))
        .collect();

    for edge in tree.iter().filter(|e| e.child < n) {
        let mut cluster = edge.parent;
        loop {
            if let Some(&label) = cluster_label.get(&cluster) {
                labels[edge.child] = label;
                break;
            }
            if cluster == root {
                break;
            }
            match cluster_parent.get(&cluster) {
                Some(&up) => cluster = up,
                None => break,
            }
        }
    }

    labels
}

/// Run HDBSCAN over a feature matrix.
///
/// # Arguments
///
/// * `features` - One standardized row per point
/// * `params` - Minimum cluster size, minimum samples and selection method
///
/// # Returns
///
/// One label per point: `0..K` for the `K` clusters found, [`NOISE`] otherwise.
/// Label values carry no ordering meaning beyond being stable for identical
/// input.
///
/// # Errors
///
/// Returns [`ClusteringError::InvalidParameter`] for out-of-range parameters.
pub fn hdbscan(features: &[Feature], params: &HdbscanParams) -> Result<Vec<i32>> {
    params.validate()?;

    let n = features.len();
    if n < 2 {
        return Ok(vec![NOISE; n]);
    }

    let core = core_distances(features, params.min_samples);
    log::debug!("hdbscan: core distances computed for {} points", n);

    let mst = mutual_reachability_mst(features, &core);
    let merges = single_linkage(n, mst);
    let tree = condense_tree(&merges, n, params.min_cluster_size);
    let selected = select_clusters(&tree, params.selection);
    log::debug!(
        "hdbscan: condensed tree has {} edges, {} clusters selected",
        tree.len(),
        selected.len()
    );

    Ok(label_points(&tree, &selected, n))
}

/// Count points per label.
pub fn label_counts(labels: &[i32]) -> HashMap<i32, usize> {
    let mut counts = HashMap::new();
    for &label in labels {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}
