//! Dijkstra's shortest path over a roadmap graph.
//!
//! Two implementations with identical contracts: a binary-heap version with
//! lazy deletion, and a heap-less O(V^2) scan. Both return a predecessor
//! array over all vertices and break distance ties towards the lowest vertex
//! index, so their outputs are comparable element by element.

use super::Graph;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Optional per-edge weight override; returning `None` removes the edge from
/// consideration. Used by the paths builder to penalise wall proximity.
pub type WeightFn<'a> = &'a dyn Fn(usize, usize) -> Option<f64>;

/// Heap entry; reverse ordering turns the max-heap into a min-heap. Equal
/// costs order by ascending vertex index.
#[derive(Clone, Copy, Debug)]
struct State {
    cost: f64,
    node: usize,
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.node == other.node
    }
}

impl Eq for State {}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn edge_weight<G: Graph + ?Sized>(
    graph: &G,
    i: usize,
    j: usize,
    weight_fn: Option<WeightFn>,
) -> Option<f64> {
    match weight_fn {
        Some(f) => f(i, j),
        None => graph.weight(i, j),
    }
}

/// Binary-heap Dijkstra with lazy deletion.
///
/// # Arguments
/// * `graph` - roadmap graph (non-negative edge weights)
/// * `start` - source vertex index
/// * `weight_fn` - optional edge-weight override
///
/// # Returns
/// Predecessor per vertex; `None` for the source and for unreachable
/// vertices.
pub fn dijkstra<G: Graph + ?Sized>(
    graph: &G,
    start: usize,
    weight_fn: Option<WeightFn>,
) -> Vec<Option<usize>> {
    let n = graph.num_vertices();
    let mut dist = vec![f64::INFINITY; n];
    let mut prev: Vec<Option<usize>> = vec![None; n];
    if start >= n {
        return prev;
    }
    dist[start] = 0.0;

    let mut heap = BinaryHeap::new();
    heap.push(State {
        cost: 0.0,
        node: start,
    });

    while let Some(State { cost, node }) = heap.pop() {
        if cost > dist[node] {
            continue;
        }

        for neighbour in graph.neighbours(node) {
            let Some(w) = edge_weight(graph, node, neighbour, weight_fn) else {
                continue;
            };
            let candidate = dist[node] + w;
            // strict improvement, or an equal-distance path from a lower
            // predecessor index (deterministic tie-break)
            let better = candidate < dist[neighbour]
                || (candidate == dist[neighbour]
                    && prev[neighbour].map(|p| node < p).unwrap_or(false));
            if better {
                dist[neighbour] = candidate;
                prev[neighbour] = Some(node);
                heap.push(State {
                    cost: candidate,
                    node: neighbour,
                });
            }
        }
    }

    prev
}

/// Heap-less Dijkstra: repeatedly scan for the unvisited vertex with the
/// smallest tentative distance. O(V^2), but allocation free apart from the
/// result vectors.
pub fn dijkstra_linear<G: Graph + ?Sized>(
    graph: &G,
    start: usize,
    weight_fn: Option<WeightFn>,
) -> Vec<Option<usize>> {
    let n = graph.num_vertices();
    let mut dist = vec![f64::INFINITY; n];
    let mut prev: Vec<Option<usize>> = vec![None; n];
    let mut visited = vec![false; n];
    if start >= n {
        return prev;
    }
    dist[start] = 0.0;

    for _ in 0..n {
        // lowest index wins ties by the strict `<` scan
        let mut best: Option<usize> = None;
        for v in 0..n {
            if visited[v] {
                continue;
            }
            match best {
                Some(b) if dist[v] >= dist[b] => {}
                _ => best = Some(v),
            }
        }
        let Some(u) = best else {
            break;
        };
        if dist[u].is_infinite() {
            break;
        }
        visited[u] = true;

        for neighbour in graph.neighbours(u) {
            let Some(w) = edge_weight(graph, u, neighbour, weight_fn) else {
                continue;
            };
            let candidate = dist[u] + w;
            let better = candidate < dist[neighbour]
                || (candidate == dist[neighbour]
                    && prev[neighbour].map(|p| u < p).unwrap_or(false));
            if better {
                dist[neighbour] = candidate;
                prev[neighbour] = Some(u);
            }
        }
    }

    prev
}

/// Walk a predecessor array back from `end` to `start`.
///
/// # Returns
/// The vertex sequence `start ..= end`, or `None` when `end` is not
/// reachable from `start`.
pub fn reconstruct_path(
    predecessors: &[Option<usize>],
    start: usize,
    end: usize,
) -> Option<Vec<usize>> {
    let mut path = vec![end];
    let mut current = end;
    while current != start {
        current = predecessors.get(current).copied().flatten()?;
        path.push(current);
    }
    path.reverse();
    Some(path)
}
