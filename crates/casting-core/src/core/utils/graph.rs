use nalgebra::DMatrix;
use std::collections::VecDeque;

/// Builds adjacency lists linking every pair whose distance is at most `cutoff`.
///
/// Infinite entries (such as a masked diagonal) never produce an edge.
pub fn adjacency_within(distances: &DMatrix<f64>, cutoff: f64) -> Vec<Vec<usize>> {
    let n = distances.nrows();
    let mut adjacency = vec![Vec::new(); n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = distances[(i, j)];
            if d.is_finite() && d <= cutoff {
                adjacency[i].push(j);
                adjacency[j].push(i);
            }
        }
    }
    adjacency
}

/// Number of connected components of an undirected graph given as adjacency lists.
pub fn count_components(adjacency: &[Vec<usize>]) -> usize {
    let n = adjacency.len();
    let mut seen = vec![false; n];
    let mut queue = VecDeque::new();
    let mut components = 0;

    for start in 0..n {
        if seen[start] {
            continue;
        }
        components += 1;
        seen[start] = true;
        queue.push_back(start);
        while let Some(node) = queue.pop_front() {
            for &next in &adjacency[node] {
                if !seen[next] {
                    seen[next] = true;
                    queue.push_back(next);
                }
            }
        }
    }
    components
}
