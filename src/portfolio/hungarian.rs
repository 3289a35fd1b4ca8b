//! Minimum cost assignment (Kuhn-Munkres with potentials) and Murty's ranking of the k best
//! assignments.
//!
//! Matrices are `rows x cols` with `rows <= cols`. A cell costing [`FORBIDDEN`] or more can never
//! be part of a returned assignment.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use float_ord::FloatOrd;
use log::trace;
use ndarray::Array2;

/// Cost of a cell that may not be used
pub const FORBIDDEN: f64 = 1e15;

/// A complete assignment of every row to a distinct column
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// `columns[row]` is the column assigned to `row`
    pub columns: Vec<usize>,
    pub cost: f64,
}

fn allowed(cost: f64) -> bool {
    cost < FORBIDDEN / 2.0
}

/// Solves the assignment problem for `costs`, returning the cheapest assignment that avoids every
/// forbidden cell, or None if there is no such assignment.
pub fn solve(costs: &Array2<f64>) -> Option<Solution> {
    let (n, m) = costs.dim();
    if n > m {
        return None;
    }

    // Potentials and matching are 1-indexed; column 0 is a sentinel.
    let mut u = vec![0.0; n + 1];
    let mut v = vec![0.0; m + 1];
    let mut matched = vec![0usize; m + 1];
    let mut way = vec![0usize; m + 1];

    for row in 1..=n {
        matched[0] = row;
        let mut j0 = 0;
        let mut minv = vec![f64::INFINITY; m + 1];
        let mut used = vec![false; m + 1];

        loop {
            used[j0] = true;
            let i0 = matched[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0;

            for j in 1..=m {
                if used[j] {
                    continue;
                }
                let reduced = costs[[i0 - 1, j - 1]] - u[i0] - v[j];
                if reduced < minv[j] {
                    minv[j] = reduced;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }

            // Only reachable with non-finite costs
            if j1 == 0 {
                return None;
            }

            for j in 0..=m {
                if used[j] {
                    u[matched[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }

            j0 = j1;
            if matched[j0] == 0 {
                break;
            }
        }

        loop {
            let j1 = way[j0];
            matched[j0] = matched[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut columns = vec![0; n];
    for j in 1..=m {
        if matched[j] != 0 {
            columns[matched[j] - 1] = j - 1;
        }
    }

    let cells = columns.iter().enumerate().map(|(i, &j)| costs[[i, j]]);
    if !cells.clone().all(allowed) {
        return None;
    }

    Some(Solution {
        cost: cells.sum(),
        columns,
    })
}

/// A subproblem in Murty's partitioning: the constrained matrix and its best assignment
struct Node {
    costs: Array2<f64>,
    solution: Solution,
}

/// The `k` cheapest distinct assignments of `costs`, cheapest first.
///
/// Each returned solution is optimal within its partition of the solution space, so the sequence
/// is non-decreasing in cost and free of duplicates.
pub fn k_best(costs: &Array2<f64>, k: usize) -> Vec<Solution> {
    let mut ranked = Vec::with_capacity(k);
    if k == 0 {
        return ranked;
    }

    let first = match solve(costs) {
        Some(solution) => solution,
        None => return ranked,
    };

    let mut nodes = vec![Node {
        costs: costs.clone(),
        solution: first,
    }];
    // Ties are broken by creation order, which keeps the ranking deterministic.
    let mut queue = BinaryHeap::new();
    queue.push(Reverse((FloatOrd(nodes[0].solution.cost), 0usize)));

    while let Some(Reverse((_, idx))) = queue.pop() {
        let node = &nodes[idx];
        ranked.push(node.solution.clone());
        if ranked.len() == k {
            break;
        }

        let (rows, cols) = node.costs.dim();
        let columns = node.solution.columns.clone();
        let mut base = node.costs.clone();
        let mut children = Vec::new();

        for row in 0..rows {
            let col = columns[row];

            // Everything in the parent's partition except cells already fixed, minus this cell
            let mut child = base.clone();
            child[[row, col]] = FORBIDDEN;
            if let Some(solution) = solve(&child) {
                children.push(Node {
                    costs: child,
                    solution,
                });
            }

            // Fix (row, col) for the remaining children
            for j in 0..cols {
                if j != col {
                    base[[row, j]] = FORBIDDEN;
                }
            }
            for i in 0..rows {
                if i != row {
                    base[[i, col]] = FORBIDDEN;
                }
            }
        }

        trace!("partitioned node {} into {} children", idx, children.len());
        for child in children {
            queue.push(Reverse((FloatOrd(child.solution.cost), nodes.len())));
            nodes.push(child);
        }
    }

    ranked
}
