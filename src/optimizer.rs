//! Route ordering for a single stop group.
//!
//! Nearest-neighbour construction followed by 2-opt hill climbing over an open
//! path. Good enough for the small stop counts of one day; no optimality
//! guarantee beyond "never worse than nearest neighbour".

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::OptimizeError;
use crate::matrix::{Matrix, MatrixEntry};
use crate::model::Stop;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeOptions {
    /// Maximum number of 2-opt scans.
    pub max_two_opt_passes: usize,
    /// Keep the input order and only compute totals.
    pub preserve_order: bool,
    /// Move stops opening before `early_opening_cutoff` to the front.
    pub early_openings_first: bool,
    pub early_opening_cutoff: NaiveTime,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            max_two_opt_passes: 100,
            preserve_order: false,
            early_openings_first: false,
            early_opening_cutoff: NaiveTime::from_hms_opt(10, 0, 0).unwrap_or_default(),
        }
    }
}

/// An ordered route with totals summed from the matrix along its edges.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizedRoute {
    /// Input indices in visiting order.
    pub order: Vec<usize>,
    pub stops: Vec<Stop>,
    /// Matrix entry for each consecutive pair, `order.len() - 1` of them.
    pub edges: Vec<MatrixEntry>,
    pub total_distance_meters: u64,
    pub total_duration_secs: u64,
}

impl OptimizedRoute {
    /// Travel minutes between consecutive stops, rounded up.
    pub fn leg_minutes(&self) -> Vec<u32> {
        self.edges.iter().map(|edge| edge.duration_secs.div_ceil(60)).collect()
    }
}

/// Order `stops` to approximately minimise total travel duration.
///
/// Every off-diagonal matrix entry must be present; a gap is reported rather
/// than estimated.
pub fn optimize(
    stops: &[Stop],
    matrix: &Matrix,
    fixed_start: Option<usize>,
    options: &OptimizeOptions,
) -> Result<OptimizedRoute, OptimizeError> {
    let n = stops.len();
    if matrix.size() != n {
        return Err(OptimizeError::MatrixSizeMismatch {
            stops: n,
            matrix: matrix.size(),
        });
    }
    if let Some(index) = fixed_start
        && index >= n
    {
        return Err(OptimizeError::InvalidStart { index, len: n });
    }
    let start = fixed_start.unwrap_or(0);

    let order = match n {
        0 => Vec::new(),
        1 => vec![0],
        _ => {
            let costs = CostTable::from_matrix(matrix)?;
            if options.preserve_order {
                rotate_to_start((0..n).collect(), start)
            } else if n == 2 {
                vec![start, 1 - start]
            } else {
                let tour = nearest_neighbor(&costs, start);
                let nn_cost = costs.path_cost(&tour);
                let tour = two_opt(tour, &costs, options.max_two_opt_passes);
                debug!(stops = n, nn_cost, final_cost = costs.path_cost(&tour), "route optimized");
                tour
            }
        }
    };

    let order = if options.early_openings_first {
        early_openings_first(order, stops, fixed_start.is_some(), options.early_opening_cutoff)
    } else {
        order
    };

    build_route(order, stops, matrix)
}

/// Cost of visiting `order` on `matrix`, summed by duration and distance.
pub fn route_totals(order: &[usize], matrix: &Matrix) -> Result<(u64, u64), OptimizeError> {
    let mut duration = 0u64;
    let mut distance = 0u64;
    for pair in order.windows(2) {
        let entry = matrix
            .get(pair[0], pair[1])
            .ok_or(OptimizeError::MissingMatrixEntry {
                from: pair[0],
                to: pair[1],
            })?;
        duration += u64::from(entry.duration_secs);
        distance += u64::from(entry.distance_meters);
    }
    Ok((duration, distance))
}

fn build_route(
    order: Vec<usize>,
    stops: &[Stop],
    matrix: &Matrix,
) -> Result<OptimizedRoute, OptimizeError> {
    let mut edges = Vec::with_capacity(order.len().saturating_sub(1));
    for pair in order.windows(2) {
        let entry = matrix
            .get(pair[0], pair[1])
            .ok_or(OptimizeError::MissingMatrixEntry {
                from: pair[0],
                to: pair[1],
            })?;
        edges.push(entry);
    }
    let total_duration_secs = edges.iter().map(|edge| u64::from(edge.duration_secs)).sum();
    let total_distance_meters = edges.iter().map(|edge| u64::from(edge.distance_meters)).sum();

    Ok(OptimizedRoute {
        stops: order.iter().map(|&index| stops[index].clone()).collect(),
        order,
        edges,
        total_distance_meters,
        total_duration_secs,
    })
}

/// Dense duration costs, validated once so the search loops never see a gap.
struct CostTable {
    size: usize,
    costs: Vec<u64>,
}

impl CostTable {
    fn from_matrix(matrix: &Matrix) -> Result<Self, OptimizeError> {
        let size = matrix.size();
        let mut costs = vec![0; size * size];
        for from in 0..size {
            for to in 0..size {
                if from == to {
                    continue;
                }
                let entry = matrix
                    .get(from, to)
                    .ok_or(OptimizeError::MissingMatrixEntry { from, to })?;
                costs[from * size + to] = u64::from(entry.duration_secs);
            }
        }
        Ok(Self { size, costs })
    }

    fn cost(&self, from: usize, to: usize) -> u64 {
        self.costs[from * self.size + to]
    }

    fn path_cost(&self, tour: &[usize]) -> u64 {
        tour.windows(2).map(|pair| self.cost(pair[0], pair[1])).sum()
    }
}

fn rotate_to_start(mut order: Vec<usize>, start: usize) -> Vec<usize> {
    if let Some(position) = order.iter().position(|&index| index == start) {
        let stop = order.remove(position);
        order.insert(0, stop);
    }
    order
}

/// Greedy construction: always go to the closest unvisited stop. Ties go to the
/// lowest index.
fn nearest_neighbor(costs: &CostTable, start: usize) -> Vec<usize> {
    let n = costs.size;
    let mut visited = vec![false; n];
    let mut tour = Vec::with_capacity(n);
    let mut current = start;
    visited[current] = true;
    tour.push(current);

    while tour.len() < n {
        let mut nearest: Option<(usize, u64)> = None;
        for candidate in 0..n {
            if visited[candidate] {
                continue;
            }
            let cost = costs.cost(current, candidate);
            if nearest.is_none_or(|(_, best)| cost < best) {
                nearest = Some((candidate, cost));
            }
        }
        let Some((next, _)) = nearest else { break };
        visited[next] = true;
        tour.push(next);
        current = next;
    }

    tour
}

/// Cost change from reversing `tour[i+1..=j]`; positive means the reversal
/// is shorter. The path is open, so a segment ending at the last stop has no
/// outgoing edge.
fn two_opt_gain(tour: &[usize], i: usize, j: usize, costs: &CostTable) -> i64 {
    let a = tour[i];
    let b = tour[i + 1];
    let c = tour[j];
    let next = tour.get(j + 1).copied();

    let mut before = costs.cost(a, b) + next.map_or(0, |d| costs.cost(c, d));
    let mut after = costs.cost(a, c) + next.map_or(0, |d| costs.cost(b, d));

    // Inner edges change direction; they cancel out on symmetric matrices.
    for k in i + 1..j {
        before += costs.cost(tour[k], tour[k + 1]);
        after += costs.cost(tour[k + 1], tour[k]);
    }

    before as i64 - after as i64
}

/// 2-opt: reverse the first improving segment, then rescan from the start.
///
/// Position 0 is never moved, so a fixed start survives.
fn two_opt(mut tour: Vec<usize>, costs: &CostTable, max_passes: usize) -> Vec<usize> {
    let n = tour.len();
    if n < 3 {
        return tour;
    }

    let mut passes = 0;
    'scan: while passes < max_passes {
        passes += 1;
        for i in 0..n - 1 {
            for j in i + 2..n {
                if two_opt_gain(&tour, i, j, costs) > 0 {
                    tour[i + 1..=j].reverse();
                    continue 'scan;
                }
            }
        }
        break;
    }

    debug!(passes, "2-opt finished");
    tour
}

/// Stable partition: stops with an opening before `cutoff` first, in their
/// current relative order. A fixed start keeps position 0.
fn early_openings_first(
    order: Vec<usize>,
    stops: &[Stop],
    keep_first: bool,
    cutoff: NaiveTime,
) -> Vec<usize> {
    let is_early = |index: &usize| {
        stops[*index]
            .opening_hours
            .earliest_opening()
            .is_some_and(|open| open < cutoff)
    };
    let (head, rest) = if keep_first && !order.is_empty() {
        order.split_at(1)
    } else {
        order.split_at(0)
    };
    let (early, late): (Vec<usize>, Vec<usize>) = rest.iter().copied().partition(is_early);
    head.iter().copied().chain(early).chain(late).collect()
}
