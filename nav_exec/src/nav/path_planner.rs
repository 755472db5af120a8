//! Plans minimum length paths through an [`OccupancyGrid`], using an A* algorithm.
//!
//! The search is 8-connected. Orthogonal steps cost 1 and diagonal steps cost sqrt(2) (in cells),
//! and the heuristic is the straight line distance to the goal, which is consistent for this cost
//! model so the first time the goal is popped from the open set the path to it is optimal.
//!
//! Occupied cells are never entered, and the edge of the grid acts as a wall. Whether a diagonal
//! step may squeeze past occupied cells is set by the [`DiagonalPolicy`].
//!
//! When several open cells share the lowest total cost the one discovered first is expanded
//! first, so results are reproducible.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{cmp::Reverse, collections::BinaryHeap};

use log::{debug, trace};
use nalgebra::Point2;
use ndarray::Array2;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::map::{CellIndex, CellState, OccupancyGrid};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Neighbour offsets, orthogonal first then diagonal. The order fixes which equal-cost node is
/// discovered first.
const NEIGHBOURS: [(isize, isize); 8] = [
    (1, 0),
    (0, 1),
    (-1, 0),
    (0, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
    (1, -1),
];

// -----------------------------------------------------------------------------------------------
// STRUCTS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PathPlanner {
    params: PathPlannerParams,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathPlannerParams {
    /// Whether diagonal steps may pass between occupied cells.
    #[serde(default)]
    pub diagonal_policy: DiagonalPolicy,
}

/// A path through the grid, from the start cell to the goal cell inclusive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedPath {
    pub cells: Vec<CellIndex>,

    /// Total length of the path in cells
    pub cost_cells: f64,

    /// Number of cells expanded (closed) during the search
    pub num_expanded: usize,
}

/// An entry in the open set. Ordered by total cost then by discovery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct OpenNode {
    f_cost: OrderedFloat<f64>,
    seq: u64,
    cell: CellIndex,
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

/// Rule for diagonal steps between two cells which share a corner.
///
/// For a step from `(i, j)` to `(i + di, j + dj)` the flanking cells are `(i + di, j)` and
/// `(i, j + dj)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagonalPolicy {
    /// A diagonal step is blocked only when both flanking cells are occupied.
    AllowUnlessBothBlocked,

    /// A diagonal step is blocked when either flanking cell is occupied.
    NoCornerCutting,

    /// Diagonal steps ignore the flanking cells.
    Unrestricted,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, thiserror::Error)]
pub enum PlanError {
    #[error("No path exists between the start and goal cells")]
    PathNotFound,

    #[error("The start cell {0} is outside the grid")]
    StartOutsideGrid(CellIndex),

    #[error("The goal cell {0} is outside the grid")]
    GoalOutsideGrid(CellIndex),
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl PathPlanner {
    pub fn new(params: PathPlannerParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &PathPlannerParams {
        &self.params
    }

    /// Plans a shortest path from `start` to `goal` through the free cells of `grid`.
    ///
    /// The start cell itself may be occupied (the vehicle is already there), but the goal can
    /// only be reached by stepping into it, so an occupied goal gives
    /// [`PlanError::PathNotFound`]. If `start == goal` the single cell path is returned.
    pub fn plan(
        &self,
        grid: &OccupancyGrid,
        start: CellIndex,
        goal: CellIndex,
    ) -> Result<PlannedPath, PlanError> {
        if !grid.in_bounds(start) {
            return Err(PlanError::StartOutsideGrid(start));
        }
        if !grid.in_bounds(goal) {
            return Err(PlanError::GoalOutsideGrid(goal));
        }

        if start == goal {
            return Ok(PlannedPath {
                cells: vec![start],
                cost_cells: 0.0,
                num_expanded: 0,
            });
        }

        let dim = grid.cells().dim();

        // Cost from the start, parent links, and closed flags for each cell
        let mut g_costs = Array2::from_elem(dim, std::f64::INFINITY);
        let mut parents: Array2<Option<CellIndex>> = Array2::from_elem(dim, None);
        let mut closed = Array2::from_elem(dim, false);

        // Min-heap of open nodes, stale entries are skipped when popped
        let mut open = BinaryHeap::new();
        let mut num_pushed: u64 = 0;
        let mut num_expanded: usize = 0;

        g_costs[arr(start)] = 0.0;
        open.push(Reverse(OpenNode {
            f_cost: OrderedFloat(heuristic(start, goal)),
            seq: num_pushed,
            cell: start,
        }));

        while let Some(Reverse(node)) = open.pop() {
            let current = node.cell;

            if closed[arr(current)] {
                continue;
            }
            closed[arr(current)] = true;
            num_expanded += 1;

            if current == goal {
                let cells = reconstruct(&parents, start, goal);

                debug!(
                    "A* found a {} cell path from {} to {} after expanding {} cells",
                    cells.len(),
                    start,
                    goal,
                    num_expanded
                );

                return Ok(PlannedPath {
                    cells,
                    cost_cells: g_costs[arr(goal)],
                    num_expanded,
                });
            }

            let current_g = g_costs[arr(current)];

            for &(di, dj) in NEIGHBOURS.iter() {
                let neighbour = CellIndex::new(current.i + di, current.j + dj);

                // Outside the grid or occupied
                match grid.cell(neighbour) {
                    Some(CellState::Free) => (),
                    _ => continue,
                }

                if closed[arr(neighbour)] {
                    continue;
                }

                let is_diagonal = di != 0 && dj != 0;

                if is_diagonal && !self.diagonal_allowed(grid, current, di, dj) {
                    continue;
                }

                let step = if is_diagonal {
                    std::f64::consts::SQRT_2
                } else {
                    1.0
                };
                let tentative_g = current_g + step;

                if tentative_g < g_costs[arr(neighbour)] {
                    g_costs[arr(neighbour)] = tentative_g;
                    parents[arr(neighbour)] = Some(current);

                    num_pushed += 1;
                    open.push(Reverse(OpenNode {
                        f_cost: OrderedFloat(tentative_g + heuristic(neighbour, goal)),
                        seq: num_pushed,
                        cell: neighbour,
                    }));
                }
            }
        }

        debug!(
            "A* found no path from {} to {} after expanding {} cells",
            start, goal, num_expanded
        );

        Err(PlanError::PathNotFound)
    }

    /// Check whether the diagonal step `(di, dj)` from `from` is allowed by the policy.
    fn diagonal_allowed(
        &self,
        grid: &OccupancyGrid,
        from: CellIndex,
        di: isize,
        dj: isize,
    ) -> bool {
        let flank_i = grid.is_occupied(CellIndex::new(from.i + di, from.j));
        let flank_j = grid.is_occupied(CellIndex::new(from.i, from.j + dj));

        let allowed = match self.params.diagonal_policy {
            DiagonalPolicy::AllowUnlessBothBlocked => !(flank_i && flank_j),
            DiagonalPolicy::NoCornerCutting => !flank_i && !flank_j,
            DiagonalPolicy::Unrestricted => true,
        };

        if !allowed {
            trace!("Diagonal step ({}, {}) from {} blocked", di, dj, from);
        }

        allowed
    }
}

impl Default for DiagonalPolicy {
    fn default() -> Self {
        DiagonalPolicy::AllowUnlessBothBlocked
    }
}

impl PlannedPath {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The path as world waypoints (cell lower corners) in the given grid.
    pub fn world_points(&self, grid: &OccupancyGrid) -> Vec<Point2<f64>> {
        grid.path_indices_to_world(&self.cells)
    }
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Array index of a cell already known to be inside the grid.
fn arr(cell: CellIndex) -> [usize; 2] {
    [cell.i as usize, cell.j as usize]
}

/// Straight line distance between two cells, in cells.
fn heuristic(from: CellIndex, to: CellIndex) -> f64 {
    let di = (to.i - from.i) as f64;
    let dj = (to.j - from.j) as f64;

    (di * di + dj * dj).sqrt()
}

/// Walk the parent links back from the goal, then reverse to get a start to goal path.
fn reconstruct(
    parents: &Array2<Option<CellIndex>>,
    start: CellIndex,
    goal: CellIndex,
) -> Vec<CellIndex> {
    let mut cells = vec![goal];
    let mut current = goal;

    while current != start {
        match parents[arr(current)] {
            Some(p) => {
                cells.push(p);
                current = p;
            }
            None => break,
        }
    }

    cells.reverse();
    cells
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::map::GridParams;
    use nalgebra::Vector3;

    fn c(i: isize, j: isize) -> CellIndex {
        CellIndex::new(i, j)
    }

    /// Free grid of unit resolution at the origin.
    fn free_grid(width: usize, height: usize) -> OccupancyGrid {
        OccupancyGrid::from_params(&GridParams {
            resolution_m: 1.0,
            width,
            height,
            origin_m: [0.0, 0.0],
            height_thresh_m: 1.0,
        })
        .unwrap()
    }

    fn occupy(grid: &mut OccupancyGrid, cells: &[(isize, isize)]) {
        let points: Vec<_> = cells
            .iter()
            .map(|&(i, j)| Vector3::new(i as f64 + 0.5, j as f64 + 0.5, 2.0))
            .collect();
        grid.insert_points_world(&points);
    }

    fn planner(policy: DiagonalPolicy) -> PathPlanner {
        PathPlanner::new(PathPlannerParams {
            diagonal_policy: policy,
        })
    }

    /// Checks every step is a single 8-connected move into a free cell, and returns the
    /// euclidean length.
    fn check_path(grid: &OccupancyGrid, path: &PlannedPath) -> f64 {
        let mut length = 0.0;

        for pair in path.cells.windows(2) {
            let di = pair[1].i - pair[0].i;
            let dj = pair[1].j - pair[0].j;
            assert!(di.abs() <= 1 && dj.abs() <= 1 && (di, dj) != (0, 0));
            assert!(!grid.is_occupied(pair[1]), "path enters occupied {}", pair[1]);
            length += ((di * di + dj * dj) as f64).sqrt();
        }

        length
    }

    #[test]
    fn test_open_grid_is_diagonal() {
        let grid = free_grid(5, 5);
        let path = PathPlanner::new(Default::default())
            .plan(&grid, c(0, 0), c(4, 4))
            .unwrap();

        assert_eq!(path.cells, vec![c(0, 0), c(1, 1), c(2, 2), c(3, 3), c(4, 4)]);
        assert!((path.cost_cells - 4.0 * std::f64::consts::SQRT_2).abs() < 1e-12);
        assert!((check_path(&grid, &path) - 4.0 * std::f64::consts::SQRT_2).abs() < 1e-12);
    }

    #[test]
    fn test_routes_through_gap() {
        let mut grid = free_grid(5, 5);
        occupy(&mut grid, &[(2, 0), (2, 1), (2, 2), (2, 3)]);

        for &policy in &[
            DiagonalPolicy::AllowUnlessBothBlocked,
            DiagonalPolicy::NoCornerCutting,
            DiagonalPolicy::Unrestricted,
        ] {
            let path = planner(policy).plan(&grid, c(0, 0), c(4, 4)).unwrap();

            assert!(path.cells.contains(&c(2, 4)), "{:?}: {:?}", policy, path.cells);
            assert_eq!(path.cells.first(), Some(&c(0, 0)));
            assert_eq!(path.cells.last(), Some(&c(4, 4)));

            let length = check_path(&grid, &path);
            assert!((length - path.cost_cells).abs() < 1e-9);
        }
    }

    #[test]
    fn test_enclosed_goal_not_found() {
        let mut grid = free_grid(5, 5);
        occupy(&mut grid, &[(3, 3), (3, 4), (4, 3)]);

        for &policy in &[
            DiagonalPolicy::AllowUnlessBothBlocked,
            DiagonalPolicy::NoCornerCutting,
            DiagonalPolicy::Unrestricted,
        ] {
            assert_eq!(
                planner(policy).plan(&grid, c(0, 0), c(4, 4)),
                Err(PlanError::PathNotFound)
            );
        }
    }

    #[test]
    fn test_occupied_goal_not_found() {
        let mut grid = free_grid(5, 5);
        occupy(&mut grid, &[(4, 4)]);

        assert_eq!(
            PathPlanner::new(Default::default()).plan(&grid, c(0, 0), c(4, 4)),
            Err(PlanError::PathNotFound)
        );
    }

    #[test]
    fn test_wall_not_found() {
        let mut grid = free_grid(5, 5);
        occupy(&mut grid, &[(2, 0), (2, 1), (2, 2), (2, 3), (2, 4)]);

        assert_eq!(
            PathPlanner::new(Default::default()).plan(&grid, c(0, 2), c(4, 2)),
            Err(PlanError::PathNotFound)
        );
    }

    #[test]
    fn test_start_equals_goal() {
        let mut grid = free_grid(3, 3);

        let path = PathPlanner::new(Default::default())
            .plan(&grid, c(1, 1), c(1, 1))
            .unwrap();
        assert_eq!(path.cells, vec![c(1, 1)]);
        assert_eq!(path.cost_cells, 0.0);

        occupy(&mut grid, &[(1, 1)]);
        let path = PathPlanner::new(Default::default())
            .plan(&grid, c(1, 1), c(1, 1))
            .unwrap();
        assert_eq!(path.len(), 1);
    }

    #[test]
    fn test_occupied_start_can_leave() {
        let mut grid = free_grid(3, 1);
        occupy(&mut grid, &[(0, 0)]);

        let path = PathPlanner::new(Default::default())
            .plan(&grid, c(0, 0), c(2, 0))
            .unwrap();
        assert_eq!(path.cells, vec![c(0, 0), c(1, 0), c(2, 0)]);
    }

    #[test]
    fn test_outside_grid() {
        let grid = free_grid(3, 3);
        let p = PathPlanner::new(Default::default());

        assert_eq!(
            p.plan(&grid, c(-1, 0), c(2, 2)),
            Err(PlanError::StartOutsideGrid(c(-1, 0)))
        );
        assert_eq!(
            p.plan(&grid, c(0, 0), c(3, 2)),
            Err(PlanError::GoalOutsideGrid(c(3, 2)))
        );
    }

    #[test]
    fn test_diagonal_squeeze_between_two_occupied() {
        let mut grid = free_grid(2, 2);
        occupy(&mut grid, &[(1, 0), (0, 1)]);

        assert_eq!(
            planner(DiagonalPolicy::AllowUnlessBothBlocked).plan(&grid, c(0, 0), c(1, 1)),
            Err(PlanError::PathNotFound)
        );
        assert_eq!(
            planner(DiagonalPolicy::NoCornerCutting).plan(&grid, c(0, 0), c(1, 1)),
            Err(PlanError::PathNotFound)
        );
        assert_eq!(
            planner(DiagonalPolicy::Unrestricted)
                .plan(&grid, c(0, 0), c(1, 1))
                .unwrap()
                .cells,
            vec![c(0, 0), c(1, 1)]
        );
    }

    #[test]
    fn test_diagonal_past_single_corner() {
        let mut grid = free_grid(2, 2);
        occupy(&mut grid, &[(1, 0)]);

        assert_eq!(
            planner(DiagonalPolicy::AllowUnlessBothBlocked)
                .plan(&grid, c(0, 0), c(1, 1))
                .unwrap()
                .cells,
            vec![c(0, 0), c(1, 1)]
        );
        assert_eq!(
            planner(DiagonalPolicy::NoCornerCutting)
                .plan(&grid, c(0, 0), c(1, 1))
                .unwrap()
                .cells,
            vec![c(0, 0), c(0, 1), c(1, 1)]
        );
    }

    #[test]
    fn test_ties_broken_by_discovery_order() {
        // (0,0) -> (2,1) has two optimal paths of length 1 + sqrt(2). (1,0) is discovered before
        // (1,1), so the path through it is returned.
        let grid = free_grid(3, 3);
        let p = PathPlanner::new(Default::default());

        let first = p.plan(&grid, c(0, 0), c(2, 1)).unwrap();
        assert_eq!(first.cells, vec![c(0, 0), c(1, 0), c(2, 1)]);

        for _ in 0..5 {
            assert_eq!(p.plan(&grid, c(0, 0), c(2, 1)).unwrap(), first);
        }
    }

    #[test]
    fn test_optimal_around_obstacle() {
        let mut grid = free_grid(10, 10);
        // An L-shaped wall between start and goal
        occupy(
            &mut grid,
            &[(5, 2), (5, 3), (5, 4), (5, 5), (5, 6), (5, 7), (4, 7), (3, 7)],
        );

        let path = PathPlanner::new(Default::default())
            .plan(&grid, c(2, 4), c(8, 4))
            .unwrap();

        let length = check_path(&grid, &path);
        assert!((length - path.cost_cells).abs() < 1e-9);

        // Must go below the wall, the shortest way round is via (5, 1)
        assert!(path.cells.contains(&c(5, 1)));
        let expected = 3.0 * std::f64::consts::SQRT_2 * 2.0;
        assert!((path.cost_cells - expected).abs() < 1e-9, "{}", path.cost_cells);
    }

    #[test]
    fn test_params_from_toml() {
        let p: PathPlannerParams =
            util::params::from_str("diagonal_policy = \"NoCornerCutting\"").unwrap();
        assert_eq!(p.diagonal_policy, DiagonalPolicy::NoCornerCutting);

        let p: PathPlannerParams = util::params::from_str("").unwrap();
        assert_eq!(p.diagonal_policy, DiagonalPolicy::AllowUnlessBothBlocked);
    }
}
