use thiserror::Error;

use crate::assemble::DietLp;
use crate::domain::solver::{LpProblem, LpSolution, SolveError, Solver};
use crate::models::{ActiveConstraint, BoundKind};

/// Computed nutrient levels below this are a sign error in the constraint
/// assembly, not rounding noise.
pub const LEVEL_TOLERANCE: f64 = 1e-7;
/// A constraint whose slack is within this of zero is considered binding.
pub const SLACK_TOLERANCE: f64 = 1e-3;
/// Quantities below this many 100g servings are dropped from the basket.
pub const QUANTITY_EPSILON: f64 = 1e-3;

/// Which (nutrient, side) an inequality row stands for. Carried in parallel
/// with the constraint rows so slack interpretation is a lookup, never index
/// arithmetic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintTag {
    pub nutrient_id: String,
    pub bound: BoundKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DietSolution {
    /// Solved quantities in 100g-serving units, one per product.
    pub x: Vec<f64>,
    pub objective_value: f64,
    /// Achieved level of each constrained nutrient (`A . x`), in bound order.
    pub nutrient_levels: Vec<f64>,
    /// Per-constraint slack, parallel to `tags`.
    pub slack: Vec<f64>,
    pub tags: Vec<ConstraintTag>,
    /// Constraints whose slack is within tolerance of zero.
    pub active: Vec<ActiveConstraint>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizeError {
    #[error("no feasible diet for these constraints ({reason})")]
    NoSolution { reason: String },
    #[error("solver failure: {0}")]
    Solver(String),
}

/// Build the inequality blocks in their fixed stacking order: one row per
/// finite lower bound (negated into `<=` form) first, then one row per
/// finite upper bound, both in bound iteration order.
fn formulate(lp: &DietLp) -> (LpProblem, Vec<ConstraintTag>) {
    let n_rows = lp.lower.iter().flatten().count() + lp.upper.iter().flatten().count();
    let mut rows = Vec::with_capacity(n_rows);
    let mut rhs = Vec::with_capacity(n_rows);
    let mut tags = Vec::with_capacity(n_rows);

    for (i, bound) in lp.lower.iter().enumerate() {
        if let Some(lb) = bound {
            rows.push(lp.a[i].iter().map(|v| -v).collect());
            rhs.push(-lb);
            tags.push(ConstraintTag {
                nutrient_id: lp.nutrient_ids[i].clone(),
                bound: BoundKind::Lower,
            });
        }
    }
    for (i, bound) in lp.upper.iter().enumerate() {
        if let Some(ub) = bound {
            rows.push(lp.a[i].clone());
            rhs.push(*ub);
            tags.push(ConstraintTag {
                nutrient_id: lp.nutrient_ids[i].clone(),
                bound: BoundKind::Upper,
            });
        }
    }

    (
        LpProblem {
            costs: lp.costs.clone(),
            rows,
            rhs,
        },
        tags,
    )
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Solve the assembled program and derive the decision-ready result.
/// Infeasibility is an answer, not an error; only backend failures map to
/// `OptimizeError::Solver`.
pub fn optimize(lp: &DietLp, solver: &dyn Solver) -> Result<DietSolution, OptimizeError> {
    let (problem, tags) = formulate(lp);

    let solution = if problem.rows.is_empty() {
        // Every bound was open on both sides. The empty program is solved by
        // buying nothing, unless a negative cost makes it unbounded.
        if lp.costs.iter().any(|&c| c < 0.0) {
            return Err(OptimizeError::NoSolution {
                reason: SolveError::Unbounded.to_string(),
            });
        }
        LpSolution {
            x: vec![0.0; lp.num_products()],
            objective: 0.0,
        }
    } else {
        match solver.solve(&problem) {
            Ok(solution) => solution,
            Err(e @ (SolveError::Infeasible | SolveError::Unbounded)) => {
                return Err(OptimizeError::NoSolution {
                    reason: e.to_string(),
                })
            }
            Err(SolveError::Backend(message)) => return Err(OptimizeError::Solver(message)),
        }
    };

    let nutrient_levels: Vec<f64> = lp.a.iter().map(|row| dot(row, &solution.x)).collect();
    // A level below tolerance means the formulation itself is wrong; fail
    // loudly instead of clamping.
    assert!(
        nutrient_levels.iter().all(|&level| level >= -LEVEL_TOLERANCE),
        "negative nutrient level in solved diet: {nutrient_levels:?}"
    );
    debug_assert!({
        let recomputed = dot(&lp.costs, &solution.x);
        (solution.objective - recomputed).abs() <= 1e-4 * recomputed.abs().max(1.0)
    });

    let slack: Vec<f64> = problem
        .rows
        .iter()
        .zip(&problem.rhs)
        .map(|(row, rhs)| rhs - dot(row, &solution.x))
        .collect();

    let active: Vec<ActiveConstraint> = slack
        .iter()
        .zip(&tags)
        .filter(|(s, _)| s.abs() <= SLACK_TOLERANCE)
        .map(|(_, tag)| ActiveConstraint {
            nutrient_id: tag.nutrient_id.clone(),
            bound: tag.bound,
        })
        .collect();

    Ok(DietSolution {
        x: solution.x,
        objective_value: solution.objective,
        nutrient_levels,
        slack,
        tags,
        active,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::solvers::MinilpSolver;

    /// Two nutrients, three products: the reference instance used across the
    /// optimizer tests.
    fn reference_lp(lower: [Option<f64>; 2], upper: [Option<f64>; 2]) -> DietLp {
        DietLp {
            nutrient_ids: vec!["n0".to_string(), "n1".to_string()],
            a: vec![vec![10.0, 0.0, 5.0], vec![2.0, 3.0, 1.0]],
            lower: lower.to_vec(),
            upper: upper.to_vec(),
            costs: vec![1.0, 2.0, 0.5],
        }
    }

    #[test]
    fn test_minimum_cost_diet() {
        let lp = reference_lp([Some(20.0), None], [None, None]);
        let solution = optimize(&lp, &MinilpSolver::new()).unwrap();

        assert!((solution.objective_value - 2.0).abs() < 1e-6);
        // Product 2 contributes nothing to n0 and only costs; it stays out.
        assert!(solution.x[1].abs() < 1e-6);
        // The lower bound is met exactly at the optimum.
        assert!((solution.nutrient_levels[0] - 20.0).abs() < 1e-6);
        assert_eq!(
            solution.active,
            vec![ActiveConstraint {
                nutrient_id: "n0".to_string(),
                bound: BoundKind::Lower,
            }]
        );
    }

    #[test]
    fn test_stacking_order_and_slack_recovery() {
        // Both sides finite for both nutrients: rows must stack as
        // (n0 lower, n1 lower, n0 upper, n1 upper).
        let lp = reference_lp([Some(20.0), Some(0.0)], [Some(100.0), Some(50.0)]);
        let solution = optimize(&lp, &MinilpSolver::new()).unwrap();

        let tag = |id: &str, bound| ConstraintTag {
            nutrient_id: id.to_string(),
            bound,
        };
        assert_eq!(
            solution.tags,
            vec![
                tag("n0", BoundKind::Lower),
                tag("n1", BoundKind::Lower),
                tag("n0", BoundKind::Upper),
                tag("n1", BoundKind::Upper),
            ]
        );

        // Hand-computed at the optimum (levels n0 = 20, n1 = 4):
        // lower slacks are level - bound, upper slacks bound - level.
        let n1 = solution.nutrient_levels[1];
        let expected = [0.0, n1, 80.0, 50.0 - n1];
        for (got, want) in solution.slack.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "slack {got} != {want}");
        }
        assert_eq!(
            solution.active,
            vec![ActiveConstraint {
                nutrient_id: "n0".to_string(),
                bound: BoundKind::Lower,
            }]
        );
    }

    #[test]
    fn test_open_bound_matches_omitted_bound() {
        // A nutrient with neither side constrained must not change the
        // solution compared to leaving it out entirely.
        let with_open = reference_lp([Some(20.0), None], [None, None]);
        let without = DietLp {
            nutrient_ids: vec!["n0".to_string()],
            a: vec![vec![10.0, 0.0, 5.0]],
            lower: vec![Some(20.0)],
            upper: vec![None],
            costs: vec![1.0, 2.0, 0.5],
        };

        let a = optimize(&with_open, &MinilpSolver::new()).unwrap();
        let b = optimize(&without, &MinilpSolver::new()).unwrap();
        assert!((a.objective_value - b.objective_value).abs() < 1e-9);
        assert_eq!(a.x, b.x);
        assert_eq!(a.active, b.active);
    }

    #[test]
    fn test_tightening_makes_infeasible_loosening_restores() {
        // Feasible with a loose n1 cap...
        let loose = reference_lp([Some(20.0), None], [None, Some(10.0)]);
        assert!(optimize(&loose, &MinilpSolver::new()).is_ok());

        // ...but meeting n0 >= 20 forces at least 4 units of n1, so a cap of
        // 1 is infeasible.
        let tight = reference_lp([Some(20.0), None], [None, Some(1.0)]);
        match optimize(&tight, &MinilpSolver::new()) {
            Err(OptimizeError::NoSolution { reason }) => {
                assert!(reason.contains("infeasible"), "reason: {reason}")
            }
            other => panic!("expected no solution, got {other:?}"),
        }
    }

    #[test]
    fn test_solution_is_non_negative() {
        let lp = reference_lp([Some(20.0), Some(2.0)], [Some(100.0), None]);
        let solution = optimize(&lp, &MinilpSolver::new()).unwrap();
        assert!(solution.x.iter().all(|&q| q >= -1e-6));
        assert!(solution.nutrient_levels.iter().all(|&l| l >= -1e-6));
    }

    #[test]
    fn test_objective_matches_cost_dot_quantities() {
        let lp = reference_lp([Some(20.0), Some(5.0)], [None, Some(50.0)]);
        let solution = optimize(&lp, &MinilpSolver::new()).unwrap();
        let recomputed: f64 = lp
            .costs
            .iter()
            .zip(&solution.x)
            .map(|(c, q)| c * q)
            .sum();
        let tolerance = 1e-4 * recomputed.abs().max(1.0);
        assert!((solution.objective_value - recomputed).abs() <= tolerance);
    }

    #[test]
    fn test_all_bounds_open_buys_nothing() {
        let lp = reference_lp([None, None], [None, None]);
        let solution = optimize(&lp, &MinilpSolver::new()).unwrap();
        assert_eq!(solution.x, vec![0.0, 0.0, 0.0]);
        assert_eq!(solution.objective_value, 0.0);
        assert!(solution.active.is_empty());
        assert!(solution.slack.is_empty());
    }
}
