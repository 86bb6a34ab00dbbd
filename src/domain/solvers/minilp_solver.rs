use minilp::{ComparisonOp, OptimizationDirection, Problem};

use crate::domain::solver::{LpProblem, LpSolution, SolveError, Solver};

/// Pure-Rust revised-simplex backend; the default.
pub struct MinilpSolver;

impl MinilpSolver {
    pub fn new() -> Self {
        MinilpSolver
    }
}

impl Default for MinilpSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for MinilpSolver {
    fn solve(&self, problem: &LpProblem) -> Result<LpSolution, SolveError> {
        let mut lp = Problem::new(OptimizationDirection::Minimize);

        let vars: Vec<minilp::Variable> = problem
            .costs
            .iter()
            .map(|&cost| lp.add_var(cost, (0.0, f64::INFINITY)))
            .collect();

        for (row, &rhs) in problem.rows.iter().zip(&problem.rhs) {
            let terms: Vec<(minilp::Variable, f64)> = vars
                .iter()
                .copied()
                .zip(row.iter().copied())
                .filter(|(_, coeff)| *coeff != 0.0)
                .collect();
            if terms.is_empty() {
                // All-zero row: 0 <= rhs is either vacuous or a contradiction.
                if rhs < 0.0 {
                    return Err(SolveError::Infeasible);
                }
                continue;
            }
            lp.add_constraint(terms.as_slice(), ComparisonOp::Le, rhs);
        }

        let solution = lp.solve().map_err(|e| match e {
            minilp::Error::Infeasible => SolveError::Infeasible,
            minilp::Error::Unbounded => SolveError::Unbounded,
        })?;

        Ok(LpSolution {
            x: vars.iter().map(|&v| solution[v]).collect(),
            objective: solution.objective(),
        })
    }

    fn name(&self) -> &str {
        "minilp"
    }
}
