use highs::{HighsModelStatus, RowProblem, Sense};

use crate::domain::solver::{LpProblem, LpSolution, SolveError, Solver};

/// HiGHS solver implementation, behind the `highs-solver` feature.
pub struct HighsSolver;

impl HighsSolver {
    pub fn new() -> Self {
        HighsSolver
    }
}

impl Default for HighsSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for HighsSolver {
    fn solve(&self, problem: &LpProblem) -> Result<LpSolution, SolveError> {
        let mut model = RowProblem::new();

        let cols: Vec<highs::Col> = problem
            .costs
            .iter()
            .map(|&cost| model.add_column(cost, 0.0..))
            .collect();

        for (row, &rhs) in problem.rows.iter().zip(&problem.rhs) {
            let factors: Vec<(highs::Col, f64)> = cols
                .iter()
                .copied()
                .zip(row.iter().copied())
                .filter(|(_, coeff)| *coeff != 0.0)
                .collect();
            model.add_row(..=rhs, &factors);
        }

        let solved = model.optimise(Sense::Minimise).solve();

        match solved.status() {
            HighsModelStatus::Optimal => {}
            HighsModelStatus::Infeasible => return Err(SolveError::Infeasible),
            HighsModelStatus::Unbounded | HighsModelStatus::UnboundedOrInfeasible => {
                return Err(SolveError::Unbounded)
            }
            other => return Err(SolveError::Backend(format!("{other:?}"))),
        }

        let x = solved.get_solution().columns().to_vec();
        let objective = problem
            .costs
            .iter()
            .zip(&x)
            .map(|(cost, value)| cost * value)
            .sum();

        Ok(LpSolution { x, objective })
    }

    fn name(&self) -> &str {
        "HiGHS"
    }
}
