use super::error::AssignmentError;
use nalgebra::DMatrix;

/// A minimum-cost bijection: row `r` is paired with column `columns[r]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub columns: Vec<usize>,
    pub cost: f64,
}

/// Solves the linear assignment problem for a square cost matrix.
pub trait AssignmentSolver: Send + Sync {
    fn solve(&self, cost: &DMatrix<f64>) -> Result<Assignment, AssignmentError>;
}

/// Hungarian (Kuhn-Munkres) solver with row/column potentials, O(n³).
///
/// Ties are resolved towards the lowest column index, which keeps results deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct HungarianSolver;

impl AssignmentSolver for HungarianSolver {
    fn solve(&self, cost: &DMatrix<f64>) -> Result<Assignment, AssignmentError> {
        let (rows, cols) = cost.shape();
        if rows != cols {
            return Err(AssignmentError::NotSquare { rows, cols });
        }
        if let Some((index, _)) = cost.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            // nalgebra stores column-major.
            return Err(AssignmentError::NonFinite {
                row: index % rows,
                col: index / rows,
            });
        }
        let n = rows;
        if n == 0 {
            return Ok(Assignment {
                columns: Vec::new(),
                cost: 0.0,
            });
        }

        // 1-based potentials; column 0 is a virtual sentinel.
        let mut u = vec![0.0; n + 1];
        let mut v = vec![0.0; n + 1];
        let mut row_of_col = vec![0usize; n + 1];
        let mut way = vec![0usize; n + 1];

        for row in 1..=n {
            row_of_col[0] = row;
            let mut col0 = 0;
            let mut min_slack = vec![f64::INFINITY; n + 1];
            let mut used = vec![false; n + 1];

            loop {
                used[col0] = true;
                let row0 = row_of_col[col0];
                let mut delta = f64::INFINITY;
                let mut col1 = 0;
                for col in 1..=n {
                    if used[col] {
                        continue;
                    }
                    let reduced = cost[(row0 - 1, col - 1)] - u[row0] - v[col];
                    if reduced < min_slack[col] {
                        min_slack[col] = reduced;
                        way[col] = col0;
                    }
                    if min_slack[col] < delta {
                        delta = min_slack[col];
                        col1 = col;
                    }
                }
                for col in 0..=n {
                    if used[col] {
                        u[row_of_col[col]] += delta;
                        v[col] -= delta;
                    } else {
                        min_slack[col] -= delta;
                    }
                }
                col0 = col1;
                if row_of_col[col0] == 0 {
                    break;
                }
            }

            loop {
                let col1 = way[col0];
                row_of_col[col0] = row_of_col[col1];
                col0 = col1;
                if col0 == 0 {
                    break;
                }
            }
        }

        let mut columns = vec![0; n];
        for col in 1..=n {
            columns[row_of_col[col] - 1] = col - 1;
        }
        let total = columns
            .iter()
            .enumerate()
            .map(|(r, &c)| cost[(r, c)])
            .sum::<f64>();
        Ok(Assignment {
            columns,
            cost: total,
        })
    }
}
