//! Small dense linear solve for simultaneous contact impulses

use crate::consts::PIVOT_EPSILON;

/// Row-major square matrix
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    n: usize,
    data: Vec<f64>,
}

impl DenseMatrix {
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![0.0; n * n],
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.n + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.n + col] = value;
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for col in 0..self.n {
            self.data.swap(a * self.n + col, b * self.n + col);
        }
    }
}

/// Gaussian elimination with partial pivoting
///
/// Returns `None` when the system is (numerically) singular.
pub fn solve(mut a: DenseMatrix, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = a.size();
    assert_eq!(b.len(), n, "right-hand side does not match matrix size");

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&i, &j| a.get(i, col).abs().total_cmp(&a.get(j, col).abs()))
            .unwrap_or(col);
        if a.get(pivot_row, col).abs() < PIVOT_EPSILON {
            return None;
        }
        a.swap_rows(col, pivot_row);
        b.swap(col, pivot_row);

        let pivot = a.get(col, col);
        for row in col + 1..n {
            let factor = a.get(row, col) / pivot;
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                let v = a.get(row, k) - factor * a.get(col, k);
                a.set(row, k, v);
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a.get(row, k) * x[k]).sum();
        x[row] = (b[row] - tail) / a.get(row, row);
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[&[f64]]) -> DenseMatrix {
        let mut m = DenseMatrix::zeros(rows.len());
        for (i, row) in rows.iter().enumerate() {
            for (j, v) in row.iter().enumerate() {
                m.set(i, j, *v);
            }
        }
        m
    }

    #[test]
    fn test_solve_2x2() {
        let a = matrix(&[&[2.0, 1.0], &[1.0, 3.0]]);
        let x = solve(a, vec![3.0, 5.0]).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_solve_needs_pivoting() {
        // Zero on the first diagonal entry
        let a = matrix(&[&[0.0, 1.0, 2.0], &[1.0, 0.0, 3.0], &[4.0, -3.0, 8.0]]);
        let x = solve(a, vec![1.0, 2.0, 3.0]).unwrap();
        let check = matrix(&[&[0.0, 1.0, 2.0], &[1.0, 0.0, 3.0], &[4.0, -3.0, 8.0]]);
        for row in 0..3 {
            let lhs: f64 = (0..3).map(|k| check.get(row, k) * x[k]).sum();
            assert!((lhs - [1.0, 2.0, 3.0][row]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_singular_is_none() {
        let a = matrix(&[&[1.0, 2.0], &[2.0, 4.0]]);
        assert!(solve(a, vec![1.0, 2.0]).is_none());
    }

    #[test]
    fn test_empty_system() {
        assert_eq!(solve(DenseMatrix::zeros(0), Vec::new()), Some(Vec::new()));
    }
}
