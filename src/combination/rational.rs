use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, Zero};

/// Solve `columns * x = target` exactly over the rationals.
///
/// Gaussian elimination with the pivot row chosen by largest absolute
/// numerator, which keeps intermediate fractions small. Rank-deficient
/// systems get their free variables set to zero; inconsistent systems still
/// return a candidate, which the caller rejects during whole-row
/// verification.
///
/// Returns `None` only for shape errors (no columns, or column/target
/// length mismatch).
#[must_use]
pub fn solve_exact(columns: &[Vec<BigInt>], target: &[BigInt]) -> Option<Vec<BigRational>> {
    let m = columns.len();
    let k = target.len();
    if m == 0 || k == 0 || columns.iter().any(|c| c.len() != k) {
        return None;
    }

    // Augmented k x (m+1) matrix
    let mut a: Vec<Vec<BigRational>> = (0..k)
        .map(|r| {
            let mut row: Vec<BigRational> = columns
                .iter()
                .map(|c| BigRational::from_integer(c[r].clone()))
                .collect();
            row.push(BigRational::from_integer(target[r].clone()));
            row
        })
        .collect();

    let mut pivot_row_of_col: Vec<Option<usize>> = vec![None; m];
    let mut next_row = 0;

    for col in 0..m {
        if next_row >= k {
            break;
        }
        // Pivot by largest absolute numerator
        let pivot = (next_row..k)
            .filter(|&r| !a[r][col].is_zero())
            .max_by(|&x, &y| a[x][col].numer().abs().cmp(&a[y][col].numer().abs()));
        let Some(pivot) = pivot else {
            continue; // free column
        };
        a.swap(next_row, pivot);

        let divisor = a[next_row][col].clone();
        for value in &mut a[next_row] {
            *value /= &divisor;
        }
        for r in 0..k {
            if r != next_row && !a[r][col].is_zero() {
                let factor = a[r][col].clone();
                for c in col..=m {
                    let delta = &factor * &a[next_row][c];
                    a[r][c] -= delta;
                }
            }
        }
        pivot_row_of_col[col] = Some(next_row);
        next_row += 1;
    }

    Some(
        pivot_row_of_col
            .iter()
            .map(|row| match row {
                Some(r) => a[*r][m].clone(),
                None => BigRational::zero(),
            })
            .collect(),
    )
}

/// Check `sum_i coeffs[i] * columns[i][r] == target[r]` for every row,
/// using exact rational arithmetic.
#[must_use]
pub fn verify_solution(
    columns: &[Vec<BigInt>],
    coeffs: &[BigRational],
    target: &[BigInt],
) -> bool {
    if columns.len() != coeffs.len() {
        return false;
    }
    for (r, expected) in target.iter().enumerate() {
        let mut acc = BigRational::zero();
        for (col, coeff) in columns.iter().zip(coeffs) {
            acc += coeff * BigRational::from_integer(col[r].clone());
        }
        if acc != BigRational::from_integer(expected.clone()) {
            return false;
        }
    }
    true
}
