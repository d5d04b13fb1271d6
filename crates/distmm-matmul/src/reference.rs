use crate::error::{check_dim, Result};
use crate::matrix::{Element, Matrix};

/// Single-process `A · B` by the textbook triple loop, used as the ground
/// truth when verifying distributed results.
pub fn serial_verify_reference(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    let n = a.dim();
    check_dim(n, b.dim())?;
    Ok(Matrix::from_fn(n, |i, j| {
        let mut sum: Element = 0;
        for k in 0..n {
            sum = sum.wrapping_add(a[(i, k)].wrapping_mul(b[(k, j)]));
        }
        sum
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let a = Matrix::from_rows(&[[1, 2], [3, 4]]).unwrap();
        let c = serial_verify_reference(&a, &Matrix::identity(2)).unwrap();
        assert_eq!(c, a);
    }

    #[test]
    fn test_small_product() {
        let a = Matrix::from_rows(&[[1, 2], [3, 4]]).unwrap();
        let b = Matrix::from_rows(&[[5, 6], [7, 8]]).unwrap();
        let c = serial_verify_reference(&a, &b).unwrap();
        assert_eq!(c.as_slice(), &[19, 22, 43, 50]);
    }

    #[test]
    fn test_dimension_mismatch() {
        assert!(serial_verify_reference(&Matrix::zeros(2), &Matrix::zeros(3)).is_err());
    }
}
