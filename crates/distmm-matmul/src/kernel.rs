//! Local multiply-accumulate on flat row-major buffers.

use crate::matrix::Element;

/// `c += a · b`, with `a` of shape `rows × inner`, `b` of shape
/// `inner × cols` and `c` of shape `rows × cols`.
///
/// Loops run in (i, k, j) order: `a[i][k]` is hoisted while a row of `b` and
/// a row of `c` are streamed, so `b` is never walked down a column.
/// Arithmetic wraps on overflow.
pub fn multiply_accumulate(
    a: &[Element],
    b: &[Element],
    c: &mut [Element],
    rows: usize,
    inner: usize,
    cols: usize,
) {
    debug_assert_eq!(a.len(), rows * inner);
    debug_assert_eq!(b.len(), inner * cols);
    debug_assert_eq!(c.len(), rows * cols);
    if rows == 0 || inner == 0 || cols == 0 {
        return;
    }

    for (a_row, c_row) in a.chunks_exact(inner).zip(c.chunks_exact_mut(cols)) {
        for (&a_ik, b_row) in a_row.iter().zip(b.chunks_exact(cols)) {
            for (c_ij, &b_kj) in c_row.iter_mut().zip(b_row) {
                *c_ij = c_ij.wrapping_add(a_ik.wrapping_mul(b_kj));
            }
        }
    }
}
