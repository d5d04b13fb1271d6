//! Square row-major integer matrices.

use std::ops::{Index, IndexMut};

use crate::error::{check_dim, Result};

/// Matrix element type.
pub type Element = i32;

/// An N×N matrix stored row-major in one contiguous buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    n: usize,
    data: Vec<Element>,
}

impl Matrix {
    pub fn zeros(n: usize) -> Self {
        Self::filled(n, 0)
    }

    pub fn filled(n: usize, value: Element) -> Self {
        Self {
            n,
            data: vec![value; n * n],
        }
    }

    pub fn identity(n: usize) -> Self {
        Self::from_fn(n, |i, j| Element::from(i == j))
    }

    pub fn from_fn(n: usize, mut f: impl FnMut(usize, usize) -> Element) -> Self {
        let mut data = Vec::with_capacity(n * n);
        for i in 0..n {
            for j in 0..n {
                data.push(f(i, j));
            }
        }
        Self { n, data }
    }

    /// Wrap a row-major buffer, which must hold exactly `n * n` elements.
    pub fn from_vec(n: usize, data: Vec<Element>) -> Result<Self> {
        check_dim(n * n, data.len())?;
        Ok(Self { n, data })
    }

    /// Build from nested rows; every row must be as long as there are rows.
    pub fn from_rows<R: AsRef<[Element]>>(rows: &[R]) -> Result<Self> {
        let n = rows.len();
        let mut data = Vec::with_capacity(n * n);
        for row in rows {
            let row = row.as_ref();
            check_dim(n, row.len())?;
            data.extend_from_slice(row);
        }
        Ok(Self { n, data })
    }

    /// Number of rows (and columns).
    pub fn dim(&self) -> usize {
        self.n
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn row(&self, i: usize) -> &[Element] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    pub fn as_slice(&self) -> &[Element] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Element] {
        &mut self.data
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = Element;

    fn index(&self, (i, j): (usize, usize)) -> &Element {
        &self.data[i * self.n + j]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut Element {
        &mut self.data[i * self.n + j]
    }
}
