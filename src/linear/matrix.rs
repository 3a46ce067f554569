//! A dense, row-major matrix. Posterior draws, design matrices and feature tables are all stored
//! this way: one observation per row.

use std::ops::{Index, IndexMut};

#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T> {
    data: Vec<T>,
    rows: usize,
    cols: usize,
}
impl<T> Matrix<T> {
    pub fn allocate(rows: usize, cols: usize) -> Self
    where
        T: Default + Clone,
    {
        let (len, overflow) = rows.overflowing_mul(cols);
        assert!(!overflow, "allocation of a {rows}x{cols} matrix failed due to overflow");
        Self {
            data: vec![T::default(); len],
            rows,
            cols,
        }
    }

    /// An empty matrix with a fixed column count, grown with [`Matrix::push_row`].
    pub fn with_cols(cols: usize) -> Self {
        Self {
            data: vec![],
            rows: 0,
            cols,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn push_row(&mut self, row: &[T])
    where
        T: Clone,
    {
        assert_eq!(
            self.cols,
            row.len(),
            "row of length {} does not fit a matrix with {} columns",
            row.len(),
            self.cols
        );
        self.data.extend_from_slice(row);
        self.rows += 1;
    }

    pub fn row_slice(&self, row: usize) -> &[T] {
        debug_assert!(self.validate_row_index(row));
        let row_start = row * self.cols;
        &self.data[row_start..(row_start + self.cols)]
    }

    pub fn row_slice_mut(&mut self, row: usize) -> &mut [T] {
        debug_assert!(self.validate_row_index(row));
        let row_start = row * self.cols;
        &mut self.data[row_start..(row_start + self.cols)]
    }

    pub fn column(&self, col: usize) -> impl Iterator<Item = &T> + '_ {
        debug_assert!(self.validate_col_index(col));
        self.data.iter().skip(col).step_by(self.cols.max(1)).take(self.rows)
    }

    pub fn flatten(&self) -> &[T] {
        &self.data
    }

    pub fn flatten_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    fn validate_row_index(&self, row: usize) -> bool {
        assert!(row < self.rows, "invalid row index {row} for a {}x{} matrix", self.rows, self.cols);
        true
    }

    fn validate_col_index(&self, col: usize) -> bool {
        assert!(col < self.cols, "invalid column index {col} for a {}x{} matrix", self.rows, self.cols);
        true
    }
}

impl Matrix<f64> {
    /// Copies a column into a contiguous vector.
    pub fn column_vec(&self, col: usize) -> Vec<f64> {
        self.column(col).copied().collect()
    }

    /// Appends all rows of `other`, which must have the same number of columns.
    pub fn append(&mut self, other: &Matrix<f64>) {
        assert_eq!(self.cols, other.cols, "column counts do not match");
        self.data.extend_from_slice(&other.data);
        self.rows += other.rows;
    }
}

impl<T> Index<(usize, usize)> for Matrix<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: (usize, usize)) -> &Self::Output {
        let (row, col) = index;
        debug_assert!(self.validate_row_index(row));
        debug_assert!(self.validate_col_index(col));
        &self.data[row * self.cols + col]
    }
}

impl<T> IndexMut<(usize, usize)> for Matrix<T> {
    #[inline]
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Self::Output {
        let (row, col) = index;
        debug_assert!(self.validate_row_index(row));
        debug_assert!(self.validate_col_index(col));
        &mut self.data[row * self.cols + col]
    }
}

impl<T> Index<usize> for Matrix<T> {
    type Output = [T];

    #[inline]
    fn index(&self, row: usize) -> &Self::Output {
        self.row_slice(row)
    }
}

pub struct RowIter<'a, T> {
    matrix: &'a Matrix<T>,
    row: usize,
}
impl<'a, T> Iterator for RowIter<'a, T> {
    type Item = &'a [T];

    fn next(&mut self) -> Option<Self::Item> {
        if self.row == self.matrix.rows {
            None
        } else {
            let row_slice = self.matrix.row_slice(self.row);
            self.row += 1;
            Some(row_slice)
        }
    }
}

impl<'a, T> IntoIterator for &'a Matrix<T> {
    type Item = &'a [T];
    type IntoIter = RowIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        RowIter {
            matrix: self,
            row: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populate(matrix: &mut Matrix<f64>) {
        for row in 0..matrix.rows() {
            for col in 0..matrix.cols() {
                matrix[(row, col)] = (row * matrix.cols() + col) as f64 * 10.0;
            }
        }
    }

    #[test]
    fn index() {
        let mut matrix = Matrix::allocate(4, 3);
        populate(&mut matrix);
        assert_eq!(4, matrix.rows());
        assert_eq!(3, matrix.cols());
        assert_eq!(50.0, matrix[(1, 2)]);
        assert_eq!(&[30.0, 40.0, 50.0], &matrix[1]);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic = "invalid row index 4 for a 4x3 matrix"]
    fn row_overflow_panics() {
        let matrix = Matrix::<f64>::allocate(4, 3);
        let _ = matrix[(matrix.rows(), 0)];
    }

    #[test]
    #[should_panic]
    fn allocate_overflow_panics() {
        Matrix::<f64>::allocate(usize::MAX, 2);
    }

    #[test]
    fn column() {
        let mut matrix = Matrix::allocate(3, 2);
        populate(&mut matrix);
        assert_eq!(vec![10.0, 30.0, 50.0], matrix.column_vec(1));
    }

    #[test]
    fn push_and_iterate() {
        let mut matrix = Matrix::with_cols(2);
        assert!(matrix.is_empty());
        matrix.push_row(&[1.0, 2.0]);
        matrix.push_row(&[3.0, 4.0]);
        let rows: Vec<_> = matrix.into_iter().collect();
        assert_eq!(vec![&[1.0, 2.0][..], &[3.0, 4.0][..]], rows);
    }

    #[test]
    #[should_panic = "row of length 3 does not fit a matrix with 2 columns"]
    fn push_wrong_width_panics() {
        let mut matrix = Matrix::with_cols(2);
        matrix.push_row(&[1.0, 2.0, 3.0]);
    }

    #[test]
    fn append() {
        let mut first = Matrix::with_cols(2);
        first.push_row(&[1.0, 2.0]);
        let mut second = Matrix::with_cols(2);
        second.push_row(&[3.0, 4.0]);
        first.append(&second);
        assert_eq!(2, first.rows());
        assert_eq!(&[1.0, 2.0, 3.0, 4.0], first.flatten());
    }
}
