//! Linear predictors and (optionally penalised) least squares.

use anyhow::bail;
use linregress::fit_low_level_regression_model;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::linear::matrix::Matrix;

pub trait AsIndex {
    fn as_index(&self) -> usize;
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Display)]
pub enum Regressor<O: AsIndex> {
    Variable(O),
    Intercept,
}
impl<O: AsIndex> Regressor<O> {
    pub fn resolve(&self, input: &[f64]) -> f64 {
        match self {
            Regressor::Variable(variable) => input[variable.as_index()],
            Regressor::Intercept => 1.,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Regressor::Intercept)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predictor<O: AsIndex> {
    pub regressors: Vec<Regressor<O>>,
    pub coefficients: Vec<f64>,
}
impl<O: AsIndex> Predictor<O> {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        validate_regressors(&self.regressors)?;
        if self.regressors.len() != self.coefficients.len() {
            bail!("exactly one coefficient must be specified for each regressor");
        }
        Ok(())
    }

    /// The linear combination of the coefficients with the resolved regressors.
    pub fn predict(&self, input: &[f64]) -> f64 {
        self.regressors
            .iter()
            .zip(self.coefficients.iter())
            .map(|(regressor, coefficient)| coefficient * regressor.resolve(input))
            .sum()
    }

    /// Resolves every regressor against `input`, producing one row of a design matrix.
    pub fn design_row(regressors: &[Regressor<O>], input: &[f64], row: &mut [f64]) {
        debug_assert_eq!(regressors.len(), row.len());
        for (cell, regressor) in row.iter_mut().zip(regressors.iter()) {
            *cell = regressor.resolve(input);
        }
    }
}

pub(crate) fn validate_regressors<O: AsIndex>(
    regressors: &[Regressor<O>],
) -> Result<(), anyhow::Error> {
    if regressors.is_empty() {
        bail!("at least one regressor must be present");
    }
    let constants = regressors
        .iter()
        .filter(|regressor| regressor.is_constant())
        .count();
    if constants > 1 {
        bail!("at most one intercept may be specified");
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeastSquares {
    pub coefficients: Vec<f64>,
    pub std_errors: Vec<f64>,
}

/// Solves `min ‖y − Xβ‖² + Σ λⱼβⱼ²` for `β`.
///
/// The penalty is applied by augmenting the design with one pseudo-observation `√λⱼ·eⱼ` (with a
/// zero response) per penalised column, so that the ordinary solver in `linregress` yields the
/// ridge estimate. Columns with a zero penalty are left unconstrained.
pub fn least_squares(
    design: &Matrix<f64>,
    response: &[f64],
    penalties: &[f64],
) -> Result<LeastSquares, anyhow::Error> {
    if design.rows() != response.len() {
        bail!(
            "{} design rows do not match {} responses",
            design.rows(),
            response.len()
        );
    }
    if design.cols() < 2 {
        bail!("at least two design columns are required");
    }
    if penalties.len() != design.cols() {
        bail!("exactly one penalty must be specified for each column");
    }
    if penalties.iter().any(|&penalty| penalty < 0.0 || !penalty.is_finite()) {
        bail!("penalties must be finite and non-negative");
    }

    let cols = 1 + design.cols();
    let penalised = penalties.iter().filter(|&&penalty| penalty > 0.0).count();
    let rows = design.rows() + penalised;
    if rows <= design.cols() {
        bail!("insufficient observations ({rows}) for {} columns", design.cols());
    }

    let mut augmented = Matrix::allocate(rows, cols);
    for (row_index, row_data) in design.into_iter().enumerate() {
        let row = augmented.row_slice_mut(row_index);
        row[0] = response[row_index];
        row[1..].copy_from_slice(row_data);
    }
    let mut row_index = design.rows();
    for (col, &penalty) in penalties.iter().enumerate() {
        if penalty > 0.0 {
            augmented[(row_index, 1 + col)] = penalty.sqrt();
            row_index += 1;
        }
    }

    let model = fit_low_level_regression_model(augmented.flatten(), rows, cols)?;
    Ok(LeastSquares {
        coefficients: model.parameters().to_vec(),
        std_errors: model.se().to_vec(),
    })
}
