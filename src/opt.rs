//! Derivative-free optimisation of noisy, bounded objectives.

use std::ops::RangeInclusive;

use anyhow::bail;
use tracing::trace;

#[derive(Clone, Debug)]
pub struct UnivariateDescentConfig {
    pub init_value: f64,
    pub init_step: f64,
    pub min_step: f64,
    pub max_steps: u64,
    pub acceptable_residual: f64,
    pub bounds: RangeInclusive<f64>,
}
impl UnivariateDescentConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.min_step <= 0.0 {
            bail!("min step must be positive")
        }
        if self.init_step.abs() < self.min_step {
            bail!("initial step cannot be smaller than the min step")
        }
        if self.acceptable_residual < 0.0 {
            bail!("acceptable residual must be non-negative")
        }
        if self.bounds.is_empty() || !self.bounds.contains(&self.init_value) {
            bail!("initial value must lie within the bounds {:?}", self.bounds)
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct UnivariateDescentOutcome {
    pub steps: u64,
    pub optimal_value: f64,
    pub optimal_residual: f64,
}

/// Univariate, derivative-free search. Steps in one direction until the residual worsens, then
/// reverses and halves the step, terminating when the step falls below `min_step`, the residual
/// becomes acceptable, or `max_steps` is exhausted. Values are clamped to `bounds`.
pub fn univariate_descent(
    config: &UnivariateDescentConfig,
    mut loss_f: impl FnMut(f64) -> f64,
) -> Result<UnivariateDescentOutcome, anyhow::Error> {
    config.validate()?;

    let mut steps = 0;
    let mut residual = loss_f(config.init_value);
    if residual <= config.acceptable_residual {
        return Ok(UnivariateDescentOutcome {
            steps: 0,
            optimal_value: config.init_value,
            optimal_residual: residual,
        });
    }

    let (lower, upper) = (*config.bounds.start(), *config.bounds.end());
    let (mut value, mut step) = (config.init_value, config.init_step);
    let (mut optimal_value, mut optimal_residual) = (value, residual);
    while steps < config.max_steps {
        steps += 1;
        let new_value = f64::max(lower, f64::min(upper, value + step));
        let new_residual = loss_f(new_value);
        trace!("step: {steps}, value: {value}, residual: {residual}, step: {step}, new_value: {new_value}, new_residual: {new_residual}");

        if new_residual > residual || new_value == value {
            step = -step * 0.5;
            if step.abs() < config.min_step {
                break;
            }
        } else if new_residual < optimal_residual {
            optimal_residual = new_residual;
            optimal_value = new_value;

            if optimal_residual <= config.acceptable_residual {
                break;
            }
        }
        residual = new_residual;
        value = new_value;
    }
    Ok(UnivariateDescentOutcome {
        steps,
        optimal_value,
        optimal_residual,
    })
}

#[cfg(test)]
mod tests {
    use assert_float_eq::*;

    use super::*;

    fn config(init_value: f64, bounds: RangeInclusive<f64>) -> UnivariateDescentConfig {
        UnivariateDescentConfig {
            init_value,
            init_step: 0.1,
            min_step: 0.00001,
            max_steps: 100,
            acceptable_residual: 0.0,
            bounds,
        }
    }

    #[test]
    fn univariate_descent_sqrt() {
        let config = config(0.0, 0.0..=100.0);
        let outcome =
            univariate_descent(&config, |value| (81.0 - value.powi(2)).powi(2)).unwrap();
        assert_float_absolute_eq!(9.0, outcome.optimal_value, config.min_step);
    }

    #[test]
    fn univariate_descent_clamps_to_bounds() {
        let config = config(0.0, -1.0..=1.0);
        let outcome = univariate_descent(&config, |value| (value - 5.0).powi(2)).unwrap();
        assert_float_absolute_eq!(1.0, outcome.optimal_value, config.min_step);
        assert!(outcome.steps < config.max_steps);
    }

    #[test]
    fn univariate_descent_acceptable_at_start() {
        let config = UnivariateDescentConfig {
            acceptable_residual: 1.0,
            ..config(2.0, 0.0..=4.0)
        };
        let outcome = univariate_descent(&config, |value| (value - 2.5).powi(2)).unwrap();
        assert_eq!(0, outcome.steps);
        assert_eq!(2.0, outcome.optimal_value);
    }

    #[test]
    fn invalid_config() {
        let config = config(5.0, 0.0..=1.0);
        assert!(univariate_descent(&config, |value| value).is_err());
    }
}
