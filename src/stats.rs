//! Summary statistics over slices of samples.

pub trait SliceExt {
    fn sum(&self) -> f64;
    fn mean(&self) -> f64;
    fn variance(&self) -> f64;
    fn stdev(&self) -> f64;
    fn std_error(&self) -> f64;
    fn quantile(&self, q: f64) -> f64;
}
impl SliceExt for [f64] {
    fn sum(&self) -> f64 {
        self.iter().sum()
    }

    fn mean(&self) -> f64 {
        self.sum() / self.len() as f64
    }

    /// Sample variance, with Bessel's correction. Zero for fewer than two samples.
    fn variance(&self) -> f64 {
        if self.len() < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let sum_sq: f64 = self.iter().map(|&value| (value - mean).powi(2)).sum();
        sum_sq / (self.len() - 1) as f64
    }

    fn stdev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Standard error of the mean: `sqrt(variance / n)`.
    fn std_error(&self) -> f64 {
        (self.variance() / self.len() as f64).sqrt()
    }

    /// Empirical quantile by nearest rank on a sorted copy.
    fn quantile(&self, q: f64) -> f64 {
        debug_assert!((0.0..=1.0).contains(&q));
        let mut sorted = self.to_vec();
        sorted.sort_by(f64::total_cmp);
        let index = f64::ceil(q * sorted.len() as f64 - 1.0).max(0.0) as usize;
        sorted[usize::min(index, sorted.len() - 1)]
    }
}

/// Streaming mean and variance (Welford), for simulations too large to buffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Moments {
    count: u64,
    mean: f64,
    sum_sq: f64,
}
impl Moments {
    #[inline]
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.sum_sq += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.sum_sq / (self.count - 1) as f64
        }
    }

    pub fn std_error(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.variance() / self.count as f64).sqrt()
        }
    }
}

#[inline]
pub fn logistic(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^x)` without overflow.
#[inline]
pub fn softplus(x: f64) -> f64 {
    x.max(0.0) + (-x.abs()).exp().ln_1p()
}

/// Log-likelihood of a binary outcome `y` under a logit `eta`.
#[inline]
pub fn bernoulli_logit_ln(y: f64, eta: f64) -> f64 {
    if y > 0.5 {
        -softplus(-eta)
    } else {
        -softplus(eta)
    }
}
