//! Piecewise-cubic Hermite interpolation.
//!
//! Each interval `[x_k, x_{k+1}]` carries its own end slopes, so a slope may differ on
//! the two sides of a knot. [`CubicHermiteSpline::pchip`] picks the slopes with the
//! Fritsch-Carlson rule (as in SciPy's `PchipInterpolator`), which keeps the
//! interpolant monotone wherever the samples are. Callers that know the derivative
//! supply it directly with [`CubicHermiteSpline::from_interval_slopes`].

use ndarray::Array1;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SplineError {
    #[error("Spline needs at least {required} samples, got {actual}")]
    TooFewSamples { required: usize, actual: usize },

    #[error("Abscissae and ordinates differ in length ({x} vs {y})")]
    LengthMismatch { x: usize, y: usize },

    #[error("Abscissae must be strictly increasing (violated at index {index})")]
    NotIncreasing { index: usize },

    #[error("Expected {intervals} slopes per interval end, got {left} left and {right} right")]
    SlopeMismatch {
        intervals: usize,
        left: usize,
        right: usize,
    },
}

/// Cubic Hermite interpolant through `(x_i, y_i)`. Evaluation outside `[x_0, x_n]` is
/// clamped to the nearest end point.
#[derive(Debug, Clone)]
pub struct CubicHermiteSpline {
    x: Array1<f64>,
    y: Array1<f64>,
    left_slope: Array1<f64>,
    right_slope: Array1<f64>,
}

impl CubicHermiteSpline {
    pub const MIN_SAMPLES: usize = 3;

    /// Monotone interpolant with Fritsch-Carlson slopes.
    pub fn pchip(x: &[f64], y: &[f64]) -> Result<Self, SplineError> {
        validate(x, y)?;
        let slopes = pchip_slopes(x, y);
        let n = slopes.len();
        Ok(Self {
            x: Array1::from_vec(x.to_vec()),
            y: Array1::from_vec(y.to_vec()),
            left_slope: slopes.slice(ndarray::s![..n - 1]).to_owned(),
            right_slope: slopes.slice(ndarray::s![1..]).to_owned(),
        })
    }

    /// Interpolant with `left[k]` and `right[k]` the derivatives at the two ends of
    /// interval `k`.
    pub fn from_interval_slopes(
        x: &[f64],
        y: &[f64],
        left: Vec<f64>,
        right: Vec<f64>,
    ) -> Result<Self, SplineError> {
        validate(x, y)?;
        let intervals = x.len() - 1;
        if left.len() != intervals || right.len() != intervals {
            return Err(SplineError::SlopeMismatch {
                intervals,
                left: left.len(),
                right: right.len(),
            });
        }
        Ok(Self {
            x: Array1::from_vec(x.to_vec()),
            y: Array1::from_vec(y.to_vec()),
            left_slope: Array1::from_vec(left),
            right_slope: Array1::from_vec(right),
        })
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.x[0], self.x[self.x.len() - 1])
    }

    /// Interpolated value at `x`; NaN when `x` itself is NaN.
    #[inline]
    pub fn eval(&self, x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }
        let (lo, hi) = self.domain();
        let at = x.clamp(lo, hi);
        let k = self.interval(at);

        let h = self.x[k + 1] - self.x[k];
        let t = (at - self.x[k]) / h;
        let s = 1.0 - t;
        let h00 = (1.0 + 2.0 * t) * s * s;
        let h10 = t * s * s;
        let h01 = t * t * (3.0 - 2.0 * t);
        let h11 = t * t * (t - 1.0);
        h00 * self.y[k]
            + h10 * h * self.left_slope[k]
            + h01 * self.y[k + 1]
            + h11 * h * self.right_slope[k]
    }

    /// Index `k` with `x_k <= at < x_{k+1}`, the last interval taking its right end.
    fn interval(&self, at: f64) -> usize {
        let (mut lo, mut hi) = (0, self.x.len() - 1);
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if self.x[mid] <= at {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        lo
    }
}

fn validate(x: &[f64], y: &[f64]) -> Result<(), SplineError> {
    if x.len() != y.len() {
        return Err(SplineError::LengthMismatch {
            x: x.len(),
            y: y.len(),
        });
    }
    if x.len() < CubicHermiteSpline::MIN_SAMPLES {
        return Err(SplineError::TooFewSamples {
            required: CubicHermiteSpline::MIN_SAMPLES,
            actual: x.len(),
        });
    }
    if let Some(index) = x.windows(2).position(|w| !(w[1] > w[0])) {
        return Err(SplineError::NotIncreasing { index: index + 1 });
    }
    Ok(())
}

/// Knot slopes: weighted harmonic mean of the neighbouring secants in the interior,
/// zero at local extrema, and a shape-preserving three-point formula at the ends.
fn pchip_slopes(x: &[f64], y: &[f64]) -> Array1<f64> {
    let n = x.len();
    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let secant: Vec<f64> = (0..n - 1).map(|k| (y[k + 1] - y[k]) / h[k]).collect();

    let mut slopes = Array1::zeros(n);
    for k in 1..n - 1 {
        if secant[k - 1] * secant[k] > 0.0 {
            let w1 = 2.0 * h[k] + h[k - 1];
            let w2 = h[k] + 2.0 * h[k - 1];
            slopes[k] = (w1 + w2) / (w1 / secant[k - 1] + w2 / secant[k]);
        }
    }
    slopes[0] = end_slope(h[0], h[1], secant[0], secant[1]);
    slopes[n - 1] = end_slope(h[n - 2], h[n - 3], secant[n - 2], secant[n - 3]);
    slopes
}

fn end_slope(h0: f64, h1: f64, m0: f64, m1: f64) -> f64 {
    let d = ((2.0 * h0 + h1) * m0 - h0 * m1) / (h0 + h1);
    let sign = |v: f64| (v > 0.0) as i8 - (v < 0.0) as i8;
    if sign(d) != sign(m0) {
        0.0
    } else if sign(m0) != sign(m1) && d.abs() > 3.0 * m0.abs() {
        3.0 * m0
    } else {
        d
    }
}
