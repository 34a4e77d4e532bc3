//! Prediction output formatting and post-processing
//!
//! Converts raw backend outputs into a stability score in [0, 1] and a T80
//! lifetime estimate in hours.

use crate::error::InferenceError;
use crate::models::{PredictionResult, RawPrediction};

/// Retained fraction that defines the T80 lifetime
pub const T80_THRESHOLD: f64 = 0.8;

/// Default hours at which a scalar score of 0.5 lands
pub const LIFETIME_SCALE_HOURS: f64 = 1000.0;

/// Default upper bound for any lifetime estimate (about 11 years)
pub const MAX_LIFETIME_HOURS: f64 = 100_000.0;

/// Curve points used for tail extrapolation
const TAIL_POINTS: usize = 5;

/// Configuration for output formatting
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Scalar T80 is `lifetime_scale_hours · s / (1 - s)`
    pub lifetime_scale_hours: f64,
    /// Cap applied to every T80
    pub max_lifetime_hours: f64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            lifetime_scale_hours: LIFETIME_SCALE_HOURS,
            max_lifetime_hours: MAX_LIFETIME_HOURS,
        }
    }
}

/// Formats raw backend outputs into a [`PredictionResult`]
#[derive(Debug, Clone, Default)]
pub struct OutputFormatter {
    config: OutputConfig,
}

impl OutputFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn format(&self, raw: &RawPrediction) -> Result<PredictionResult, InferenceError> {
        let result = match raw {
            RawPrediction::Scalar { value, spread } => self.format_scalar(*value, *spread)?,
            RawPrediction::Curve {
                times_hours,
                retained,
            } => self.format_curve(times_hours, retained)?,
            RawPrediction::Blend {
                tabular_weight,
                tabular,
                sequence,
            } => {
                let tabular = self.format(tabular)?;
                let sequence = self.format(sequence)?;
                blend(*tabular_weight, &tabular, &sequence)
            }
        };

        if !result.stability_score.is_finite() || !result.estimated_lifetime_t80_hours.is_finite() {
            return Err(InferenceError::new("post-processing produced a non-finite result"));
        }
        Ok(result)
    }

    fn format_scalar(&self, value: f64, spread: Option<f64>) -> Result<PredictionResult, InferenceError> {
        if !value.is_finite() {
            return Err(InferenceError::new(format!("non-finite model output {}", value)));
        }
        let score = sigmoid(value);
        let t80 = if score >= 1.0 {
            self.config.max_lifetime_hours
        } else {
            (self.config.lifetime_scale_hours * score / (1.0 - score)).min(self.config.max_lifetime_hours)
        };
        Ok(PredictionResult {
            stability_score: score,
            estimated_lifetime_t80_hours: t80,
            uncertainty: spread.map(|s| s.abs() * score * (1.0 - score)),
        })
    }

    fn format_curve(&self, times: &[f64], retained: &[f64]) -> Result<PredictionResult, InferenceError> {
        if times.len() != retained.len() || times.is_empty() {
            return Err(InferenceError::new(format!(
                "curve has {} time points and {} values",
                times.len(),
                retained.len()
            )));
        }
        if retained.iter().chain(times).any(|v| !v.is_finite()) {
            return Err(InferenceError::new("curve contains non-finite values"));
        }

        let score = retained[retained.len() - 1].clamp(0.0, 1.0);
        let t80 = match first_crossing(times, retained, T80_THRESHOLD) {
            Some(t) => t,
            None => self.extrapolate_tail(times, retained),
        }
        .clamp(0.0, self.config.max_lifetime_hours);

        Ok(PredictionResult {
            stability_score: score,
            estimated_lifetime_t80_hours: t80,
            uncertainty: None,
        })
    }

    /// Project the log-linear tail forward to the threshold
    fn extrapolate_tail(&self, times: &[f64], retained: &[f64]) -> f64 {
        let start = times.len().saturating_sub(TAIL_POINTS);
        let tail: Vec<(f64, f64)> = times[start..]
            .iter()
            .zip(&retained[start..])
            .filter(|(_, r)| **r > 0.0)
            .map(|(t, r)| (*t, r.ln()))
            .collect();

        let slope = linear_regression_slope(&tail);
        if slope >= -f64::EPSILON {
            return self.config.max_lifetime_hours;
        }
        let (t_last, ln_last) = tail[tail.len() - 1];
        t_last + (T80_THRESHOLD.ln() - ln_last) / slope
    }
}

/// Time at which the curve first drops to `threshold`, interpolated linearly
fn first_crossing(times: &[f64], retained: &[f64], threshold: f64) -> Option<f64> {
    let idx = retained.iter().position(|r| *r <= threshold)?;
    if idx == 0 {
        return Some(times[0]);
    }
    let (t0, t1) = (times[idx - 1], times[idx]);
    let (r0, r1) = (retained[idx - 1], retained[idx]);
    if (r0 - r1).abs() < f64::EPSILON {
        return Some(t1);
    }
    Some(t0 + (r0 - threshold) * (t1 - t0) / (r0 - r1))
}

/// Least-squares slope of `y` over `x`; 0 when undetermined
fn linear_regression_slope(points: &[(f64, f64)]) -> f64 {
    let n = points.len() as f64;
    if n < 2.0 {
        return 0.0;
    }

    let x0 = points[0].0;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
    for (x, y) in points {
        let x = x - x0;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator.abs() < f64::EPSILON {
        return 0.0;
    }
    (n * sum_xy - sum_x * sum_y) / denominator
}

fn blend(w: f64, tabular: &PredictionResult, sequence: &PredictionResult) -> PredictionResult {
    let uncertainty = match (tabular.uncertainty, sequence.uncertainty) {
        (None, None) => None,
        (t, s) => {
            let t = w * t.unwrap_or(0.0);
            let s = (1.0 - w) * s.unwrap_or(0.0);
            Some((t * t + s * s).sqrt())
        }
    };
    PredictionResult {
        stability_score: w * tabular.stability_score + (1.0 - w) * sequence.stability_score,
        estimated_lifetime_t80_hours: w * tabular.estimated_lifetime_t80_hours
            + (1.0 - w) * sequence.estimated_lifetime_t80_hours,
        uncertainty,
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
