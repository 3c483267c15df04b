//! Risk-scale normalization.
//!
//! All intermediate scoring math happens on one canonical scale: risk,
//! 0-100, higher = more dangerous. This module maps raw factor risks onto
//! that scale under the configured method, and owns the single inversion
//! that produces the public safety score. Nothing else in the crate may
//! compute `100 - x`.

use super::config::{Normalization, NormalizationMethod};

/// Applies the configured normalization to a raw canonical-scale risk.
pub fn normalize_risk(raw: f64, normalization: &Normalization) -> f64 {
    match normalization.method {
        NormalizationMethod::Linear => linear(raw),
        NormalizationMethod::Logarithmic => logarithmic(raw),
        NormalizationMethod::Sigmoid => sigmoid(
            raw,
            normalization.parameters.steepness,
            normalization.parameters.midpoint,
        ),
    }
}

/// Scale-preserving clamp to [0, 100].
fn linear(x: f64) -> f64 {
    x.clamp(0.0, 100.0)
}

/// Compresses large values so one extreme factor cannot dominate the
/// weighted sum. Fixes 0 -> 0 and 100 -> 100.
fn logarithmic(x: f64) -> f64 {
    let x = x.clamp(0.0, 100.0);
    100.0 * (1.0 + x).ln() / 101.0f64.ln()
}

/// Sharpens the decision boundary around `midpoint`.
fn sigmoid(x: f64, steepness: f64, midpoint: f64) -> f64 {
    let x = x.clamp(0.0, 100.0);
    100.0 / (1.0 + (-steepness * (x - midpoint)).exp())
}

/// The one conversion from the internal risk scale to the public safety
/// scale (higher = safer).
pub fn safety_from_risk(risk: f64) -> f64 {
    (100.0 - risk).clamp(0.0, 100.0)
}
