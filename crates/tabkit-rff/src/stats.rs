//! Scalar sampling and order statistics used by the kernel samplers and the
//! bandwidth estimator.

use std::f64::consts::PI;

use crate::rng::TauswortheHybrid;

/// Standard normal draw using the Marsaglia polar method.
///
/// Only one of the two values the method produces is returned, so every call
/// consumes a whole number of rejection rounds and the draw order stays a
/// pure function of the generator state.
pub fn standard_normal(rng: &mut TauswortheHybrid) -> f64 {
    loop {
        let u = 2.0 * rng.next_f64() - 1.0;
        let v = 2.0 * rng.next_f64() - 1.0;
        let s = u * u + v * v;
        if s > 0.0 && s < 1.0 {
            return u * (-2.0 * s.ln() / s).sqrt();
        }
    }
}

/// Standard Cauchy draw: `tan(π(u - ½))`.
pub fn standard_cauchy(rng: &mut TauswortheHybrid) -> f64 {
    let u = rng.next_f64();
    (PI * (u - 0.5)).tan()
}

/// Median of `values`, computed by partial selection.
///
/// NaNs are dropped first (the vector is modified). For an even count the
/// mean of the two middle values is returned. Returns `None` when nothing is
/// left to take a median of.
pub fn median_in_place(values: &mut Vec<f32>) -> Option<f32> {
    values.retain(|v| !v.is_nan());
    let n = values.len();
    if n == 0 {
        return None;
    }

    let mid = n / 2;
    let (lower, &mut upper, _) = values.select_nth_unstable_by(mid, f32::total_cmp);
    if n % 2 == 1 {
        return Some(upper);
    }

    let below = lower.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    Some(((f64::from(below) + f64::from(upper)) / 2.0) as f32)
}
