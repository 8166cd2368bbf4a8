//! Parameter initialisation from an explicit random generator

use rand::distributions::{Distribution, Uniform};
use rand::Rng;

/// Half-width of the uniform bias distribution
pub const BIAS_BOUND: f32 = 0.5;

/// Kaiming/He uniform bound for a ReLU-family activation (gain √2): √(6 / fan_in)
pub fn kaiming_bound(fan_in: usize) -> f32 {
    let gain = std::f32::consts::SQRT_2;
    gain * (3.0 / fan_in as f32).sqrt()
}

/// `count` values drawn from U(-bound, bound) with `bound = kaiming_bound(fan_in)`
pub fn kaiming_uniform<R: Rng + ?Sized>(rng: &mut R, fan_in: usize, count: usize) -> Vec<f32> {
    let bound = kaiming_bound(fan_in);
    let dist = Uniform::new(-bound, bound);
    (0..count).map(|_| dist.sample(rng)).collect()
}

/// `count` values drawn from U[-0.5, 0.5]
pub fn uniform_bias<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<f32> {
    let dist = Uniform::new_inclusive(-BIAS_BOUND, BIAS_BOUND);
    (0..count).map(|_| dist.sample(rng)).collect()
}
