// Seedable randomness for the simulation.
//
// Every component that draws random numbers takes its source explicitly, so a
// run can be replayed from a single seed. The network and the decision layer
// each own a stream, so one drawing more often never shifts the other.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub type SimRng = ChaCha8Rng;

/// Build the master random source. `None` draws a seed from the OS.
pub fn seeded(seed: Option<u64>) -> SimRng {
    match seed {
        Some(seed) => SimRng::seed_from_u64(seed),
        None => SimRng::from_entropy(),
    }
}

/// Zero-mean normal sample with standard deviation `std` (Box–Muller).
#[inline]
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R, std: f64) -> f64 {
    // (0, 1] so ln() stays finite.
    let u1 = 1.0 - rng.gen::<f64>();
    let u2 = rng.gen::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * core::f64::consts::PI * u2).cos();
    z * std
}
