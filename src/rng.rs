/* ------------------------------------------------------------------ */
/* Minimal xorshift PRNG + injectable randomness source              */
/* ------------------------------------------------------------------ */
//
// Everything stochastic in this crate (shuffle buffer, categorical
// draws) consumes a RandomSource, so tests can substitute fixed draws.

pub trait RandomSource {
    /// Uniform draw in [0, 1).
    fn uniform(&mut self) -> f64;
}

pub struct Rng {
    pub state: u64,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        // xorshift has a single all-zero fixed point
        Self { state: if seed == 0 { 0x9E3779B97F4A7C15 } else { seed } }
    }

    pub fn next(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    pub fn uniform(&mut self) -> f64 {
        (self.next() >> 11) as f64 * (1.0 / 9007199254740992.0)
    }

    pub fn choice(&mut self, n: usize) -> usize {
        (self.uniform() * n as f64) as usize
    }
}

impl RandomSource for Rng {
    fn uniform(&mut self) -> f64 {
        Rng::uniform(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = Rng::new(1337);
        let mut b = Rng::new(1337);
        for _ in 0..100 {
            assert_eq!(a.next(), b.next());
        }
    }

    #[test]
    fn uniform_in_unit_interval() {
        let mut rng = Rng::new(7);
        for _ in 0..10_000 {
            let u = rng.uniform();
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn choice_in_range() {
        let mut rng = Rng::new(42);
        for _ in 0..10_000 {
            assert!(rng.choice(13) < 13);
        }
    }

    #[test]
    fn zero_seed_is_remapped() {
        let mut rng = Rng::new(0);
        assert_ne!(rng.next(), 0);
    }
}
