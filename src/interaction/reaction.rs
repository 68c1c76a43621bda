//! Canned cheek-touch reaction replies

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Fixed set of reaction sentences, one chosen per cheek touch
pub const CANNED_REPLIES: [&str; 4] = [
    "Hehe, I'm shy",
    "Stop it, you're making me blush!",
    "Oww, that tickles",
    "Hehe, don't tease me!",
];

/// Picks a canned reaction reply.
///
/// Seedable so reaction-trigger tests are reproducible; unseeded picks are
/// drawn from OS entropy.
#[derive(Debug)]
pub struct ReactionPicker {
    rng: StdRng,
}

impl ReactionPicker {
    /// Create a picker, deterministic when `seed` is given
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self { rng }
    }

    /// Choose one reply uniformly at random
    pub fn pick(&mut self) -> &'static str {
        CANNED_REPLIES
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(CANNED_REPLIES[0])
    }
}
