use std::sync::{Arc, Mutex, PoisonError};

use rand::{rngs::SmallRng, Rng, SeedableRng};
use shared::domain::ItemId;

/// Uniform item picker over a freshly fetched candidate list.
///
/// The rng is seeded once per process, never per call. Callers re-fetch
/// the candidates on every draw, so a re-roll can land on the same item
/// again with probability 1/N.
#[derive(Clone)]
pub struct ItemPicker {
    rng: Arc<Mutex<SmallRng>>,
}

impl ItemPicker {
    pub fn new() -> Self {
        Self::from_rng(SmallRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(SmallRng::seed_from_u64(seed))
    }

    fn from_rng(rng: SmallRng) -> Self {
        Self {
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    pub fn pick(&self, candidates: &[ItemId]) -> Option<ItemId> {
        if candidates.is_empty() {
            return None;
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let index = rng.gen_range(0..candidates.len());
        Some(candidates[index])
    }
}

impl Default for ItemPicker {
    fn default() -> Self {
        Self::new()
    }
}
