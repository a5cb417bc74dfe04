use std::{
    collections::HashMap,
    fmt::Display,
};

use itertools::Itertools;
use more_asserts::{
    assert_ge,
    assert_gt,
};
use rand::Rng;
use rand_distr::{
    Distribution,
    WeightedIndex,
};

use crate::games::Game;

/// Tolerance used when checking that a distribution sums to one.
pub const PROBABILITY_TOLERANCE: f64 = 1e-9;

pub trait Policy<G: Game> {
    /// Action probabilities indexed like `Game::list_legal_actions` for a
    /// state in `info_set`, or `None` if the policy doesn't know the state.
    fn action_probabilities(&self, info_set: &G::InfoSet) -> Option<Vec<f64>>;

    fn safe_action_probabilities(&self, actions_len: usize, info_set: &G::InfoSet) -> Vec<f64> {
        match self.action_probabilities(info_set) {
            Some(probs) => {
                assert_eq!(
                    actions_len,
                    probs.len(),
                    "policy for {} doesn't match the legal actions",
                    info_set
                );
                probs
            }
            None => uniform(actions_len),
        }
    }
}

pub fn uniform(actions_len: usize) -> Vec<f64> {
    assert_gt!(actions_len, 0);
    vec![1.0 / actions_len as f64; actions_len]
}

/// Panics unless `probs` is a valid probability distribution.
pub fn assert_distribution<D: Display>(probs: &[f64], info_set: &D) {
    assert!(!probs.is_empty(), "empty distribution for {}", info_set);
    for p in probs {
        assert_ge!(*p, 0.0, "negative probability for {}: {:?}", info_set, probs);
    }
    let sum: f64 = probs.iter().sum();
    assert!(
        (sum - 1.0).abs() <= PROBABILITY_TOLERANCE,
        "distribution for {} sums to {}: {:?}",
        info_set,
        sum,
        probs
    );
}

pub(crate) fn max_index(values: &[f64]) -> usize {
    values.iter().enumerate().max_by(|(_i, a), (_j, b)| a.total_cmp(b)).map(|(i, _)| i).unwrap()
}

/// Immutable-by-convention snapshot from information state to a distribution
/// over that state's legal actions.
pub struct TabularPolicy<G: Game> {
    probabilities: HashMap<G::InfoSet, Vec<f64>>,
}

impl<G: Game> TabularPolicy<G> {
    pub fn new() -> Self {
        Self {
            probabilities: HashMap::new(),
        }
    }

    pub fn from_map(probabilities: HashMap<G::InfoSet, Vec<f64>>) -> Self {
        for (info_set, probs) in probabilities.iter() {
            assert_distribution(probs, info_set);
        }
        Self {
            probabilities,
        }
    }

    pub fn insert(&mut self, info_set: G::InfoSet, probs: Vec<f64>) {
        assert_distribution(&probs, &info_set);
        self.probabilities.insert(info_set, probs);
    }

    pub fn get(&self, info_set: &G::InfoSet) -> Option<&[f64]> {
        self.probabilities.get(info_set).map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&G::InfoSet, &[f64])> {
        self.probabilities.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Index of the action played with probability one, if any.
    pub fn deterministic_action(&self, info_set: &G::InfoSet) -> Option<usize> {
        self.probabilities.get(info_set).and_then(|probs| probs.iter().position(|p| *p == 1.0))
    }

    pub fn is_deterministic(&self) -> bool {
        self.probabilities.values().all(|probs| probs.iter().all(|p| *p == 0.0 || *p == 1.0))
    }

    /// Key identifying a deterministic policy, `None` for mixed ones.
    pub(crate) fn deterministic_key(&self) -> Option<Vec<(G::InfoSet, usize)>> {
        self.probabilities
            .keys()
            .sorted()
            .map(|info_set| self.deterministic_action(info_set).map(|a| (info_set.clone(), a)))
            .collect()
    }

    /// Draws one action per information state and returns the resulting pure
    /// policy. States are visited in key order so that a seeded `rng` yields
    /// the same realization on every run.
    pub fn sample_deterministic<R: Rng>(&self, rng: &mut R) -> Self {
        let mut sampled = HashMap::with_capacity(self.probabilities.len());
        for (info_set, probs) in self.probabilities.iter().sorted_by(|a, b| a.0.cmp(b.0)) {
            let dist = WeightedIndex::new(probs).unwrap_or_else(|e| {
                panic!("Invalid weights: e: {} probs: {:?}", e, probs);
            });
            let mut pure = vec![0.0; probs.len()];
            pure[dist.sample(rng)] = 1.0;
            sampled.insert(info_set.clone(), pure);
        }
        Self {
            probabilities: sampled,
        }
    }
}

impl<G: Game> Policy<G> for TabularPolicy<G> {
    fn action_probabilities(&self, info_set: &G::InfoSet) -> Option<Vec<f64>> {
        self.probabilities.get(info_set).cloned()
    }
}

impl<G: Game> Default for TabularPolicy<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: Game> Clone for TabularPolicy<G> {
    fn clone(&self) -> Self {
        Self {
            probabilities: self.probabilities.clone(),
        }
    }
}

impl<G: Game> PartialEq for TabularPolicy<G> {
    fn eq(&self, other: &Self) -> bool {
        self.probabilities == other.probabilities
    }
}

impl<G: Game> std::fmt::Debug for TabularPolicy<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.probabilities.iter().sorted_by(|a, b| a.0.cmp(b.0))).finish()
    }
}

impl<G: Game> Display for TabularPolicy<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (info_set, probs) in self.probabilities.iter().sorted_by(|a, b| a.0.cmp(b.0)) {
            write!(f, "{} [", info_set)?;
            for p in probs {
                write!(f, "{:.03}, ", p)?;
            }
            writeln!(f, "]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use wyhash::WyRng;

    use super::*;
    use crate::games::kuhn::{
        Card,
        Kuhn,
        KuhnAction,
        KuhnInfoSet,
    };

    fn info_set(player_id: usize, card: usize, actions: &[KuhnAction]) -> KuhnInfoSet {
        KuhnInfoSet {
            player_id,
            card: Card(card),
            actions: actions.to_vec(),
        }
    }

    #[test]
    fn test_unknown_state_is_uniform() {
        let policy = TabularPolicy::<Kuhn>::new();
        assert_eq!(vec![0.5, 0.5], policy.safe_action_probabilities(2, &info_set(0, 0, &[])));
    }

    #[test]
    #[should_panic]
    fn test_rejects_unnormalized_distribution() {
        let mut policy = TabularPolicy::<Kuhn>::new();
        policy.insert(info_set(0, 0, &[]), vec![0.7, 0.7]);
    }

    #[test]
    #[should_panic]
    fn test_rejects_negative_probability() {
        let mut policy = TabularPolicy::<Kuhn>::new();
        policy.insert(info_set(0, 0, &[]), vec![1.5, -0.5]);
    }

    #[test]
    fn test_sample_deterministic() {
        let mut policy = TabularPolicy::<Kuhn>::new();
        policy.insert(info_set(0, 0, &[]), vec![0.25, 0.75]);
        policy.insert(info_set(1, 2, &[KuhnAction::Pass]), vec![0.0, 1.0]);
        assert!(!policy.is_deterministic());
        assert!(policy.deterministic_key().is_none());

        let mut rng = WyRng::seed_from_u64(7);
        let pure = policy.sample_deterministic(&mut rng);
        assert!(pure.is_deterministic());
        assert_eq!(policy.len(), pure.len());
        assert_eq!(Some(1), pure.deterministic_action(&info_set(1, 2, &[KuhnAction::Pass])));
        assert_eq!(2, pure.deterministic_key().unwrap().len());

        let again = policy.sample_deterministic(&mut WyRng::seed_from_u64(7));
        assert_eq!(pure, again);
    }
}
