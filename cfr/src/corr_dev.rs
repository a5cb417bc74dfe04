use std::collections::HashMap;

use log::debug;
use more_asserts::assert_ge;
use rand::SeedableRng;
use wyhash::WyRng;

use crate::{
    error::{
        Error,
        Result,
    },
    games::Game,
    policy::{
        TabularPolicy,
        PROBABILITY_TOLERANCE,
    },
};

/// Probability distribution over joint policies. Each joint policy is a single
/// `TabularPolicy` covering every player's information states.
pub type CorrelationDevice<G> = Vec<(f64, TabularPolicy<G>)>;

/// Accumulates weighted joint policies into a correlation device.
///
/// Identical deterministic joint policies share one entry whose weight is the
/// sum of the weights they were added with.
pub struct CorrDevBuilder<G: Game> {
    rng: WyRng,
    total_weight: f64,

    deterministic_index: HashMap<Vec<(G::InfoSet, usize)>, usize>,
    policies: Vec<TabularPolicy<G>>,
    weights: Vec<f64>,
}

impl<G: Game> CorrDevBuilder<G> {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: WyRng::seed_from_u64(seed),
            total_weight: 0.0,
            deterministic_index: HashMap::new(),
            policies: vec![],
            weights: vec![],
        }
    }

    pub fn num_policies(&self) -> usize {
        self.policies.len()
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    pub fn joint_policy(&self, index: usize) -> Option<&TabularPolicy<G>> {
        self.policies.get(index)
    }

    /// Unnormalized weight of the joint policy at `index`.
    pub fn weight(&self, index: usize) -> Option<f64> {
        self.weights.get(index).copied()
    }

    pub fn add_deterministic_joint_policy(&mut self, policy: TabularPolicy<G>, weight: f64) {
        assert_ge!(weight, 0.0, "negative weight for a joint policy");
        let key = policy
            .deterministic_key()
            .unwrap_or_else(|| panic!("joint policy is not deterministic: {:?}", policy));
        self.total_weight += weight;
        match self.deterministic_index.get(&key) {
            Some(&index) => self.weights[index] += weight,
            None => {
                self.deterministic_index.insert(key, self.policies.len());
                self.policies.push(policy);
                self.weights.push(weight);
            }
        }
    }

    /// Draws `num_samples` pure realizations of `policy`, one action per
    /// information state, and adds each with weight one.
    pub fn add_sampled_joint_policy(&mut self, policy: &TabularPolicy<G>, num_samples: usize) {
        for _ in 0..num_samples {
            let sampled = policy.sample_deterministic(&mut self.rng);
            self.add_deterministic_joint_policy(sampled, 1.0);
        }
        debug!(
            "{} samples added: {} distinct joint policies, total weight {}",
            num_samples,
            self.policies.len(),
            self.total_weight
        );
    }

    /// Adds `policy` as is, without determinizing it.
    pub fn add_mixed_joint_policy(&mut self, policy: TabularPolicy<G>, weight: f64) {
        assert_ge!(weight, 0.0, "negative weight for a joint policy");
        self.total_weight += weight;
        self.policies.push(policy);
        self.weights.push(weight);
    }

    /// Snapshot of the device built so far, with weights normalized. Empty
    /// until some weight has been added.
    pub fn correlation_device(&self) -> CorrelationDevice<G> {
        if self.total_weight <= 0.0 {
            return vec![];
        }
        self.weights
            .iter()
            .zip(self.policies.iter())
            .map(|(w, policy)| (w / self.total_weight, policy.clone()))
            .collect()
    }
}

/// Device giving every policy of `policies` the same weight.
pub fn uniform_correlation_device<G: Game>(policies: &[TabularPolicy<G>]) -> CorrelationDevice<G> {
    let weight = 1.0 / policies.len() as f64;
    policies.iter().map(|policy| (weight, policy.clone())).collect()
}

pub fn validate_device<G: Game>(device: &CorrelationDevice<G>) -> Result<()> {
    if device.is_empty() {
        return Err(Error::EmptyCorrelationDevice);
    }
    for (index, (weight, _)) in device.iter().enumerate() {
        if !weight.is_finite() || *weight < 0.0 {
            return Err(Error::InvalidWeight {
                index,
                weight: *weight,
            });
        }
    }
    let sum: f64 = device.iter().map(|(w, _)| w).sum();
    if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
        return Err(Error::WeightsNotNormalized(sum));
    }
    Ok(())
}
