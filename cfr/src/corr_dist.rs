//! Distance of a correlation device from the set of coarse correlated
//! equilibria (CCE).
//!
//! A device is a CCE when no player can gain by committing, before any
//! recommendation is drawn, to a fixed deviation policy while the others keep
//! following the drawn joint policy. The deviating player therefore plays on
//! the original information states: it never observes which joint policy was
//! drawn nor what it recommends.

use log::{
    debug,
    info,
};

use crate::{
    corr_dev::{
        validate_device,
        CorrelationDevice,
    },
    error::Result,
    eval::{
        best_response_to,
        deviation_incentives,
        on_policy_values,
        JointPolicySource,
    },
    games::Game,
    policy::{
        Policy,
        TabularPolicy,
    },
};

pub struct CorrDistInfo<G: Game> {
    /// Sum of the deviation incentives.
    pub dist_value: f64,
    pub on_policy_values: Vec<f64>,
    pub best_response_values: Vec<f64>,
    pub deviation_incentives: Vec<f64>,
    /// Best fixed deviation found for each player.
    pub best_response_policies: Vec<TabularPolicy<G>>,
}

// Manual impls keep `G` itself free of `Clone` and `Debug` bounds.
impl<G: Game> Clone for CorrDistInfo<G> {
    fn clone(&self) -> Self {
        Self {
            dist_value: self.dist_value,
            on_policy_values: self.on_policy_values.clone(),
            best_response_values: self.best_response_values.clone(),
            deviation_incentives: self.deviation_incentives.clone(),
            best_response_policies: self.best_response_policies.clone(),
        }
    }
}

impl<G: Game> std::fmt::Debug for CorrDistInfo<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrDistInfo")
            .field("dist_value", &self.dist_value)
            .field("on_policy_values", &self.on_policy_values)
            .field("best_response_values", &self.best_response_values)
            .field("deviation_incentives", &self.deviation_incentives)
            .field("best_response_policies", &self.best_response_policies)
            .finish()
    }
}

struct DeviceSource<'a, G: Game> {
    device: &'a CorrelationDevice<G>,
}

impl<'a, G: Game> JointPolicySource<G> for DeviceSource<'a, G> {
    fn num_samples(&self) -> usize {
        self.device.len()
    }

    fn sample_weight(&self, sample: usize) -> f64 {
        self.device[sample].0
    }

    fn action_probabilities(
        &self,
        sample: usize,
        actions_len: usize,
        info_set: &G::InfoSet,
    ) -> Vec<f64> {
        self.device[sample].1.safe_action_probabilities(actions_len, info_set)
    }
}

/// Computes how far `device` is from being a coarse correlated equilibrium.
pub fn cce_dist<G: Game>(game: &G, device: &CorrelationDevice<G>) -> Result<CorrDistInfo<G>> {
    validate_device(device)?;

    let source = DeviceSource {
        device,
    };
    let on_policy_values = on_policy_values(game, &source);
    let mut best_response_values = Vec::with_capacity(game.num_players());
    let mut best_response_policies = Vec::with_capacity(game.num_players());
    for player in 0..game.num_players() {
        let br = best_response_to(game, player, &source);
        best_response_values.push(br.value);
        best_response_policies.push(br.policy);
    }
    let deviation_incentives = deviation_incentives(&best_response_values, &on_policy_values);
    let dist_value: f64 = deviation_incentives.iter().sum();

    debug!(
        "on-policy values: {:?}, best response values: {:?}",
        on_policy_values, best_response_values
    );
    info!("CCE dist over {} joint policies: {}", device.len(), dist_value);

    Ok(CorrDistInfo {
        dist_value,
        on_policy_values,
        best_response_values,
        deviation_incentives,
        best_response_policies,
    })
}
