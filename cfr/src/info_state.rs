use std::{
    collections::HashMap,
    fmt::Display,
};

use itertools::Itertools;
use more_asserts::{
    assert_gt,
    debug_assert_ge,
};

use crate::{
    games::Game,
    policy::uniform,
};

/// Per information state accumulators of a CFR solver.
pub struct InfoStateValues<G>
where
    G: Game,
{
    cumulative_regrets: Vec<f64>,
    cumulative_policy: Vec<f64>,
    current_policy: Vec<f64>,

    actions: Vec<G::Action>,
    info_set: G::InfoSet,
}

impl<G> InfoStateValues<G>
where
    G: Game,
{
    pub fn new(actions: Vec<G::Action>, info_set: G::InfoSet) -> Self {
        let actions_len = actions.len();
        assert_gt!(actions_len, 0, "no legal actions at {}", info_set);
        Self {
            cumulative_regrets: vec![0.0; actions_len],
            cumulative_policy: vec![0.0; actions_len],
            current_policy: uniform(actions_len),

            actions,
            info_set,
        }
    }

    pub fn get_actions(&self) -> &[G::Action] {
        &self.actions
    }

    pub fn info_set(&self) -> &G::InfoSet {
        &self.info_set
    }

    pub fn cumulative_regrets(&self) -> &[f64] {
        &self.cumulative_regrets
    }

    pub fn cumulative_policy(&self) -> &[f64] {
        &self.cumulative_policy
    }

    /// The policy played during the current iteration.
    pub fn current_policy(&self) -> &[f64] {
        &self.current_policy
    }

    pub fn add_regret(&mut self, action_index: usize, regret: f64, counterfactual_reach: f64) {
        self.cumulative_regrets[action_index] += counterfactual_reach * regret;
    }

    pub fn add_policy(&mut self, action_index: usize, weight: f64) {
        debug_assert_ge!(weight, 0.0);
        self.cumulative_policy[action_index] += weight;
    }

    /// Recomputes the current policy from the positive part of the cumulative
    /// regrets, falling back to uniform when no regret is positive.
    pub fn regret_matching(&mut self) {
        let normalizing_sum: f64 = self.cumulative_regrets.iter().map(|r| r.max(0.0)).sum();
        if normalizing_sum <= 0.0 {
            self.current_policy = uniform(self.actions.len());
            return;
        }
        for (i, regret) in self.cumulative_regrets.iter().enumerate() {
            self.current_policy[i] = regret.max(0.0) / normalizing_sum;
        }
    }

    /// Regret matching+ floors regrets at zero after every update.
    pub fn apply_regret_matching_plus_reset(&mut self) {
        for regret in self.cumulative_regrets.iter_mut() {
            if *regret < 0.0 {
                *regret = 0.0;
            }
        }
    }

    pub fn average_policy(&self) -> Vec<f64> {
        let normalizing_sum: f64 = self.cumulative_policy.iter().sum();
        if normalizing_sum <= 0.0 {
            return uniform(self.actions.len());
        }
        self.cumulative_policy.iter().map(|s| s / normalizing_sum).collect()
    }
}

impl<G> Display for InfoStateValues<G>
where
    G: Game,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.info_set)?;

        let avg_policy = self.average_policy();
        write!(f, " Avg Policy[")?;
        for (i, act) in self.actions.iter().enumerate() {
            write!(f, "{}: {:.03}, ", act, avg_policy[i])?;
        }
        write!(f, "]")?;

        Ok(())
    }
}

/// Information states discovered so far. Entries are created on first visit
/// and never removed.
pub struct InfoStateTable<G>
where
    G: Game,
{
    values: HashMap<G::InfoSet, InfoStateValues<G>>,
}

impl<G> Default for InfoStateTable<G>
where
    G: Game,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<G> InfoStateTable<G>
where
    G: Game,
{
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, info_set: &G::InfoSet) -> Option<&InfoStateValues<G>> {
        self.values.get(info_set)
    }

    pub fn get_mut(&mut self, info_set: &G::InfoSet) -> Option<&mut InfoStateValues<G>> {
        self.values.get_mut(info_set)
    }

    pub fn get_or_insert_with<F>(&mut self, info_set: &G::InfoSet, actions: F) -> &mut InfoStateValues<G>
    where
        F: FnOnce() -> Vec<G::Action>,
    {
        self.values
            .entry(info_set.clone())
            .or_insert_with(|| InfoStateValues::new(actions(), info_set.clone()))
    }

    pub fn values(&self) -> impl Iterator<Item = &InfoStateValues<G>> {
        self.values.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut InfoStateValues<G>> {
        self.values.values_mut()
    }

    /// Entries ordered by information state, for stable display.
    pub fn sorted(&self) -> Vec<&InfoStateValues<G>> {
        self.values.values().sorted_by(|a, b| a.info_set.cmp(&b.info_set)).collect()
    }
}
