use crate::{
    games::Game,
    info_state::InfoStateTable,
    policy::{
        Policy,
        TabularPolicy,
    },
};

/// Regret-matching policy of a solver, borrowed from its table.
pub struct CurrentPolicy<'a, G: Game> {
    info_states: &'a InfoStateTable<G>,
}

impl<'a, G: Game> CurrentPolicy<'a, G> {
    pub(super) fn new(info_states: &'a InfoStateTable<G>) -> Self {
        Self {
            info_states,
        }
    }

    pub fn to_tabular(&self) -> TabularPolicy<G> {
        let mut policy = TabularPolicy::new();
        for values in self.info_states.values() {
            policy.insert(values.info_set().clone(), values.current_policy().to_vec());
        }
        policy
    }
}

impl<'a, G: Game> Policy<G> for CurrentPolicy<'a, G> {
    fn action_probabilities(&self, info_set: &G::InfoSet) -> Option<Vec<f64>> {
        self.info_states.get(info_set).map(|v| v.current_policy().to_vec())
    }
}

/// Normalized cumulative policy of a solver, borrowed from its table.
pub struct AveragePolicy<'a, G: Game> {
    info_states: &'a InfoStateTable<G>,
}

impl<'a, G: Game> AveragePolicy<'a, G> {
    pub(super) fn new(info_states: &'a InfoStateTable<G>) -> Self {
        Self {
            info_states,
        }
    }

    pub fn to_tabular(&self) -> TabularPolicy<G> {
        let mut policy = TabularPolicy::new();
        for values in self.info_states.values() {
            policy.insert(values.info_set().clone(), values.average_policy());
        }
        policy
    }
}

impl<'a, G: Game> Policy<G> for AveragePolicy<'a, G> {
    fn action_probabilities(&self, info_set: &G::InfoSet) -> Option<Vec<f64>> {
        self.info_states.get(info_set).map(|v| v.average_policy())
    }
}
