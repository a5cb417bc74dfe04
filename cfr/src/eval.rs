use std::collections::HashMap;

use itertools::Itertools;
use log::debug;
use more_asserts::assert_ge;

use crate::{
    games::{
        Game,
        PlayerId,
    },
    policy::{
        max_index,
        Policy,
        TabularPolicy,
    },
};

/// Slack allowed when a best response value falls below the on-policy value
/// because of floating point error.
pub const VALUE_TOLERANCE: f64 = 1e-9;

/// What a best responder plays against: a weighted set of samples, each of
/// which prescribes action probabilities at every information state.
///
/// A single policy is one sample of weight one. A correlation device has one
/// sample per joint policy. The best responder never observes which sample
/// was drawn.
pub(crate) trait JointPolicySource<G: Game> {
    fn num_samples(&self) -> usize;

    fn sample_weight(&self, sample: usize) -> f64;

    fn action_probabilities(
        &self,
        sample: usize,
        actions_len: usize,
        info_set: &G::InfoSet,
    ) -> Vec<f64>;
}

pub(crate) struct SinglePolicy<'a, P>(pub &'a P);

impl<'a, G: Game, P: Policy<G>> JointPolicySource<G> for SinglePolicy<'a, P> {
    fn num_samples(&self) -> usize {
        1
    }

    fn sample_weight(&self, _sample: usize) -> f64 {
        1.0
    }

    fn action_probabilities(
        &self,
        _sample: usize,
        actions_len: usize,
        info_set: &G::InfoSet,
    ) -> Vec<f64> {
        self.0.safe_action_probabilities(actions_len, info_set)
    }
}

/// States of one of the best responder's information states, keyed by sample,
/// with the probability that chance and the other players reach them.
struct ReachProbabilities<G: Game> {
    reach_probabilities: HashMap<(usize, G::State), f64>,
}

impl<G: Game> ReachProbabilities<G> {
    fn insert(&mut self, sample: usize, state: G::State, reach_probability: f64) {
        let prob = self.reach_probabilities.entry((sample, state)).or_insert(0.0);
        *prob += reach_probability;
    }
}

impl<G: Game> Default for ReachProbabilities<G> {
    fn default() -> Self {
        Self {
            reach_probabilities: HashMap::new(),
        }
    }
}

struct BestResponseSearch<'a, G: Game, S: JointPolicySource<G>> {
    game: &'a G,
    source: &'a S,
    br_player: usize,

    reach_probabilities: HashMap<G::InfoSet, ReachProbabilities<G>>,
    action_utilities: HashMap<G::InfoSet, Vec<f64>>,
    values: HashMap<(usize, G::State), f64>,
}

impl<'a, G: Game, S: JointPolicySource<G>> BestResponseSearch<'a, G, S> {
    fn new(game: &'a G, source: &'a S, br_player: usize) -> Self {
        let mut search = Self {
            game,
            source,
            br_player,
            reach_probabilities: HashMap::new(),
            action_utilities: HashMap::new(),
            values: HashMap::new(),
        };
        let root = game.new_root();
        for sample in 0..source.num_samples() {
            search.calc_reach_probabilities(sample, &root, source.sample_weight(sample));
        }
        search
    }

    fn calc_reach_probabilities(&mut self, sample: usize, state: &G::State, reach_probability: f64) {
        if self.game.is_terminal(state) {
            return;
        }

        match self.game.get_node_player_id(state) {
            PlayerId::Chance => {
                for (act, prob) in self.game.list_legal_chance_actions(state) {
                    let next_state = self.game.with_action(state, act);
                    self.calc_reach_probabilities(sample, &next_state, reach_probability * prob);
                }
            }
            PlayerId::Player(p) if p == self.br_player => {
                let info_set = self.game.to_info_set(state);
                self.reach_probabilities.entry(info_set).or_default().insert(
                    sample,
                    state.clone(),
                    reach_probability,
                );

                for act in self.game.list_legal_actions(state) {
                    let next_state = self.game.with_action(state, act);
                    // the best responder's own reach doesn't count.
                    self.calc_reach_probabilities(sample, &next_state, reach_probability);
                }
            }
            PlayerId::Player(_) => {
                let info_set = self.game.to_info_set(state);
                let actions = self.game.list_legal_actions(state);
                let probs = self.source.action_probabilities(sample, actions.len(), &info_set);
                for (act, prob) in actions.into_iter().zip(probs) {
                    let next_state = self.game.with_action(state, act);
                    self.calc_reach_probabilities(sample, &next_state, reach_probability * prob);
                }
            }
        }
    }

    /// Expected utilities of each action at `info_set`, over every state of
    /// the information state weighted by its reach probability.
    fn best_action(&mut self, info_set: &G::InfoSet) -> usize {
        if let Some(utils) = self.action_utilities.get(info_set) {
            return max_index(utils);
        }

        let states: Vec<(usize, G::State, f64)> = self
            .reach_probabilities
            .get(info_set)
            .unwrap_or_else(|| panic!("{} was never reached", info_set))
            .reach_probabilities
            .iter()
            .map(|((sample, state), prob)| (*sample, state.clone(), *prob))
            .collect();
        let actions = self.game.list_legal_actions(&states[0].1);

        let mut act_utils = vec![0.0; actions.len()];
        for (sample, sib_state, state_reach_prob) in states.iter() {
            for (act_i, act) in actions.iter().enumerate() {
                let next_state = self.game.with_action(sib_state, *act);
                act_utils[act_i] += state_reach_prob * self.value(*sample, &next_state);
            }
        }
        let best = max_index(&act_utils);
        self.action_utilities.insert(info_set.clone(), act_utils);
        best
    }

    /// Expected utility at `state` for the best responder when the others
    /// follow `sample`.
    fn value(&mut self, sample: usize, state: &G::State) -> f64 {
        let key = (sample, state.clone());
        if let Some(v) = self.values.get(&key) {
            return *v;
        }

        let value = if self.game.is_terminal(state) {
            self.game.get_payouts(state)[self.br_player]
        } else {
            match self.game.get_node_player_id(state) {
                PlayerId::Chance => {
                    let mut node_util = 0.0;
                    for (act, prob) in self.game.list_legal_chance_actions(state) {
                        let next_state = self.game.with_action(state, act);
                        node_util += prob * self.value(sample, &next_state);
                    }
                    node_util
                }
                PlayerId::Player(p) if p == self.br_player => {
                    // Pick the best action for the INFO SET, then play it in this STATE.
                    let info_set = self.game.to_info_set(state);
                    let best_action = self.best_action(&info_set);
                    let actions = self.game.list_legal_actions(state);
                    let next_state = self.game.with_action(state, actions[best_action]);
                    self.value(sample, &next_state)
                }
                PlayerId::Player(_) => {
                    let info_set = self.game.to_info_set(state);
                    let actions = self.game.list_legal_actions(state);
                    let probs = self.source.action_probabilities(sample, actions.len(), &info_set);
                    let mut node_util = 0.0;
                    for (act, prob) in actions.into_iter().zip(probs) {
                        let next_state = self.game.with_action(state, act);
                        node_util += prob * self.value(sample, &next_state);
                    }
                    node_util
                }
            }
        };

        self.values.insert(key, value);
        value
    }

    fn root_value(&mut self) -> f64 {
        let root = self.game.new_root();
        (0..self.source.num_samples())
            .map(|sample| self.source.sample_weight(sample) * self.value(sample, &root))
            .sum()
    }

    /// Pure policy over every information state of the best responder.
    fn into_policy(mut self) -> TabularPolicy<G> {
        let info_sets: Vec<G::InfoSet> = self.reach_probabilities.keys().cloned().collect();
        let mut policy = TabularPolicy::new();
        for info_set in info_sets {
            let best = self.best_action(&info_set);
            let mut pure = vec![0.0; self.action_utilities[&info_set].len()];
            pure[best] = 1.0;
            policy.insert(info_set, pure);
        }

        if log::log_enabled!(log::Level::Debug) {
            debug!("Best responses for Player{}", self.br_player);
            for info_set in self.action_utilities.keys().sorted() {
                debug!("{}: {:?}", info_set, self.action_utilities[info_set]);
            }
        }
        policy
    }
}

fn calc_expected_values<G: Game, S: JointPolicySource<G>>(
    game: &G,
    source: &S,
    sample: usize,
    state: &G::State,
) -> Vec<f64> {
    if game.is_terminal(state) {
        return game.get_payouts(state);
    }

    let mut ev = vec![0.0; game.num_players()];
    let children: Vec<(G::State, f64)> = match game.get_node_player_id(state) {
        PlayerId::Chance => game
            .list_legal_chance_actions(state)
            .into_iter()
            .map(|(act, prob)| (game.with_action(state, act), prob))
            .collect(),
        PlayerId::Player(_) => {
            let info_set = game.to_info_set(state);
            let actions = game.list_legal_actions(state);
            let probs = source.action_probabilities(sample, actions.len(), &info_set);
            actions.into_iter().zip(probs).map(|(act, prob)| (game.with_action(state, act), prob)).collect()
        }
    };
    for (next_state, prob) in children {
        let child_ev = calc_expected_values(game, source, sample, &next_state);
        for (p, v) in child_ev.iter().enumerate() {
            ev[p] += prob * v;
        }
    }
    ev
}

/// Values of every player when all of them follow `source`.
pub(crate) fn on_policy_values<G: Game, S: JointPolicySource<G>>(game: &G, source: &S) -> Vec<f64> {
    let root = game.new_root();
    let mut values = vec![0.0; game.num_players()];
    for sample in 0..source.num_samples() {
        let weight = source.sample_weight(sample);
        for (p, v) in calc_expected_values(game, source, sample, &root).iter().enumerate() {
            values[p] += weight * v;
        }
    }
    values
}

pub struct BestResponse<G: Game> {
    pub value: f64,
    pub policy: TabularPolicy<G>,
}

pub(crate) fn best_response_to<G: Game, S: JointPolicySource<G>>(
    game: &G,
    br_player: usize,
    source: &S,
) -> BestResponse<G> {
    let mut search = BestResponseSearch::new(game, source, br_player);
    let value = search.root_value();
    debug!("util_{}(br{}): {}", br_player, br_player, value);
    BestResponse {
        value,
        policy: search.into_policy(),
    }
}

/// Best response of `player` when every other player follows `policy`.
pub fn best_response<G: Game, P: Policy<G>>(game: &G, player: usize, policy: &P) -> BestResponse<G> {
    best_response_to(game, player, &SinglePolicy(policy))
}

/// Expected returns of each player when everyone follows `policy`.
pub fn expected_returns<G: Game, P: Policy<G>>(game: &G, policy: &P) -> Vec<f64> {
    on_policy_values(game, &SinglePolicy(policy))
}

/// Per player gain of a unilateral deviation over `on_policy_values`, floored
/// at zero. Against a correlation device the best fixed deviation can be worth
/// less than following the recommendations.
pub(crate) fn deviation_incentives(best_response_values: &[f64], on_policy_values: &[f64]) -> Vec<f64> {
    best_response_values
        .iter()
        .zip(on_policy_values)
        .map(|(br, on_policy)| (br - on_policy).max(0.0))
        .collect()
}

#[derive(Debug, Clone)]
pub struct NashConvInfo {
    pub nash_conv: f64,
    pub best_response_values: Vec<f64>,
    pub on_policy_values: Vec<f64>,
    pub player_improvements: Vec<f64>,
}

pub fn nash_conv_info<G: Game, P: Policy<G>>(game: &G, policy: &P) -> NashConvInfo {
    let source = SinglePolicy(policy);
    let best_response_values: Vec<f64> =
        (0..game.num_players()).map(|p| best_response_to(game, p, &source).value).collect();
    let on_policy_values = on_policy_values(game, &source);
    // Deviating to the best response can't lose against a single profile.
    for (p, (br, on_policy)) in best_response_values.iter().zip(on_policy_values.iter()).enumerate() {
        assert_ge!(
            *br,
            on_policy - VALUE_TOLERANCE,
            "best response of player {} is worse than the policy itself",
            p
        );
    }
    let player_improvements = deviation_incentives(&best_response_values, &on_policy_values);
    let nash_conv: f64 = player_improvements.iter().sum();
    debug!(
        "br values: {:?} on-policy values: {:?} nash_conv: {}",
        best_response_values, on_policy_values, nash_conv
    );

    NashConvInfo {
        nash_conv,
        best_response_values,
        on_policy_values,
        player_improvements,
    }
}

/// Sum over players of what a unilateral best response gains against `policy`.
pub fn nash_conv<G: Game, P: Policy<G>>(game: &G, policy: &P) -> f64 {
    nash_conv_info(game, policy).nash_conv
}

/// NashConv averaged over players. For two-player zero-sum games this is the
/// usual exploitability, NashConv / 2.
pub fn exploitability<G: Game, P: Policy<G>>(game: &G, policy: &P) -> f64 {
    nash_conv(game, policy) / game.num_players() as f64
}

#[cfg(test)]
pub(crate) mod tests {
    use approx::assert_abs_diff_eq;
    use more_asserts::assert_gt;

    use super::*;
    use crate::games::kuhn::{
        Card,
        Kuhn,
        KuhnAction::{
            self,
            Bet,
            Pass,
        },
        KuhnInfoSet,
    };

    fn info_set(player_id: usize, card: usize, actions: &[KuhnAction]) -> KuhnInfoSet {
        KuhnInfoSet {
            player_id,
            card: Card(card),
            actions: actions.to_vec(),
        }
    }

    /// Closed-form equilibrium of two-player Kuhn poker (alpha = 0).
    /// Cards: 0 = Jack, 1 = Queen, 2 = King; probabilities are [Pass, Bet].
    pub(crate) fn kuhn_equilibrium() -> TabularPolicy<Kuhn> {
        let third = 1.0 / 3.0;
        let mut policy = TabularPolicy::new();
        // player 0 opens
        policy.insert(info_set(0, 0, &[]), vec![1.0, 0.0]);
        policy.insert(info_set(0, 1, &[]), vec![1.0, 0.0]);
        policy.insert(info_set(0, 2, &[]), vec![1.0, 0.0]);
        // player 0 facing a bet after checking
        policy.insert(info_set(0, 0, &[Pass, Bet]), vec![1.0, 0.0]);
        policy.insert(info_set(0, 1, &[Pass, Bet]), vec![1.0 - third, third]);
        policy.insert(info_set(0, 2, &[Pass, Bet]), vec![0.0, 1.0]);
        // player 1 after a check
        policy.insert(info_set(1, 0, &[Pass]), vec![1.0 - third, third]);
        policy.insert(info_set(1, 1, &[Pass]), vec![1.0, 0.0]);
        policy.insert(info_set(1, 2, &[Pass]), vec![0.0, 1.0]);
        // player 1 facing a bet
        policy.insert(info_set(1, 0, &[Bet]), vec![1.0, 0.0]);
        policy.insert(info_set(1, 1, &[Bet]), vec![1.0 - third, third]);
        policy.insert(info_set(1, 2, &[Bet]), vec![0.0, 1.0]);
        policy
    }

    pub(crate) fn always_bet() -> TabularPolicy<Kuhn> {
        let mut policy = TabularPolicy::new();
        for card in 0..3 {
            for (player, history) in
                [(0, vec![]), (0, vec![Pass, Bet]), (1, vec![Pass]), (1, vec![Bet])]
            {
                policy.insert(info_set(player, card, &history), vec![0.0, 1.0]);
            }
        }
        policy
    }

    #[test]
    fn test_equilibrium_values() {
        let game = Kuhn::two_player();
        let returns = expected_returns(&game, &kuhn_equilibrium());
        assert_abs_diff_eq!(-1.0 / 18.0, returns[0], epsilon = 1e-12);
        assert_abs_diff_eq!(1.0 / 18.0, returns[1], epsilon = 1e-12);
    }

    #[test]
    fn test_nash_conv_of_equilibrium_is_zero() {
        let game = Kuhn::two_player();
        let info = nash_conv_info(&game, &kuhn_equilibrium());
        assert_abs_diff_eq!(0.0, info.nash_conv, epsilon = 1e-12);
        assert_abs_diff_eq!(-1.0 / 18.0, info.best_response_values[0], epsilon = 1e-12);
        assert_abs_diff_eq!(0.0, exploitability(&game, &kuhn_equilibrium()), epsilon = 1e-12);
    }

    #[test]
    fn test_nash_conv_of_always_bet() {
        let game = Kuhn::two_player();
        let policy = always_bet();

        // Everyone bets and calls: showdown for 2 chips, zero sum by symmetry.
        let returns = expected_returns(&game, &policy);
        assert_abs_diff_eq!(0.0, returns[0], epsilon = 1e-12);

        // Against a caller, player 0 wins 2 with the King, breaks even with
        // the Queen and gives up the ante with the Jack.
        let br0 = best_response(&game, 0, &policy);
        assert_abs_diff_eq!((2.0 + 0.0 - 1.0) / 3.0, br0.value, epsilon = 1e-12);
        assert_eq!(Some(0), br0.policy.deterministic_action(&info_set(0, 0, &[])));
        assert_eq!(Some(0), br0.policy.deterministic_action(&info_set(0, 0, &[Pass, Bet])));
        assert_eq!(Some(1), br0.policy.deterministic_action(&info_set(0, 2, &[Pass, Bet])));

        assert_gt!(nash_conv(&game, &policy), 0.5);
    }

    #[test]
    fn test_uniform_policy_is_exploitable() {
        let game = Kuhn::new(3, 1).unwrap();
        let uniform = TabularPolicy::<Kuhn>::new();
        let info = nash_conv_info(&game, &uniform);
        assert_abs_diff_eq!(0.0, info.on_policy_values.iter().sum::<f64>(), epsilon = 1e-12);
        assert_gt!(info.nash_conv, 0.0);
        for (br, on_policy) in info.best_response_values.iter().zip(info.on_policy_values.iter()) {
            assert_ge!(*br, *on_policy);
        }
    }

    #[test]
    fn test_deviation_incentives_are_floored() {
        assert_eq!(vec![0.5, 0.0], deviation_incentives(&[1.0, 0.5], &[0.5, 1.0]));
    }

    #[test]
    #[should_panic(expected = "doesn't match the legal actions")]
    fn test_policy_with_wrong_action_count() {
        let game = Kuhn::two_player();
        let mut policy = kuhn_equilibrium();
        policy.insert(info_set(0, 0, &[]), vec![0.2, 0.3, 0.5]);
        nash_conv(&game, &policy);
    }
}
