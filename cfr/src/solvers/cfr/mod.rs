pub mod policies;

use clap::Args;
use log::{
    debug,
    info,
    log_enabled,
};

use crate::{
    error::{
        Error,
        Result,
    },
    games::{
        Game,
        PlayerId,
    },
    info_state::InfoStateTable,
    policy::TabularPolicy,
};
pub use policies::{
    AveragePolicy,
    CurrentPolicy,
};

#[derive(Args, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CfrConfig {
    /// Update one player's regrets per iteration, cycling through players.
    #[clap(long)]
    pub alternating_updates: bool,

    /// Weight each iteration's contribution to the average policy by its index.
    #[clap(long)]
    pub linear_averaging: bool,

    /// Floor cumulative regrets at zero after every iteration.
    #[clap(long)]
    pub regret_matching_plus: bool,
}

impl CfrConfig {
    pub fn vanilla() -> Self {
        Self::default()
    }

    pub fn alternating() -> Self {
        Self {
            alternating_updates: true,
            ..Self::default()
        }
    }

    /// CFR+: alternating updates, linear averaging and regret matching+.
    pub fn cfr_plus() -> Self {
        Self {
            alternating_updates: true,
            linear_averaging: true,
            regret_matching_plus: true,
        }
    }
}

/// Tabular counterfactual regret minimization over the full game tree.
pub struct CfrSolver<'g, G>
where
    G: Game,
{
    game: &'g G,
    config: CfrConfig,
    info_states: InfoStateTable<G>,

    num_players: usize,
    iteration: usize,
}

impl<'g, G> CfrSolver<'g, G>
where
    G: Game,
{
    pub fn new(game: &'g G, config: CfrConfig) -> Result<Self> {
        let num_players = game.num_players();
        if num_players == 0 {
            return Err(Error::NoPlayers);
        }
        if game.max_game_length().is_none() {
            return Err(Error::UnboundedGame);
        }
        info!("CFR solver for {} players: {:?}", num_players, config);

        Ok(Self {
            game,
            config,
            info_states: InfoStateTable::new(),
            num_players,
            iteration: 0,
        })
    }

    pub fn game_ref(&self) -> &'g G {
        self.game
    }

    pub fn config(&self) -> &CfrConfig {
        &self.config
    }

    /// Number of completed calls to `evaluate_and_update_policy`.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn num_info_states(&self) -> usize {
        self.info_states.len()
    }

    pub fn info_states(&self) -> &InfoStateTable<G> {
        &self.info_states
    }

    /// Runs one iteration: a full traversal from the root that accumulates
    /// regrets and policy weights, followed by regret matching.
    /// Returns the root values for each player under the policy that was played.
    pub fn evaluate_and_update_policy(&mut self) -> Vec<f64> {
        let update_player = if self.config.alternating_updates {
            Some(self.iteration % self.num_players)
        } else {
            None
        };
        self.iteration += 1;

        let root = self.game.new_root();
        // One entry per player plus a trailing entry for chance.
        let reach_probabilities = vec![1.0; self.num_players + 1];
        let values = self.compute_counterfactual_regret(&root, update_player, &reach_probabilities);

        for entry in self.info_states.values_mut() {
            if self.config.regret_matching_plus {
                entry.apply_regret_matching_plus_reset();
            }
            entry.regret_matching();
        }

        debug!(
            "iteration {:8} (update player: {:?}): root values {:?}, # of infoset: {}",
            self.iteration,
            update_player,
            values,
            self.info_states.len()
        );
        values
    }

    fn compute_counterfactual_regret(
        &mut self,
        state: &G::State,
        update_player: Option<usize>,
        reach_probabilities: &[f64],
    ) -> Vec<f64> {
        if self.game.is_terminal(state) {
            return self.game.get_payouts(state);
        }

        let mut state_value = vec![0.0; self.num_players];
        let player = match self.game.get_node_player_id(state) {
            PlayerId::Chance => {
                let chance_index = self.num_players;
                for (act, prob) in self.game.list_legal_chance_actions(state) {
                    let next_state = self.game.with_action(state, act);
                    let mut next_reach = reach_probabilities.to_vec();
                    next_reach[chance_index] *= prob;
                    let child_value =
                        self.compute_counterfactual_regret(&next_state, update_player, &next_reach);
                    for (p, v) in child_value.iter().enumerate() {
                        state_value[p] += prob * v;
                    }
                }
                return state_value;
            }
            PlayerId::Player(p) => p,
        };

        let game = self.game;
        let info_set = game.to_info_set(state);
        let (actions, policy) = {
            let values =
                self.info_states.get_or_insert_with(&info_set, || game.list_legal_actions(state));
            debug_assert_eq!(
                values.get_actions().len(),
                game.list_legal_actions(state).len(),
                "legal actions of {:?} don't match those of {}",
                state,
                info_set
            );
            (values.get_actions().to_vec(), values.current_policy().to_vec())
        };

        let mut child_values = Vec::with_capacity(actions.len());
        for (i, act) in actions.iter().enumerate() {
            let next_state = game.with_action(state, *act);
            let mut next_reach = reach_probabilities.to_vec();
            next_reach[player] *= policy[i];
            let child_value =
                self.compute_counterfactual_regret(&next_state, update_player, &next_reach);
            for (p, v) in child_value.iter().enumerate() {
                state_value[p] += policy[i] * v;
            }
            child_values.push(child_value);
        }

        if update_player.map_or(true, |u| u == player) {
            let counterfactual_reach: f64 = reach_probabilities
                .iter()
                .enumerate()
                .filter(|(p, _)| *p != player)
                .map(|(_, r)| r)
                .product();
            let self_reach = reach_probabilities[player];
            let averaging_weight = if self.config.linear_averaging {
                self.iteration as f64
            } else {
                1.0
            };

            let values =
                self.info_states.get_or_insert_with(&info_set, || game.list_legal_actions(state));
            for (i, child_value) in child_values.iter().enumerate() {
                let regret = child_value[player] - state_value[player];
                values.add_regret(i, regret, counterfactual_reach);
                values.add_policy(i, averaging_weight * self_reach * policy[i]);
            }
        }

        state_value
    }

    /// Live view of the policy the next iteration will play.
    pub fn current_policy(&self) -> CurrentPolicy<'_, G> {
        CurrentPolicy::new(&self.info_states)
    }

    /// Live view of the normalized cumulative policy.
    pub fn average_policy(&self) -> AveragePolicy<'_, G> {
        AveragePolicy::new(&self.info_states)
    }

    pub fn tabular_current_policy(&self) -> TabularPolicy<G> {
        self.current_policy().to_tabular()
    }

    pub fn tabular_average_policy(&self) -> TabularPolicy<G> {
        self.average_policy().to_tabular()
    }

    pub fn print_policy(&self) {
        if !log_enabled!(log::Level::Info) {
            return;
        }
        info!("Nodes [");
        for values in self.info_states.sorted() {
            info!("    {}", values);
        }
        info!("]");
        info!("# of infoset: {}", self.info_states.len());
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use approx::assert_abs_diff_eq;
    use more_asserts::assert_lt;

    use super::*;
    use crate::{
        eval::nash_conv,
        games::kuhn::Kuhn,
        policy::{
            Policy,
            PROBABILITY_TOLERANCE,
        },
    };

    fn train<G: Game>(game: &G, config: CfrConfig, iterations: usize) -> CfrSolver<'_, G> {
        let mut solver = CfrSolver::new(game, config).unwrap();
        for _ in 0..iterations {
            solver.evaluate_and_update_policy();
        }
        solver
    }

    #[test]
    fn test_kuhn_info_state_count() {
        let game = Kuhn::two_player();
        let solver = train(&game, CfrConfig::vanilla(), 1);
        // 3 cards x (p0: [], [Pass, Bet]; p1: [Pass], [Bet])
        assert_eq!(12, solver.num_info_states());

        let game = Kuhn::new(3, 1).unwrap();
        let solver = train(&game, CfrConfig::vanilla(), 1);
        // 4 cards x 12 histories
        assert_eq!(48, solver.num_info_states());
    }

    #[test]
    fn test_current_policy_is_distribution() {
        let game = Kuhn::new(3, 1).unwrap();
        let solver = train(&game, CfrConfig::vanilla(), 25);
        let current = solver.current_policy();
        for values in solver.info_states().values() {
            let probs = current.action_probabilities(values.info_set()).unwrap();
            assert!(probs.iter().all(|p| *p >= 0.0));
            assert_abs_diff_eq!(1.0, probs.iter().sum::<f64>(), epsilon = PROBABILITY_TOLERANCE);
        }
    }

    #[test]
    fn test_average_policy_is_idempotent() {
        let game = Kuhn::two_player();
        let solver = train(&game, CfrConfig::vanilla(), 10);
        let first = solver.tabular_average_policy();
        let second = solver.tabular_average_policy();
        assert_eq!(first, second);
        assert_eq!(solver.num_info_states(), first.len());
    }

    #[test]
    fn test_alternating_updates_cycle_players() {
        let game = Kuhn::two_player();
        let mut solver = CfrSolver::new(&game, CfrConfig::alternating()).unwrap();
        solver.evaluate_and_update_policy();

        let updated: HashSet<usize> = solver
            .info_states()
            .values()
            .filter(|v| v.cumulative_policy().iter().sum::<f64>() > 0.0)
            .map(|v| v.info_set().player_id)
            .collect();
        assert_eq!(HashSet::from([0]), updated);

        solver.evaluate_and_update_policy();
        assert!(solver
            .info_states()
            .values()
            .all(|v| v.cumulative_policy().iter().sum::<f64>() > 0.0));
    }

    #[test]
    fn test_regret_matching_plus_keeps_regrets_non_negative() {
        let game = Kuhn::two_player();
        let config = CfrConfig {
            regret_matching_plus: true,
            ..CfrConfig::default()
        };
        let solver = train(&game, config, 20);
        for values in solver.info_states().values() {
            assert!(values.cumulative_regrets().iter().all(|r| *r >= 0.0));
        }
    }

    #[test]
    fn test_root_value_approaches_game_value() {
        let game = Kuhn::two_player();
        let mut solver = CfrSolver::new(&game, CfrConfig::vanilla()).unwrap();
        let mut total = 0.0;
        let iterations = 2000;
        for _ in 0..iterations {
            total += solver.evaluate_and_update_policy()[0];
        }
        assert_abs_diff_eq!(-1.0 / 18.0, total / iterations as f64, epsilon = 0.02);
    }

    #[test]
    fn test_variants_converge_on_kuhn() {
        let game = Kuhn::two_player();
        for config in [
            CfrConfig::vanilla(),
            CfrConfig::alternating(),
            CfrConfig {
                linear_averaging: true,
                ..CfrConfig::default()
            },
            CfrConfig::cfr_plus(),
        ] {
            let solver = train(&game, config, 1000);
            let conv = nash_conv(&game, &solver.average_policy());
            assert_lt!(conv, 0.05, "{:?}", config);
        }
    }

    #[test]
    fn test_nash_conv_trends_down() {
        let game = Kuhn::two_player();
        let mut solver = CfrSolver::new(&game, CfrConfig::vanilla()).unwrap();
        let mut checkpoints = vec![];
        for i in 1..=1000 {
            solver.evaluate_and_update_policy();
            if i == 10 || i == 100 || i == 1000 {
                checkpoints.push(nash_conv(&game, &solver.average_policy()));
            }
        }
        assert_lt!(checkpoints[1], checkpoints[0] + 1e-3);
        assert_lt!(checkpoints[2], checkpoints[1] + 1e-3);
    }

    /// Player 0 has a single legal move, then player 1 picks heads (0) or
    /// tails (1) and wins on tails. Player 0 can't tell the deals apart when
    /// `uneven_deal` is set, yet one of them offers an extra action.
    struct ForcedMove {
        uneven_deal: bool,
    }

    impl Game for ForcedMove {
        type State = Vec<u32>;
        type InfoSet = usize;
        type Action = u32;

        fn num_players(&self) -> usize {
            2
        }
        fn max_game_length(&self) -> Option<usize> {
            Some(3)
        }
        fn new_root(&self) -> Vec<u32> {
            if self.uneven_deal {
                vec![]
            } else {
                vec![0]
            }
        }
        fn to_info_set(&self, state: &Vec<u32>) -> usize {
            state.len() - 1
        }
        fn is_terminal(&self, state: &Vec<u32>) -> bool {
            state.len() == 3
        }
        fn get_payouts(&self, state: &Vec<u32>) -> Vec<f64> {
            if state[2] == 1 {
                vec![-1.0, 1.0]
            } else {
                vec![1.0, -1.0]
            }
        }
        fn get_node_player_id(&self, state: &Vec<u32>) -> PlayerId {
            match state.len() {
                0 => PlayerId::Chance,
                n => PlayerId::Player(n - 1),
            }
        }
        fn with_action(&self, state: &Vec<u32>, action: u32) -> Vec<u32> {
            let mut next = state.clone();
            next.push(action);
            next
        }
        fn list_legal_actions(&self, state: &Vec<u32>) -> Vec<u32> {
            match state.len() {
                1 => (0..=state[0]).collect(),
                _ => vec![0, 1],
            }
        }
        fn list_legal_chance_actions(&self, _state: &Vec<u32>) -> Vec<(u32, f64)> {
            vec![(0, 0.5), (1, 0.5)]
        }
    }

    #[test]
    fn test_single_action_gets_full_probability() {
        let game = ForcedMove {
            uneven_deal: false,
        };
        for config in [CfrConfig::vanilla(), CfrConfig::cfr_plus()] {
            let solver = train(&game, config, 5);
            assert_eq!(Some(vec![1.0]), solver.current_policy().action_probabilities(&0));
            assert_eq!(Some(vec![1.0]), solver.average_policy().action_probabilities(&0));
            assert_eq!(Some(&[1.0][..]), solver.tabular_average_policy().get(&0));
            // Tails always wins for player 1.
            assert_lt!(0.5, solver.average_policy().action_probabilities(&1).unwrap()[1]);
        }
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "don't match those of")]
    fn test_action_count_change_within_info_state() {
        let game = ForcedMove {
            uneven_deal: true,
        };
        train(&game, CfrConfig::vanilla(), 1);
    }

    #[test]
    fn test_unbounded_game_is_rejected() {
        struct Endless;
        impl Game for Endless {
            type State = u32;
            type InfoSet = u32;
            type Action = u32;

            fn num_players(&self) -> usize {
                1
            }
            fn max_game_length(&self) -> Option<usize> {
                None
            }
            fn new_root(&self) -> u32 {
                0
            }
            fn to_info_set(&self, state: &u32) -> u32 {
                *state
            }
            fn is_terminal(&self, _state: &u32) -> bool {
                false
            }
            fn get_payouts(&self, _state: &u32) -> Vec<f64> {
                vec![0.0]
            }
            fn get_node_player_id(&self, _state: &u32) -> PlayerId {
                PlayerId::Player(0)
            }
            fn with_action(&self, state: &u32, action: u32) -> u32 {
                state + action
            }
            fn list_legal_actions(&self, _state: &u32) -> Vec<u32> {
                vec![1]
            }
            fn list_legal_chance_actions(&self, _state: &u32) -> Vec<(u32, f64)> {
                vec![]
            }
        }

        assert_eq!(Some(Error::UnboundedGame), CfrSolver::new(&Endless, CfrConfig::vanilla()).err());
    }
}
