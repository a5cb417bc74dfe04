use std::fmt::Display;

use more_asserts::debug_assert_lt;

use super::{
    Game,
    PlayerId,
};
use crate::error::{
    Error,
    Result,
};

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Card(pub usize);

impl Display for Card {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum KuhnAction {
    Pass,
    Bet,

    ChanceDeal(Card),
}

impl KuhnAction {
    const VALUES: [KuhnAction; 2] = [KuhnAction::Pass, KuhnAction::Bet];
}

impl Display for KuhnAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KuhnAction::Pass => write!(f, "Pass"),
            KuhnAction::Bet => write!(f, "Bet"),
            KuhnAction::ChanceDeal(c) => write!(f, "Deal({})", c),
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct KuhnInfoSet {
    pub player_id: usize,
    pub card: Card,
    pub actions: Vec<KuhnAction>,
}

impl From<&KuhnState> for KuhnInfoSet {
    fn from(state: &KuhnState) -> Self {
        let player_id = state.next_player_id.index();
        KuhnInfoSet {
            player_id,
            card: state.cards[player_id],
            actions: state.actions.clone(),
        }
    }
}

impl Display for KuhnInfoSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "p{}({}): [", self.player_id, self.card)?;
        for (i, act) in self.actions.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", act)?;
        }
        write!(f, "]")
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct KuhnState {
    pub next_player_id: PlayerId,
    // Cards dealt so far, indexed by player.
    pub cards: Vec<Card>,
    // Betting actions only.
    pub actions: Vec<KuhnAction>,
    pub first_bettor: Option<usize>,
}

/// N-player Kuhn poker: a deck of N + 1 cards, one card per player, a single
/// betting round with a bet size of one chip.
pub struct Kuhn {
    num_players: usize,
    ante: i32,
}

impl Kuhn {
    pub fn new(num_players: usize, ante: i32) -> Result<Self> {
        if num_players < 2 {
            return Err(Error::InvalidGameParameter(format!(
                "kuhn poker needs at least 2 players, got {}",
                num_players
            )));
        }
        if ante < 1 {
            return Err(Error::InvalidGameParameter(format!(
                "ante must be positive, got {}",
                ante
            )));
        }
        Ok(Self {
            num_players,
            ante,
        })
    }

    pub fn two_player() -> Self {
        Self {
            num_players: 2,
            ante: 1,
        }
    }

    fn contributions(&self, state: &KuhnState) -> Vec<i32> {
        let mut contributions = vec![self.ante; self.num_players];
        for (i, act) in state.actions.iter().enumerate() {
            if *act == KuhnAction::Bet {
                contributions[i % self.num_players] += 1;
            }
        }
        contributions
    }
}

impl Game for Kuhn {
    type State = KuhnState;
    type InfoSet = KuhnInfoSet;
    type Action = KuhnAction;

    fn num_players(&self) -> usize {
        self.num_players
    }

    fn max_game_length(&self) -> Option<usize> {
        // One deal per player, then at most 2N - 1 betting actions.
        Some(3 * self.num_players - 1)
    }

    fn new_root(&self) -> Self::State {
        KuhnState {
            next_player_id: PlayerId::Chance,
            cards: Vec::with_capacity(self.num_players),
            actions: vec![],
            first_bettor: None,
        }
    }

    #[inline]
    fn to_info_set(&self, state: &Self::State) -> Self::InfoSet {
        state.into()
    }

    fn is_terminal(&self, state: &Self::State) -> bool {
        match state.first_bettor {
            // Everyone after the bettor, wrapping around, has called or folded.
            Some(bettor) => state.actions.len() == bettor + self.num_players,
            None => state.actions.len() == self.num_players,
        }
    }

    fn get_payouts(&self, state: &Self::State) -> Vec<f64> {
        debug_assert!(self.is_terminal(state));

        let contributions = self.contributions(state);
        let in_hand: Vec<usize> = match state.first_bettor {
            Some(_) => (0..self.num_players).filter(|p| contributions[*p] > self.ante).collect(),
            None => (0..self.num_players).collect(),
        };
        let winner = in_hand
            .iter()
            .copied()
            .max_by_key(|p| state.cards[*p])
            .unwrap_or_else(|| panic!("no player left in hand: {:?}", state));
        let pot: i32 = contributions.iter().sum();

        (0..self.num_players)
            .map(|p| {
                if p == winner {
                    (pot - contributions[p]) as f64
                } else {
                    -contributions[p] as f64
                }
            })
            .collect()
    }

    #[inline]
    fn get_node_player_id(&self, state: &Self::State) -> PlayerId {
        state.next_player_id
    }

    fn with_action(&self, state: &Self::State, action: KuhnAction) -> Self::State {
        let mut next = state.clone();
        match action {
            KuhnAction::ChanceDeal(card) => {
                debug_assert_lt!(next.cards.len(), self.num_players);
                debug_assert!(!next.cards.contains(&card), "card dealt twice: {}", card);
                next.cards.push(card);
                if next.cards.len() == self.num_players {
                    next.next_player_id = PlayerId::Player(0);
                }
            }
            KuhnAction::Pass | KuhnAction::Bet => {
                let player = state.next_player_id.index();
                if action == KuhnAction::Bet && next.first_bettor.is_none() {
                    next.first_bettor = Some(player);
                }
                next.actions.push(action);
                next.next_player_id = PlayerId::Player((player + 1) % self.num_players);
            }
        }
        next
    }

    fn list_legal_actions(&self, _state: &Self::State) -> Vec<KuhnAction> {
        KuhnAction::VALUES.to_vec()
    }

    fn list_legal_chance_actions(&self, state: &Self::State) -> Vec<(KuhnAction, f64)> {
        let remaining: Vec<Card> =
            (0..=self.num_players).map(Card).filter(|c| !state.cards.contains(c)).collect();
        let prob = 1.0 / remaining.len() as f64;
        remaining.into_iter().map(|c| (KuhnAction::ChanceDeal(c), prob)).collect()
    }
}
