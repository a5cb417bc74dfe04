pub mod kuhn;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum PlayerId {
    Chance,
    Player(usize),
}

impl PlayerId {
    pub fn index(&self) -> usize {
        match self {
            PlayerId::Player(i) => *i,
            PlayerId::Chance => panic!("chance player has no index"),
        }
    }
}

/// Identifier of an information state.
///
/// Keys must embed the acting player so that a single table can hold every
/// player's information states.
pub trait InfoSet:
    std::fmt::Display + std::fmt::Debug + std::hash::Hash + std::cmp::Eq + std::cmp::Ord + Clone
{
}

impl<T> InfoSet for T where
    T: std::fmt::Display + std::fmt::Debug + std::hash::Hash + std::cmp::Eq + std::cmp::Ord + Clone
{
}

pub trait Game {
    type State: Clone + std::fmt::Debug + std::hash::Hash + std::cmp::Eq;
    type InfoSet: InfoSet;
    type Action: std::fmt::Display + std::fmt::Debug + Copy + std::hash::Hash + std::cmp::Eq;

    fn num_players(&self) -> usize;

    /// Upper bound on the number of moves (chance included) of any history.
    /// `None` means the game tree is unbounded and cannot be traversed exactly.
    fn max_game_length(&self) -> Option<usize>;

    fn new_root(&self) -> Self::State;

    fn to_info_set(&self, state: &Self::State) -> Self::InfoSet;

    fn is_terminal(&self, state: &Self::State) -> bool;

    /// Returns one value per player.
    fn get_payouts(&self, state: &Self::State) -> Vec<f64>;

    fn get_node_player_id(&self, state: &Self::State) -> PlayerId;

    fn with_action(&self, state: &Self::State, action: Self::Action) -> Self::State;

    fn list_legal_actions(&self, state: &Self::State) -> Vec<Self::Action>;

    fn list_legal_chance_actions(&self, state: &Self::State) -> Vec<(Self::Action, f64)>;
}
