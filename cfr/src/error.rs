use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("Game must have at least one player")]
    NoPlayers,

    #[error("Game tree is unbounded and cannot be traversed exactly")]
    UnboundedGame,

    #[error("Invalid game parameter: {0}")]
    InvalidGameParameter(String),

    #[error("Correlation device has no joint policies")]
    EmptyCorrelationDevice,

    #[error("Invalid weight for joint policy #{index}: {weight}")]
    InvalidWeight { index: usize, weight: f64 },

    #[error("Correlation device weights sum to {0}, expected 1")]
    WeightsNotNormalized(f64),
}

pub type Result<T> = std::result::Result<T, Error>;
