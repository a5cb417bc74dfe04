pub mod corr_dev;
pub mod corr_dist;
pub mod error;
pub mod eval;
pub mod games;
pub mod info_state;
pub mod policy;
pub mod solvers;

pub use corr_dev::{
    uniform_correlation_device,
    CorrDevBuilder,
    CorrelationDevice,
};
pub use corr_dist::{
    cce_dist,
    CorrDistInfo,
};
pub use error::{
    Error,
    Result,
};
pub use eval::{
    exploitability,
    nash_conv,
};
pub use policy::{
    Policy,
    TabularPolicy,
};
pub use solvers::cfr::{
    CfrConfig,
    CfrSolver,
};
