//! Data structures, types, and the solvers for the interactive execution challenge: a bisection
//! game over a committed execution claim, narrowed down to a single adjudicated step.

mod types;
pub use types::*;

mod error;
pub use error::ChallengeError;

mod commitment;
pub use commitment::*;

mod machine;
pub use machine::Machine;

mod alphabet;
pub use alphabet::{AlphabetMachine, DEFAULT_PROGRAM};

mod bisection;
pub use bisection::*;

mod dispute;
pub use dispute::*;

mod state;
pub use state::{ChallengePhase, ChallengeState};

mod game;
pub(crate) use game::check_turn;
pub use game::Solver;

mod strategy;
pub use strategy::{ChallengeStrategy, FixedSegmentStrategy, StandardStrategy};

mod asserter;
pub use asserter::Asserter;

mod challenger;
pub use challenger::Challenger;

mod adjudicator;
pub use adjudicator::{OneStepAdjudicator, ReplayAdjudicator};
