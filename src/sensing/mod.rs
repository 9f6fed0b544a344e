mod controller;
mod loop_worker;
pub mod sampler;

pub use controller::SamplingController;
pub use sampler::{ReadingOutcome, StepSampler, MAX_PLAUSIBLE_DELTA};
