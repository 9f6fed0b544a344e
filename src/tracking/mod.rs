pub mod controller;

pub use controller::{StartOutcome, TrackingController};
