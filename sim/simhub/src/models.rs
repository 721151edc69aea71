//! Models every SimHub process registers at startup.

use simhub_core::Registry;

pub mod echo;
pub use echo::Echo;

pub mod gpt;

mod generator;
pub use generator::Generator;

mod processor;
pub use processor::Processor;

mod observer;
pub use observer::Observer;

mod interval;
pub use interval::{Interval, Sampler};

mod traffic;
pub use traffic::{Job, Observation, Phase, Traffic};

/// Registers every built-in model.
pub fn register_all(registry: &Registry) {
    echo::register(registry);
    gpt::register(registry);
}
