//! Prebuilt simulation setups for testing and examples.

mod echo;
pub use echo::echo;

mod gpt;
pub use gpt::{gpt, gpt_network, gpt_seeded};
