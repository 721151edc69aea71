//! The [`Atomic`] trait and supporting types.
//!
//! An atomic model is the smallest simulable component. Everything above it
//! (coupled networks, the model adapter, the simulator) only ever talks to a
//! component through this trait:
//!
//! ```
//! use simhub_core::atomic::*;
//!
//! /// Emits a tick on port 0 every `period` time units.
//! struct Ticker {
//!     period: Time,
//!     ticks: u64,
//! }
//!
//! impl Atomic for Ticker {
//!     type Value = u64;
//!
//!     fn time_advance(&self) -> Time {
//!         self.period
//!     }
//!
//!     fn internal_transition(&mut self) {
//!         self.ticks += 1;
//!     }
//!
//!     fn external_transition(&mut self, _elapsed: Time, _inputs: &[PortValue<u64>]) {}
//!
//!     fn output(&self) -> Vec<PortValue<u64>> {
//!         vec![PortValue::new(0, self.ticks)]
//!     }
//!
//!     fn input_ports(&self) -> Vec<PortIndex> {
//!         vec![]
//!     }
//!
//!     fn output_ports(&self) -> Vec<PortIndex> {
//!         vec![0]
//!     }
//! }
//! ```

use crate::coupled::CouplingError;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Simulation time.
pub type Time = f64;

/// The time advance of a component with no pending internal event.
pub const INFINITY: Time = f64::INFINITY;

/// A model-native port number.
pub type PortIndex = u32;

/// A decoded value travelling on a particular port of a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortValue<V> {
    pub port: PortIndex,
    pub value: V,
}

impl<V> PortValue<V> {
    pub fn new(port: PortIndex, value: V) -> Self {
        Self { port, value }
    }
}

/// What a component gets to look at while it initializes.
#[derive(Debug, Clone, Copy, Default)]
pub struct InitContext<'a> {
    parameters: Option<&'a Json>,
}

impl<'a> InitContext<'a> {
    /// Creates a context exposing the given parameter document.
    pub fn new(parameters: Option<&'a Json>) -> Self {
        Self { parameters }
    }

    /// The full parameter document of the instance being initialized.
    pub fn parameters(&self) -> Option<&'a Json> {
        self.parameters
    }

    /// Looks up a top-level key of the parameter document.
    pub fn parameter(&self, key: &str) -> Option<&'a Json> {
        self.parameters?.get(key)
    }

    /// Looks up a numeric top-level key of the parameter document.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.parameter(key)?.as_f64()
    }

    /// The `timeMax` bound of the parameter document, if any.
    pub fn time_max(&self) -> Option<Time> {
        self.number("timeMax")
    }
}

/// A discrete-event component with no internal substructure.
///
/// The simulation kernel drives an atomic model only through these
/// functions. Transition functions receive the time elapsed since the
/// component's last transition of any kind.
pub trait Atomic: Send + 'static {
    /// The native value type carried on every port of the component.
    type Value: Clone + Send + 'static;

    /// Gives the component a chance to read its parameters before the first
    /// transition.
    fn initialize(&mut self, _context: &InitContext) -> Result<(), ModelError> {
        Ok(())
    }

    /// Time until the next internal event, or [`INFINITY`] when passive.
    fn time_advance(&self) -> Time;

    /// Advances the state past a due internal event.
    fn internal_transition(&mut self);

    /// Applies a bag of inputs that arrived `elapsed` time units after the
    /// last transition.
    fn external_transition(&mut self, elapsed: Time, inputs: &[PortValue<Self::Value>]);

    /// Applies a bag of inputs arriving exactly when an internal event is
    /// due. External effects are applied first, then the internal
    /// transition.
    fn confluent_transition(&mut self, inputs: &[PortValue<Self::Value>]) {
        let elapsed = self.time_advance();
        self.external_transition(elapsed, inputs);
        self.internal_transition();
    }

    /// The output emitted at the next internal event.
    fn output(&self) -> Vec<PortValue<Self::Value>>;

    /// The input ports the component declares.
    fn input_ports(&self) -> Vec<PortIndex>;

    /// The output ports the component declares.
    fn output_ports(&self) -> Vec<PortIndex>;
}

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid value for parameter <{key}>: {reason}")]
    Parameter { key: String, reason: String },
    #[error("{0}")]
    Coupling(#[from] CouplingError),
    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Its internal transition only succeeds once an external input has armed
    /// it, so the order of a confluent transition is observable.
    #[derive(Default)]
    struct Latch {
        armed: bool,
        fired: bool,
        sigma: Time,
    }

    impl Atomic for Latch {
        type Value = bool;

        fn time_advance(&self) -> Time {
            self.sigma
        }

        fn internal_transition(&mut self) {
            self.fired = self.armed;
            self.sigma = INFINITY;
        }

        fn external_transition(&mut self, elapsed: Time, inputs: &[PortValue<bool>]) {
            self.sigma -= elapsed;
            self.armed = inputs.iter().any(|input| input.value);
        }

        fn output(&self) -> Vec<PortValue<bool>> {
            vec![]
        }

        fn input_ports(&self) -> Vec<PortIndex> {
            vec![0]
        }

        fn output_ports(&self) -> Vec<PortIndex> {
            vec![]
        }
    }

    #[test]
    fn confluent_applies_external_first() {
        let mut latch = Latch {
            sigma: 2.0,
            ..Default::default()
        };
        latch.confluent_transition(&[PortValue::new(0, true)]);
        assert!(latch.fired);
        assert_eq!(latch.time_advance(), INFINITY);
    }

    #[test]
    fn context_reads_parameters() {
        let document = serde_json::json!({"modelName": "gpt", "timeMax": 5.0, "seed": 7});
        let context = InitContext::new(Some(&document));
        assert_eq!(context.time_max(), Some(5.0));
        assert_eq!(context.number("seed"), Some(7.0));
        assert!(context.parameter("missing").is_none());
        assert!(InitContext::default().time_max().is_none());
    }
}
