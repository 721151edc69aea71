//! The abstract-simulator protocol over wire events.
//!
//! A [`ModelAdapter`] binds a component to a [`PortTable`] and exposes the
//! protocol operations in terms of [`Event`]s. [`Simulate`] is the
//! object-safe face of the adapter so that models with different native
//! value types can sit side by side in one registry.

use crate::{
    atomic::{Atomic, InitContext, Time, INFINITY},
    codec::{self, Event},
    port::PortTable,
};
use serde::{de::DeserializeOwned, Serialize};

/// Where a model is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AdapterState {
    Uninitialized,
    /// Initialized, with an internal event pending.
    Imminent,
    /// Initialized, with nothing pending.
    Idle,
    Terminated,
}

impl AdapterState {
    /// Imminent or Idle.
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Imminent | Self::Idle)
    }
}

/// Simulation time as seen by one model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Clock {
    /// Time of the last transition, counted from initialization.
    pub time: Time,
    /// The session bound from the parameter document, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_max: Option<Time>,
}

/// The protocol operations of a wrapped model.
pub trait Simulate: Send {
    /// Initializes the model. Always reports success once called.
    fn initialize(&mut self, context: &InitContext) -> bool;

    fn is_initialized(&self) -> bool;

    /// Time until the next internal event.
    fn time_advance(&self) -> Time;

    /// Runs the pending internal event. Reports `false` if there is none.
    fn internal_transition(&mut self) -> bool;

    /// Delivers every decodable event to the model.
    fn external_transition(&mut self, elapsed: Time, events: &[Event]) -> bool;

    /// Delivers events that arrive exactly when an internal event is due.
    fn confluent_transition(&mut self, events: &[Event]) -> bool;

    /// The model's next output, as wire events.
    fn output_function(&self) -> Vec<Event>;

    fn ports(&self) -> &PortTable;

    fn ports_mut(&mut self) -> &mut PortTable;

    fn clock(&self) -> Clock;
}

/// Binds a component to its port table and clock.
pub struct ModelAdapter<M> {
    model: M,
    ports: PortTable,
    clock: Clock,
    initialized: bool,
}

impl<M: Atomic> ModelAdapter<M> {
    pub fn new(model: M, ports: PortTable) -> Self {
        Self {
            model,
            ports,
            clock: Clock::default(),
            initialized: false,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

impl<M> Simulate for ModelAdapter<M>
where
    M: Atomic,
    M::Value: Serialize + DeserializeOwned,
{
    fn initialize(&mut self, context: &InitContext) -> bool {
        if let Err(e) = self.model.initialize(context) {
            tracing::warn!("Model initialization failed: {}", e);
        }
        self.clock = Clock {
            time: 0.0,
            time_max: context.time_max(),
        };
        self.initialized = true;
        true
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn time_advance(&self) -> Time {
        self.model.time_advance()
    }

    fn internal_transition(&mut self) -> bool {
        let advance = self.model.time_advance();
        if advance == INFINITY {
            return false;
        }
        self.model.internal_transition();
        self.clock.time += advance;
        true
    }

    fn external_transition(&mut self, elapsed: Time, events: &[Event]) -> bool {
        if elapsed.is_nan() || elapsed < 0.0 {
            tracing::warn!("Rejecting external transition with elapsed time {}", elapsed);
            return false;
        }
        let inputs = codec::decode_all(&self.ports, events);
        if inputs.is_empty() {
            return true;
        }
        self.model.external_transition(elapsed, &inputs);
        self.clock.time += elapsed;
        true
    }

    fn confluent_transition(&mut self, events: &[Event]) -> bool {
        let advance = self.model.time_advance();
        if advance == INFINITY {
            return false;
        }
        let inputs = codec::decode_all(&self.ports, events);
        if inputs.is_empty() {
            self.model.internal_transition();
        } else {
            self.model.confluent_transition(&inputs);
        }
        self.clock.time += advance;
        true
    }

    fn output_function(&self) -> Vec<Event> {
        codec::encode_all(&self.ports, &self.model.output())
    }

    fn ports(&self) -> &PortTable {
        &self.ports
    }

    fn ports_mut(&mut self) -> &mut PortTable {
        &mut self.ports
    }

    fn clock(&self) -> Clock {
        self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic::{ModelError, PortIndex, PortValue};
    use serde_json::json;
    use tracing_test::traced_test;

    /// Collects every input and emits the running total after `delay`.
    #[derive(Default)]
    struct Summer {
        total: i64,
        received: usize,
        sigma: Option<Time>,
        delay: Time,
    }

    impl Atomic for Summer {
        type Value = i64;

        fn initialize(&mut self, context: &InitContext) -> Result<(), ModelError> {
            self.delay = context.number("delay").unwrap_or(1.0);
            if context.parameter("fail").is_some() {
                return Err(ModelError::Other("asked to fail".into()));
            }
            Ok(())
        }

        fn time_advance(&self) -> Time {
            self.sigma.unwrap_or(INFINITY)
        }

        fn internal_transition(&mut self) {
            self.sigma = None;
        }

        fn external_transition(&mut self, _elapsed: Time, inputs: &[PortValue<i64>]) {
            for input in inputs {
                self.total += input.value;
                self.received += 1;
            }
            self.sigma = Some(self.delay);
        }

        fn output(&self) -> Vec<PortValue<i64>> {
            vec![PortValue::new(1, self.total), PortValue::new(9, -1)]
        }

        fn input_ports(&self) -> Vec<PortIndex> {
            vec![0]
        }

        fn output_ports(&self) -> Vec<PortIndex> {
            vec![1, 9]
        }
    }

    fn adapter() -> ModelAdapter<Summer> {
        let ports = PortTable::from_pairs([("in", 0), ("sum", 1)]).unwrap();
        let mut adapter = ModelAdapter::new(Summer::default(), ports);
        let parameters = json!({"delay": 2.0, "timeMax": 10.0});
        assert!(adapter.initialize(&InitContext::new(Some(&parameters))));
        adapter
    }

    #[test]
    fn initialize_reads_parameters() {
        let adapter = adapter();
        assert!(adapter.is_initialized());
        assert_eq!(
            adapter.clock(),
            Clock {
                time: 0.0,
                time_max: Some(10.0)
            }
        );
        assert_eq!(adapter.time_advance(), INFINITY);
    }

    #[test]
    #[traced_test]
    fn initialize_failure_still_reports_success() {
        let mut adapter = ModelAdapter::new(Summer::default(), PortTable::new());
        let parameters = json!({"fail": true});
        assert!(adapter.initialize(&InitContext::new(Some(&parameters))));
        assert!(adapter.is_initialized());
        assert!(logs_contain("asked to fail"));
    }

    #[test]
    #[traced_test]
    fn external_delivers_surviving_events() {
        let mut adapter = adapter();
        let events = [
            Event::from_value("in", &json!(2)),
            Event::new("in", "{broken"),
            Event::from_value("in", &json!(5)),
        ];
        assert!(adapter.external_transition(0.5, &events));
        assert_eq!(adapter.model().total, 7);
        assert_eq!(adapter.model().received, 2);
        assert_eq!(adapter.clock().time, 0.5);
        assert_eq!(adapter.time_advance(), 2.0);
    }

    #[test]
    fn external_with_nothing_decodable_leaves_model_alone() {
        let mut adapter = adapter();
        assert!(adapter.external_transition(1.0, &[Event::from_value("elsewhere", &json!(1))]));
        assert_eq!(adapter.model().received, 0);
        assert_eq!(adapter.time_advance(), INFINITY);
        assert_eq!(adapter.clock().time, 0.0);
    }

    #[test]
    fn external_rejects_bad_elapsed() {
        let mut adapter = adapter();
        let events = [Event::from_value("in", &json!(1))];
        assert!(!adapter.external_transition(-1.0, &events));
        assert!(!adapter.external_transition(Time::NAN, &events));
        assert_eq!(adapter.model().received, 0);
    }

    #[test]
    fn internal_needs_pending_event() {
        let mut adapter = adapter();
        assert!(!adapter.internal_transition());

        adapter.external_transition(1.0, &[Event::from_value("in", &json!(3))]);
        assert!(adapter.internal_transition());
        assert_eq!(adapter.clock().time, 3.0);
        assert_eq!(adapter.time_advance(), INFINITY);
    }

    #[test]
    fn output_drops_unmapped_ports() -> anyhow::Result<()> {
        let mut adapter = adapter();
        adapter.external_transition(0.0, &[Event::from_value("in", &json!(4))]);
        let output = adapter.output_function();
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].port, "sum");
        assert_eq!(output[0].json()?, json!(4));
        Ok(())
    }

    #[test]
    fn confluent_needs_pending_event() {
        let mut adapter = adapter();
        assert!(!adapter.confluent_transition(&[Event::from_value("in", &json!(1))]));

        adapter.external_transition(0.0, &[Event::from_value("in", &json!(1))]);
        assert!(adapter.confluent_transition(&[Event::from_value("in", &json!(10))]));
        assert_eq!(adapter.model().total, 11);
        // The external part rescheduled, the internal part then cleared it
        assert_eq!(adapter.time_advance(), INFINITY);
        assert_eq!(adapter.clock().time, 2.0);
    }

    #[test]
    fn state_is_ready_when_initialized() {
        assert!(AdapterState::Idle.is_ready());
        assert!(AdapterState::Imminent.is_ready());
        assert!(!AdapterState::Uninitialized.is_ready());
        assert!(!AdapterState::Terminated.is_ready());
    }
}
