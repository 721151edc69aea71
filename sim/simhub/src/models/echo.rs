use simhub_core::{Atomic, ModelMetadata, PortIndex, PortValue, Registry, Time, INFINITY};
use serde_json::Value as Json;

/// The name the model is registered under.
pub const NAME: &str = "Echo";

/// A model that immediately outputs every input it receives.
#[derive(Debug, Default, Clone)]
pub struct Echo {
    /// Inputs not yet echoed
    pending: Vec<Json>,
}

impl Echo {
    pub const IN: PortIndex = 0;
    pub const OUT: PortIndex = 1;

    pub fn new() -> Self {
        Self::default()
    }
}

impl Atomic for Echo {
    type Value = Json;

    fn time_advance(&self) -> Time {
        if self.pending.is_empty() {
            INFINITY
        } else {
            0.0
        }
    }

    fn internal_transition(&mut self) {
        self.pending.clear();
    }

    fn external_transition(&mut self, _elapsed: Time, inputs: &[PortValue<Json>]) {
        self.pending.extend(
            inputs
                .iter()
                .filter(|input| input.port == Self::IN)
                .map(|input| input.value.clone()),
        );
    }

    /// Only what was echoed at this instant is cleared. Inputs arriving at
    /// the same instant are echoed next.
    fn confluent_transition(&mut self, inputs: &[PortValue<Json>]) {
        let echoed = self.pending.len();
        self.external_transition(0.0, inputs);
        self.pending = self.pending.split_off(echoed);
    }

    fn output(&self) -> Vec<PortValue<Json>> {
        self.pending
            .iter()
            .map(|value| PortValue::new(Self::OUT, value.clone()))
            .collect()
    }

    fn input_ports(&self) -> Vec<PortIndex> {
        vec![Self::IN]
    }

    fn output_ports(&self) -> Vec<PortIndex> {
        vec![Self::OUT]
    }
}

pub fn metadata() -> ModelMetadata {
    ModelMetadata::new("Echo", "Outputs every input it receives immediately")
        .with_port("in", Echo::IN)
        .with_port("out", Echo::OUT)
}

pub fn register(registry: &Registry) {
    registry.add_model(NAME, metadata(), |_| Ok(Echo::new()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn echoes_inputs_at_once() {
        let mut echo = Echo::new();
        assert_eq!(echo.time_advance(), INFINITY);

        echo.external_transition(2.0, &[PortValue::new(Echo::IN, json!({"x": 1}))]);
        assert_eq!(echo.time_advance(), 0.0);
        assert_eq!(echo.output(), vec![PortValue::new(Echo::OUT, json!({"x": 1}))]);

        echo.internal_transition();
        assert_eq!(echo.time_advance(), INFINITY);
        assert!(echo.output().is_empty());
    }

    #[test]
    fn simultaneous_inputs_are_not_lost() {
        let mut echo = Echo::new();
        echo.external_transition(0.0, &[PortValue::new(Echo::IN, json!(1))]);
        echo.confluent_transition(&[PortValue::new(Echo::IN, json!(2))]);
        assert_eq!(echo.output(), vec![PortValue::new(Echo::OUT, json!(2))]);
    }
}
