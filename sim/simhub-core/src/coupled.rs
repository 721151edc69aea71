//! Networks of components wired together by port couplings.
//!
//! A [`CoupledModel`] is built once with a [`CoupledBuilder`], which checks
//! every coupling against the ports its components declare and resolves the
//! network's output producer and input consumer. Routing is fixed after
//! that. Because a [`CoupledModel`] is itself [`Atomic`], networks nest and
//! can be wrapped exactly like a single component.

use crate::{
    atomic::{Atomic, InitContext, ModelError, PortIndex, PortValue, Time, INFINITY},
    metadata::ModelMetadata,
    Id,
};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::hash_map::Entry;

/// Identifies a component within one network. Derived from its name.
pub type ComponentId = Id;

/// A directed connection from an output port of one component to an input
/// port of another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coupling {
    pub from: ComponentId,
    pub from_port: PortIndex,
    pub to: ComponentId,
    pub to_port: PortIndex,
}

/// The part a component plays in its network's external interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Its output is the network's output.
    Producer,
    /// It receives the network's input.
    Consumer,
    ProducerConsumer,
    Neither,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Atomic,
    Coupled,
}

struct Component<V: Clone + Send + 'static> {
    name: String,
    kind: Kind,
    model: Box<dyn Atomic<Value = V>>,
    /// Absolute time of the component's last transition.
    last: Time,
}

impl<V: Clone + Send + 'static> Component<V> {
    fn next_event(&self) -> Time {
        self.last + self.model.time_advance()
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum CouplingError {
    #[error("More than one component is named <{0}>")]
    DuplicateComponent(String),
    #[error("No component is named <{0}>")]
    UnknownComponent(String),
    #[error("Component <{component}> does not declare port {port}")]
    UndeclaredPort { component: String, port: PortIndex },
    #[error("Coupling from <{from}>:{from_port} to <{to}>:{to_port} is declared twice")]
    DuplicateCoupling {
        from: String,
        from_port: PortIndex,
        to: String,
        to_port: PortIndex,
    },
    #[error("Component <{0}> cannot be coupled to itself")]
    SelfCoupling(String),
}

/// Collects components and couplings for a [`CoupledModel`].
///
/// Nothing is checked until [`build`](CoupledBuilder::build).
pub struct CoupledBuilder<V: Clone + Send + 'static> {
    components: Vec<Component<V>>,
    couplings: Vec<(String, PortIndex, String, PortIndex)>,
    producer: Option<String>,
    consumer: Option<String>,
}

impl<V: Clone + Send + 'static> CoupledBuilder<V> {
    pub fn new() -> Self {
        Self {
            components: vec![],
            couplings: vec![],
            producer: None,
            consumer: None,
        }
    }

    /// Adds an atomic component.
    pub fn atomic(self, name: impl Into<String>, component: impl Atomic<Value = V>) -> Self {
        self.component(name.into(), Kind::Atomic, Box::new(component))
    }

    /// Adds an atomic component that is already boxed.
    pub fn boxed(self, name: impl Into<String>, component: Box<dyn Atomic<Value = V>>) -> Self {
        self.component(name.into(), Kind::Atomic, component)
    }

    /// Adds a nested network as a component.
    pub fn coupled(self, name: impl Into<String>, network: CoupledModel<V>) -> Self {
        self.component(name.into(), Kind::Coupled, Box::new(network))
    }

    fn component(mut self, name: String, kind: Kind, model: Box<dyn Atomic<Value = V>>) -> Self {
        self.components.push(Component {
            name,
            kind,
            model,
            last: 0.0,
        });
        self
    }

    /// Connects output port `from_port` of `from` to input port `to_port` of
    /// `to`.
    pub fn couple(
        mut self,
        from: impl Into<String>,
        from_port: PortIndex,
        to: impl Into<String>,
        to_port: PortIndex,
    ) -> Self {
        self.couplings
            .push((from.into(), from_port, to.into(), to_port));
        self
    }

    /// Names the component whose output is the network's output.
    pub fn output_producer(mut self, name: impl Into<String>) -> Self {
        self.producer = Some(name.into());
        self
    }

    /// Names the component that receives the network's input.
    pub fn input_consumer(mut self, name: impl Into<String>) -> Self {
        self.consumer = Some(name.into());
        self
    }

    /// Takes the producer and consumer names from registered metadata.
    pub fn roles(mut self, metadata: &ModelMetadata) -> Self {
        self.producer = metadata.output_producer.clone();
        self.consumer = metadata.input_consumer.clone();
        self
    }

    pub fn build(self) -> Result<CoupledModel<V>, CouplingError> {
        let mut index = FxHashMap::default();
        for (i, component) in self.components.iter().enumerate() {
            match index.entry(Id::from_name(&component.name)) {
                Entry::Occupied(_) => {
                    return Err(CouplingError::DuplicateComponent(component.name.clone()))
                }
                Entry::Vacant(entry) => {
                    entry.insert(i);
                }
            }
        }

        let lookup = |name: &str| {
            index
                .get(&Id::from_name(name))
                .copied()
                .ok_or_else(|| CouplingError::UnknownComponent(name.to_string()))
        };

        let mut couplings = Vec::with_capacity(self.couplings.len());
        let mut seen = FxHashSet::default();
        let mut routes: FxHashMap<(usize, PortIndex), Vec<(usize, PortIndex)>> = FxHashMap::default();
        for (from, from_port, to, to_port) in self.couplings {
            let source = lookup(&from)?;
            let destination = lookup(&to)?;
            if source == destination {
                return Err(CouplingError::SelfCoupling(from));
            }
            if !self.components[source].model.output_ports().contains(&from_port) {
                return Err(CouplingError::UndeclaredPort {
                    component: from,
                    port: from_port,
                });
            }
            if !self.components[destination].model.input_ports().contains(&to_port) {
                return Err(CouplingError::UndeclaredPort {
                    component: to,
                    port: to_port,
                });
            }
            let coupling = Coupling {
                from: Id::from_name(&from),
                from_port,
                to: Id::from_name(&to),
                to_port,
            };
            if !seen.insert(coupling) {
                return Err(CouplingError::DuplicateCoupling {
                    from,
                    from_port,
                    to,
                    to_port,
                });
            }
            couplings.push(coupling);
            routes
                .entry((source, from_port))
                .or_default()
                .push((destination, to_port));
        }

        let producer = resolve_role(&self.components, &index, self.producer.as_deref(), "Output producer");
        let consumer = resolve_role(&self.components, &index, self.consumer.as_deref(), "Input consumer");
        let consumer_inputs = consumer
            .map(|c| self.components[c].model.input_ports())
            .unwrap_or_default();

        Ok(CoupledModel {
            components: self.components,
            index,
            routes,
            couplings,
            producer,
            consumer,
            consumer_inputs,
            now: 0.0,
        })
    }
}

impl<V: Clone + Send + 'static> Default for CoupledBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Finds the holder of a role. Only atomic components can hold one.
fn resolve_role<V: Clone + Send + 'static>(
    components: &[Component<V>],
    index: &FxHashMap<ComponentId, usize>,
    name: Option<&str>,
    role: &str,
) -> Option<usize> {
    let name = name?;
    match index.get(&Id::from_name(name)) {
        None => {
            tracing::warn!("{} <{}> is not a component of the network", role, name);
            None
        }
        Some(&i) if components[i].kind == Kind::Coupled => {
            tracing::warn!("{} <{}> is a coupled network, not an atomic component", role, name);
            None
        }
        Some(&i) => Some(i),
    }
}

/// A network of components with a static routing table.
pub struct CoupledModel<V: Clone + Send + 'static> {
    components: Vec<Component<V>>,
    index: FxHashMap<ComponentId, usize>,
    /// (source, output port) -> [(destination, input port)]
    routes: FxHashMap<(usize, PortIndex), Vec<(usize, PortIndex)>>,
    couplings: Vec<Coupling>,
    producer: Option<usize>,
    consumer: Option<usize>,
    consumer_inputs: Vec<PortIndex>,
    /// Absolute time of the network's last transition.
    now: Time,
}

impl<V: Clone + Send + 'static> CoupledModel<V> {
    pub fn builder() -> CoupledBuilder<V> {
        CoupledBuilder::new()
    }

    /// The role of the named component, or `None` if there is no such
    /// component.
    pub fn role(&self, name: &str) -> Option<Role> {
        let i = *self.index.get(&Id::from_name(name))?;
        Some(match (self.producer == Some(i), self.consumer == Some(i)) {
            (true, true) => Role::ProducerConsumer,
            (true, false) => Role::Producer,
            (false, true) => Role::Consumer,
            (false, false) => Role::Neither,
        })
    }

    pub fn output_producer(&self) -> Option<&str> {
        self.producer.map(|i| self.components[i].name.as_str())
    }

    pub fn input_consumer(&self) -> Option<&str> {
        self.consumer.map(|i| self.components[i].name.as_str())
    }

    pub fn couplings(&self) -> &[Coupling] {
        &self.couplings
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Absolute time of the earliest scheduled internal event.
    fn next_event(&self) -> Time {
        self.components
            .iter()
            .map(Component::next_event)
            .fold(INFINITY, Time::min)
    }

    fn accepted(&self, inputs: &[PortValue<V>]) -> Vec<PortValue<V>> {
        inputs
            .iter()
            .filter(|input| self.consumer_inputs.contains(&input.port))
            .cloned()
            .collect()
    }

    /// Runs every component that is imminent at `t`, with `external` joining
    /// the consumer's inputs.
    fn step(&mut self, t: Time, external: &[PortValue<V>]) {
        let imminent: Vec<bool> = self
            .components
            .iter()
            .map(|component| component.next_event() == t)
            .collect();
        let mut bags: Vec<Vec<PortValue<V>>> = vec![vec![]; self.components.len()];
        if let Some(consumer) = self.consumer {
            bags[consumer] = self.accepted(external);
        }

        // All outputs are taken before any component changes state
        for (i, component) in self.components.iter().enumerate() {
            if !imminent[i] {
                continue;
            }
            for output in component.model.output() {
                if let Some(targets) = self.routes.get(&(i, output.port)) {
                    for &(destination, port) in targets {
                        bags[destination].push(PortValue::new(port, output.value.clone()));
                    }
                }
            }
        }

        for ((component, bag), imminent) in self.components.iter_mut().zip(bags).zip(imminent) {
            match (imminent, bag.is_empty()) {
                (true, true) => component.model.internal_transition(),
                (true, false) => component.model.confluent_transition(&bag),
                (false, false) => component.model.external_transition(t - component.last, &bag),
                (false, true) => continue,
            }
            component.last = t;
        }
        self.now = t;
    }
}

impl<V: Clone + Send + 'static> Atomic for CoupledModel<V> {
    type Value = V;

    fn initialize(&mut self, context: &InitContext) -> Result<(), ModelError> {
        for component in self.components.iter_mut() {
            component.model.initialize(context)?;
            component.last = 0.0;
        }
        self.now = 0.0;
        Ok(())
    }

    fn time_advance(&self) -> Time {
        let next = self.next_event();
        if next == INFINITY {
            INFINITY
        } else {
            next - self.now
        }
    }

    fn internal_transition(&mut self) {
        let next = self.next_event();
        if next != INFINITY {
            self.step(next, &[]);
        }
    }

    fn external_transition(&mut self, elapsed: Time, inputs: &[PortValue<V>]) {
        let t = self.now + elapsed;
        let accepted = self.accepted(inputs);
        if let Some(consumer) = self.consumer {
            if !accepted.is_empty() {
                let component = &mut self.components[consumer];
                component
                    .model
                    .external_transition(t - component.last, &accepted);
                component.last = t;
            }
        }
        self.now = t;
    }

    fn confluent_transition(&mut self, inputs: &[PortValue<V>]) {
        let next = self.next_event();
        if next == INFINITY {
            self.external_transition(0.0, inputs);
        } else {
            self.step(next, inputs);
        }
    }

    /// The producer's output, if the producer takes part in the next event.
    fn output(&self) -> Vec<PortValue<V>> {
        let next = self.next_event();
        match self.producer {
            Some(producer) if next != INFINITY && self.components[producer].next_event() == next => {
                self.components[producer].model.output()
            }
            _ => vec![],
        }
    }

    fn input_ports(&self) -> Vec<PortIndex> {
        self.consumer_inputs.clone()
    }

    fn output_ports(&self) -> Vec<PortIndex> {
        self.producer
            .map(|producer| self.components[producer].model.output_ports())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    /// Emits an increasing count on port 1 every `period`.
    struct Pulse {
        period: Time,
        sigma: Time,
        count: u32,
    }

    impl Pulse {
        fn new(period: Time) -> Self {
            Self {
                period,
                sigma: period,
                count: 1,
            }
        }
    }

    impl Atomic for Pulse {
        type Value = u32;

        fn time_advance(&self) -> Time {
            self.sigma
        }

        fn internal_transition(&mut self) {
            self.count += 1;
            self.sigma = self.period;
        }

        fn external_transition(&mut self, elapsed: Time, inputs: &[PortValue<u32>]) {
            self.sigma -= elapsed;
            if inputs.iter().any(|input| input.port == 0) {
                self.sigma = INFINITY;
            }
        }

        fn output(&self) -> Vec<PortValue<u32>> {
            vec![PortValue::new(1, self.count)]
        }

        fn input_ports(&self) -> Vec<PortIndex> {
            vec![0]
        }

        fn output_ports(&self) -> Vec<PortIndex> {
            vec![1]
        }
    }

    /// Forwards every input from port 0 to port 1 immediately and remembers
    /// everything it forwarded.
    #[derive(Default)]
    struct Relay {
        pending: Vec<u32>,
        seen: Vec<u32>,
    }

    impl Atomic for Relay {
        type Value = u32;

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

        fn external_transition(&mut self, _elapsed: Time, inputs: &[PortValue<u32>]) {
            for input in inputs {
                self.pending.push(input.value);
                self.seen.push(input.value);
            }
        }

        fn output(&self) -> Vec<PortValue<u32>> {
            self.pending.iter().map(|&v| PortValue::new(1, v)).collect()
        }

        fn input_ports(&self) -> Vec<PortIndex> {
            vec![0]
        }

        fn output_ports(&self) -> Vec<PortIndex> {
            vec![1]
        }
    }

    fn pipeline() -> CoupledModel<u32> {
        CoupledModel::builder()
            .atomic("pulse", Pulse::new(1.0))
            .atomic("relay", Relay::default())
            .couple("pulse", 1, "relay", 0)
            .input_consumer("pulse")
            .output_producer("relay")
            .build()
            .unwrap()
    }

    #[test]
    fn rejects_bad_couplings() {
        let duplicate = CoupledModel::builder()
            .atomic("a", Relay::default())
            .atomic("a", Relay::default())
            .build();
        assert!(matches!(duplicate, Err(CouplingError::DuplicateComponent(name)) if name == "a"));

        let unknown = CoupledModel::builder()
            .atomic("a", Relay::default())
            .couple("a", 1, "b", 0)
            .build();
        assert!(matches!(unknown, Err(CouplingError::UnknownComponent(name)) if name == "b"));

        let undeclared = CoupledModel::builder()
            .atomic("a", Relay::default())
            .atomic("b", Relay::default())
            .couple("a", 0, "b", 0)
            .build();
        assert!(matches!(
            undeclared,
            Err(CouplingError::UndeclaredPort { component, port: 0 }) if component == "a"
        ));

        let twice = CoupledModel::builder()
            .atomic("a", Relay::default())
            .atomic("b", Relay::default())
            .couple("a", 1, "b", 0)
            .couple("a", 1, "b", 0)
            .build();
        assert!(matches!(twice, Err(CouplingError::DuplicateCoupling { .. })));

        let looped = CoupledModel::builder()
            .atomic("a", Relay::default())
            .couple("a", 1, "a", 0)
            .build();
        assert!(matches!(looped, Err(CouplingError::SelfCoupling(name)) if name == "a"));
    }

    #[test]
    fn resolves_roles() {
        let network = pipeline();
        assert_eq!(network.role("pulse"), Some(Role::Consumer));
        assert_eq!(network.role("relay"), Some(Role::Producer));
        assert_eq!(network.role("ghost"), None);
        assert_eq!(network.input_ports(), vec![0]);
        assert_eq!(network.output_ports(), vec![1]);

        let single = CoupledModel::builder()
            .atomic("only", Relay::default())
            .input_consumer("only")
            .output_producer("only")
            .build()
            .unwrap();
        assert_eq!(single.role("only"), Some(Role::ProducerConsumer));
    }

    #[test]
    #[traced_test]
    fn missing_or_coupled_role_holder_resolves_to_none() {
        let network = CoupledModel::builder()
            .coupled("inner", pipeline())
            .atomic("relay", Relay::default())
            .output_producer("inner")
            .input_consumer("nobody")
            .build()
            .unwrap();
        assert_eq!(network.output_producer(), None);
        assert_eq!(network.input_consumer(), None);
        assert_eq!(network.role("inner"), Some(Role::Neither));
        assert!(network.output().is_empty());
        assert!(network.input_ports().is_empty());
        assert!(logs_contain("is a coupled network"));
        assert!(logs_contain("is not a component"));
    }

    #[test]
    fn routes_outputs_between_components() {
        let mut network = pipeline();
        assert_eq!(network.time_advance(), 1.0);
        assert!(network.output().is_empty());

        network.internal_transition();
        assert_eq!(network.time_advance(), 0.0);
        assert_eq!(network.output(), vec![PortValue::new(1, 1)]);

        network.internal_transition();
        assert_eq!(network.time_advance(), 1.0);
        assert!(network.output().is_empty());
    }

    #[test]
    fn external_input_reaches_consumer() {
        let mut network = pipeline();
        network.external_transition(0.5, &[PortValue::new(0, 0), PortValue::new(7, 0)]);
        assert_eq!(network.time_advance(), INFINITY);
    }

    #[test]
    fn networks_nest() {
        let mut outer = CoupledModel::builder()
            .coupled("inner", pipeline())
            .atomic("tail", Relay::default())
            .couple("inner", 1, "tail", 0)
            .output_producer("tail")
            .build()
            .unwrap();

        let mut t = 0.0;
        let mut seen = vec![];
        loop {
            let next = t + outer.time_advance();
            if next > 3.0 {
                break;
            }
            t = next;
            outer.internal_transition();
            seen.extend(outer.output().into_iter().map(|output| output.value));
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn producer_output_only_when_due() {
        let mut network = CoupledModel::builder()
            .atomic("slow", Pulse::new(2.0))
            .atomic("fast", Pulse::new(1.0))
            .output_producer("slow")
            .build()
            .unwrap();

        let mut t = 0.0;
        let mut emitted = vec![];
        while t < 4.0 {
            t += network.time_advance();
            emitted.extend(network.output().into_iter().map(|output| (t, output.value)));
            network.internal_transition();
        }
        assert_eq!(emitted, vec![(2.0, 1), (4.0, 2)]);
    }

    #[test]
    fn confluent_inputs_precede_internal_step() {
        // The stop signal arrives exactly when the pulse is due, so the pulse
        // is stopped first and its internal transition reschedules it
        let mut network = pipeline();
        network.confluent_transition(&[PortValue::new(0, 0)]);
        assert_eq!(network.time_advance(), 0.0);
        assert_eq!(network.output(), vec![PortValue::new(1, 1)]);

        network.internal_transition();
        assert_eq!(network.time_advance(), 1.0);
    }
}
