//! Remote controls that drive one model instance each.

use crate::{
    atomic::{Time, INFINITY},
    codec::Event,
    instance::{InstanceError, ModelInstance},
    logging::simulator_destroyed_event,
    Id,
};
use dashmap::DashMap;
use std::{
    fmt,
    sync::{Arc, Mutex, Weak},
};

/// Live simulators by id.
pub(crate) type SimulatorTable = DashMap<Id, Simulator>;

struct Shared {
    id: Id,
    model: Mutex<Option<ModelInstance>>,
    table: Weak<SimulatorTable>,
}

/// A remote control for one model instance.
///
/// The simulator does not schedule anything itself. Whoever drives it polls
/// [`next_event_time`](Simulator::next_event_time) and
/// [`halt`](Simulator::halt), decides when to call
/// [`exec_next_event`](Simulator::exec_next_event), and injects external
/// events through [`compute_next_state`](Simulator::compute_next_state).
#[derive(Clone)]
pub struct Simulator(Arc<Shared>);

impl Simulator {
    /// Creates a simulator that no registry keeps track of.
    pub fn new(id: Id, model: ModelInstance) -> Self {
        Self::create(id, model, Weak::new())
    }

    pub(crate) fn create(id: Id, model: ModelInstance, table: Weak<SimulatorTable>) -> Self {
        Self(Arc::new(Shared {
            id,
            model: Mutex::new(Some(model)),
            table,
        }))
    }

    pub fn id(&self) -> Id {
        self.0.id
    }

    /// The bound model instance.
    pub fn get_model(&self) -> Result<ModelInstance, InstanceError> {
        self.0
            .model
            .lock()
            .map_err(|_| InstanceError::Poisoned(self.id()))?
            .clone()
            .ok_or(InstanceError::Destroyed(self.id()))
    }

    /// Initializes the bound model.
    pub fn start(&self) -> Result<bool, InstanceError> {
        self.get_model()?.initialize()
    }

    /// Time until the bound model's next internal event.
    pub fn next_event_time(&self) -> Result<Time, InstanceError> {
        self.get_model()?.time_advance()
    }

    /// Runs the bound model's next internal event. Whether it is due is the
    /// caller's call.
    pub fn exec_next_event(&self) -> Result<bool, InstanceError> {
        self.get_model()?.internal_transition()
    }

    /// Whether the bound model has nothing left to do.
    pub fn halt(&self) -> Result<bool, InstanceError> {
        Ok(self.next_event_time()? == INFINITY)
    }

    pub fn compute_next_output(&self) -> Result<Vec<Event>, InstanceError> {
        self.get_model()?.output_function()
    }

    pub fn compute_next_state(&self, elapsed: Time, events: &[Event]) -> Result<bool, InstanceError> {
        self.get_model()?.external_transition(elapsed, events)
    }

    /// Unbinds the model. The model itself lives on until it is destroyed.
    pub fn destroy(&self) -> Result<(), InstanceError> {
        let model = self
            .0
            .model
            .lock()
            .map_err(|_| InstanceError::Poisoned(self.id()))?
            .take();
        if model.is_none() {
            return Err(InstanceError::Destroyed(self.id()));
        }
        if let Some(table) = self.0.table.upgrade() {
            table.remove(&self.id());
        }
        simulator_destroyed_event(self.id());
        Ok(())
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.model.lock().map(|model| model.is_none()).unwrap_or(true)
    }
}

impl fmt::Debug for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator").field("id", &self.id()).finish()
    }
}
