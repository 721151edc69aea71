//! Remotely addressable handles to live models.

use crate::{
    adapter::{AdapterState, Clock, Simulate},
    atomic::{InitContext, PortIndex, Time, INFINITY},
    codec::Event,
    logging::instance_destroyed_event,
    port::{PortError, PortTable},
    Id,
};
use dashmap::DashMap;
use serde_json::{json, Value as Json};
use std::{
    fmt,
    sync::{Arc, Mutex, Weak},
};

/// Live instances by id.
pub(crate) type InstanceTable = DashMap<Id, ModelInstance>;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum InstanceError {
    #[error("Instance {0} has been destroyed")]
    Destroyed(Id),
    #[error("Instance {0} has not been initialized")]
    NotInitialized(Id),
    #[error("Instance {0} was poisoned by a panic")]
    Poisoned(Id),
    #[error("Ports of instance {0} cannot change after initialization")]
    PortTableFrozen(Id),
    #[error("{0}")]
    Port(#[from] PortError),
}

struct Live {
    adapter: Box<dyn Simulate>,
    name: String,
}

struct Shared {
    id: Id,
    model_type: String,
    parameters: Option<Json>,
    live: Mutex<Option<Live>>,
    table: Weak<InstanceTable>,
}

/// A handle to a wrapped model.
///
/// Handles are cheap to clone and all clones refer to the same model. Calls
/// on one instance are serialized by a lock; distinct instances never
/// contend. Once [`destroy`](ModelInstance::destroy) has been called on any
/// clone, the model is dropped and every operation on every clone returns
/// [`InstanceError::Destroyed`].
#[derive(Clone)]
pub struct ModelInstance(Arc<Shared>);

impl ModelInstance {
    /// Wraps an adapter that no registry keeps track of.
    pub fn new(id: Id, model_type: impl Into<String>, adapter: Box<dyn Simulate>) -> Self {
        Self::create(id, model_type.into(), adapter, None, Weak::new())
    }

    pub(crate) fn create(
        id: Id,
        model_type: String,
        adapter: Box<dyn Simulate>,
        parameters: Option<Json>,
        table: Weak<InstanceTable>,
    ) -> Self {
        Self(Arc::new(Shared {
            id,
            live: Mutex::new(Some(Live {
                adapter,
                name: model_type.clone(),
            })),
            model_type,
            parameters,
            table,
        }))
    }

    pub fn id(&self) -> Id {
        self.0.id
    }

    /// The registered name of the model this instance was built from.
    pub fn model_type(&self) -> Result<String, InstanceError> {
        self.with_live(|_| self.type_name().to_string())
    }

    /// The parameter document the instance was created with.
    pub fn parameters(&self) -> Result<Option<Json>, InstanceError> {
        self.with_live(|_| self.0.parameters.clone())
    }

    /// The session bound named by the parameter document.
    pub fn time_max(&self) -> Result<Option<Time>, InstanceError> {
        self.with_live(|_| InitContext::new(self.0.parameters.as_ref()).time_max())
    }

    fn type_name(&self) -> &str {
        &self.0.model_type
    }

    fn with_live<T>(&self, f: impl FnOnce(&mut Live) -> T) -> Result<T, InstanceError> {
        let mut live = self
            .0
            .live
            .lock()
            .map_err(|_| InstanceError::Poisoned(self.id()))?;
        let live = live.as_mut().ok_or(InstanceError::Destroyed(self.id()))?;
        Ok(f(live))
    }

    fn with_started<T>(&self, f: impl FnOnce(&mut dyn Simulate) -> T) -> Result<T, InstanceError> {
        self.with_live(|live| {
            if live.adapter.is_initialized() {
                Ok(f(live.adapter.as_mut()))
            } else {
                Err(InstanceError::NotInitialized(self.id()))
            }
        })?
    }

    pub fn name(&self) -> Result<String, InstanceError> {
        self.with_live(|live| live.name.clone())
    }

    pub fn set_name(&self, name: impl Into<String>) -> Result<(), InstanceError> {
        let name = name.into();
        self.with_live(|live| live.name = name)
    }

    /// Declares an extra port. Only possible before initialization.
    pub fn add_port(&self, name: impl Into<String>, index: PortIndex) -> Result<(), InstanceError> {
        self.with_live(|live| {
            if live.adapter.is_initialized() {
                return Err(InstanceError::PortTableFrozen(self.id()));
            }
            Ok(live.adapter.ports_mut().insert(name, index)?)
        })?
    }

    pub fn ports(&self) -> Result<PortTable, InstanceError> {
        self.with_live(|live| live.adapter.ports().clone())
    }

    /// Where the instance is in its lifecycle. A destroyed instance is
    /// `Terminated`.
    pub fn state(&self) -> AdapterState {
        self.with_live(|live| {
            if !live.adapter.is_initialized() {
                AdapterState::Uninitialized
            } else if live.adapter.time_advance() == INFINITY {
                AdapterState::Idle
            } else {
                AdapterState::Imminent
            }
        })
        .unwrap_or(AdapterState::Terminated)
    }

    /// Initializes the model with the instance's parameter document.
    pub fn initialize(&self) -> Result<bool, InstanceError> {
        let context = InitContext::new(self.0.parameters.as_ref());
        self.with_live(|live| live.adapter.initialize(&context))
    }

    pub fn time_advance(&self) -> Result<Time, InstanceError> {
        self.with_started(|adapter| adapter.time_advance())
    }

    pub fn internal_transition(&self) -> Result<bool, InstanceError> {
        self.with_started(|adapter| adapter.internal_transition())
    }

    pub fn external_transition(&self, elapsed: Time, events: &[Event]) -> Result<bool, InstanceError> {
        self.with_started(|adapter| adapter.external_transition(elapsed, events))
    }

    pub fn confluent_transition(&self, events: &[Event]) -> Result<bool, InstanceError> {
        self.with_started(|adapter| adapter.confluent_transition(events))
    }

    pub fn output_function(&self) -> Result<Vec<Event>, InstanceError> {
        self.with_started(|adapter| adapter.output_function())
    }

    pub fn clock(&self) -> Result<Clock, InstanceError> {
        self.with_live(|live| live.adapter.clock())
    }

    /// A JSON snapshot of the instance.
    pub fn save_json(&self) -> Result<Json, InstanceError> {
        let state = self.state();
        self.with_live(|live| {
            json!({
                "id": self.id(),
                "name": live.name,
                "modelType": self.type_name(),
                "state": state,
                "clock": live.adapter.clock(),
                "ports": live.adapter.ports().as_map(),
            })
        })
    }

    /// Drops the wrapped model. Every later call fails with
    /// [`InstanceError::Destroyed`], including a second `destroy`.
    pub fn destroy(&self) -> Result<(), InstanceError> {
        let live = self
            .0
            .live
            .lock()
            .map_err(|_| InstanceError::Poisoned(self.id()))?
            .take();
        if live.is_none() {
            return Err(InstanceError::Destroyed(self.id()));
        }
        if let Some(table) = self.0.table.upgrade() {
            table.remove(&self.id());
        }
        instance_destroyed_event(self.id(), self.type_name());
        Ok(())
    }

    pub fn is_destroyed(&self) -> bool {
        self.state() == AdapterState::Terminated
    }
}

impl fmt::Debug for ModelInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelInstance")
            .field("id", &self.id())
            .field("model_type", &self.type_name())
            .field("state", &self.state())
            .finish()
    }
}
