//! Logging holds wrapper functions for structured lifecycle events.
//! Each function corresponds to one kind of event (model registration,
//! instance creation, dropped messages, ...) and is called from inside the
//! core. Installing a subscriber is left to the binary.

use crate::Id;
use tracing::{event, Level};

/// Model registration event.
/// Captures the model name and whether an earlier entry was replaced.
pub(crate) fn model_registered_event(name: &str, replaced: bool) {
    event!(target: "REGISTRY", Level::INFO, model = name, replaced = replaced);
}

/// Instance creation event.
/// Captures the instance id and the registered model it was built from.
pub(crate) fn instance_created_event(id: Id, model: &str) {
    event!(target: "INSTANCE", Level::INFO, id = id.into_inner(), model = model, action = "created");
}

/// Instance destruction event.
pub(crate) fn instance_destroyed_event(id: Id, model: &str) {
    event!(target: "INSTANCE", Level::INFO, id = id.into_inner(), model = model, action = "destroyed");
}

/// Simulator creation event.
/// Captures the simulator id and the id of the instance it drives.
pub(crate) fn simulator_created_event(id: Id, model: Id) {
    event!(target: "SIMULATOR", Level::INFO, id = id.into_inner(), model = model.into_inner(), action = "created");
}

/// Simulator destruction event.
pub(crate) fn simulator_destroyed_event(id: Id) {
    event!(target: "SIMULATOR", Level::INFO, id = id.into_inner(), action = "destroyed");
}

/// Dropped message event.
/// Used for events whose payload could not be decoded or encoded.
pub(crate) fn event_dropped(port: &str, reason: &str) {
    event!(target: "MESSAGE", Level::WARN, port = port, reason = reason);
}
