//! The core of SimHub, a library for hosting discrete-event simulation
//! models behind a remote-control surface.
//!
//! # Uses
//!
//! - A model server can register its models once at startup and let remote
//!   clients list them, create instances, and drive each instance through the
//!   abstract-simulator protocol.
//! - A client or test harness can drive the same models in-process through
//!   exactly the same operations.
//!
//! # Organization
//! - [`Atomic`] is the contract every simulation component implements, and
//!   [`CoupledModel`] wires components into networks that are themselves
//!   [`Atomic`]
//! - [`PortTable`] and the [`codec`] translate between wire [`Event`]s and
//!   native port values
//! - [`ModelAdapter`](adapter::ModelAdapter) exposes a component through the
//!   protocol, and [`ModelInstance`] and [`Simulator`] are the addressable
//!   handles clients hold
//! - [`ComponentCatalog`] builds coupled networks from JSON
//!   [`ModelDocument`]s
//! - [`Registry`] owns the named model constructors and every live handle
//!
//! # Protocol
//!
//! A client creates an instance, binds a simulator to it, and calls
//! [`start`](Simulator::start). From then on the client is the scheduler: it
//! polls [`next_event_time`](Simulator::next_event_time), runs internal
//! events with [`exec_next_event`](Simulator::exec_next_event), injects
//! external events, and reads outputs, until [`halt`](Simulator::halt)
//! reports that nothing is left to do. Every handle fails cleanly once it has
//! been destroyed.

mod logging;

pub mod adapter;
pub use adapter::{AdapterState, Clock, Simulate};

pub mod atomic;
pub use atomic::{Atomic, InitContext, ModelError, PortIndex, PortValue, Time, INFINITY};

pub mod codec;
pub use codec::Event;

pub mod coupled;
pub use coupled::{CoupledBuilder, CoupledModel};

pub mod digraph;
pub use digraph::{ComponentCatalog, ModelDocument};

pub mod instance;
pub use instance::{InstanceError, ModelInstance};

pub mod metadata;
pub use metadata::{ModelMetadata, ModelParameters};

pub mod port;
pub use port::PortTable;

pub mod registry;
pub use registry::{Registry, RegistryError};

pub mod simulator;
pub use simulator::Simulator;

pub mod shutdown;
pub use shutdown::{ExitStatus, Shutdown};

mod id;
pub use id::Id;
