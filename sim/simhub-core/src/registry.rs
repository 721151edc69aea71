//! The table of models a process can create, and the instances it has
//! created.

use crate::{
    adapter::{ModelAdapter, Simulate},
    atomic::{Atomic, ModelError},
    digraph::{ComponentCatalog, DigraphError, ModelDocument},
    instance::{InstanceError, InstanceTable, ModelInstance},
    logging::{instance_created_event, model_registered_event, simulator_created_event},
    metadata::{ModelMetadata, ModelParameters},
    port::{PortError, PortTable},
    shutdown::{ExitStatus, Shutdown},
    simulator::{Simulator, SimulatorTable},
    Id,
};
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as Json;
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, RwLock,
    },
};

/// Builds a wrapped model from its registered metadata and port table.
pub type Constructor =
    Arc<dyn Fn(&ModelMetadata, PortTable) -> Result<Box<dyn Simulate>, ModelError> + Send + Sync>;

/// Builds a wrapped network from a document and its port table.
type NetworkConstructor =
    Arc<dyn Fn(&ModelDocument, PortTable) -> Result<Box<dyn Simulate>, DigraphError> + Send + Sync>;

/// How to build one registered model.
#[derive(Clone)]
pub struct ModelDescriptor {
    pub metadata: Arc<ModelMetadata>,
    pub build: Constructor,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("No model is registered as <{0}>")]
    NotFound(String),
    #[error("No live instance or simulator has id {0}")]
    UnknownInstance(Id),
    #[error("Malformed parameter document: {0}")]
    MalformedParameters(#[source] serde_json::Error),
    #[error("Parameter document does not name a model (missing <modelName>)")]
    MissingModelName,
    #[error("Model <{0}> does not have a valid port table: {1}")]
    PortTable(String, #[source] PortError),
    #[error("Could not construct model <{0}>: {1}")]
    Construction(String, #[source] ModelError),
    #[error("Could not build network from catalog <{0}>: {1}")]
    Network(String, #[source] DigraphError),
    #[error("{0}")]
    Instance(#[from] InstanceError),
    #[error("The registry has been shut down")]
    ShutDown,
    #[error("The model table was poisoned by a panic")]
    Poisoned,
}

impl RegistryError {
    /// Whether the model was rejected for breaking a structural rule.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::PortTable(..)
                | Self::Construction(_, ModelError::Coupling(_))
                | Self::Network(_, DigraphError::Coupling(_))
        )
    }
}

/// Named model constructors plus every live instance and simulator.
///
/// Registration normally happens once at startup, after which the table is
/// only read. Instances and simulators are tracked until destroyed, so a
/// [`shutdown`](Registry::shutdown) can release everything still alive.
pub struct Registry {
    models: RwLock<BTreeMap<String, ModelDescriptor>>,
    catalogs: RwLock<BTreeMap<String, NetworkConstructor>>,
    instances: Arc<InstanceTable>,
    simulators: Arc<SimulatorTable>,
    next_id: AtomicU64,
    closed: AtomicBool,
    shutdown: Shutdown,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            models: Default::default(),
            catalogs: Default::default(),
            instances: Arc::new(DashMap::new()),
            simulators: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            shutdown: Shutdown::new(),
        }
    }

    /// Registers `name`, replacing any model already registered under it.
    ///
    /// `constructor` gets the metadata so coupled models can take their
    /// producer and consumer from it.
    pub fn add_model<M, F>(&self, name: impl Into<String>, metadata: ModelMetadata, constructor: F)
    where
        M: Atomic,
        M::Value: Serialize + DeserializeOwned,
        F: Fn(&ModelMetadata) -> Result<M, ModelError> + Send + Sync + 'static,
    {
        let build: Constructor = Arc::new(
            move |metadata: &ModelMetadata, ports: PortTable| -> Result<Box<dyn Simulate>, ModelError> {
                let model = constructor(metadata)?;
                Ok(Box::new(ModelAdapter::new(model, ports)))
            },
        );
        self.add_descriptor(
            name,
            ModelDescriptor {
                metadata: Arc::new(metadata),
                build,
            },
        );
    }

    /// Registers an already assembled descriptor under `name`.
    pub fn add_descriptor(&self, name: impl Into<String>, descriptor: ModelDescriptor) {
        let name = name.into();
        let replaced = match self.models.write() {
            Ok(mut models) => models.insert(name.clone(), descriptor).is_some(),
            Err(e) => {
                tracing::error!("Failed to register model <{}>: {}", name, e);
                return;
            }
        };
        if replaced {
            tracing::info!("Replacing registered model <{}>", name);
        }
        model_registered_event(&name, replaced);
    }

    fn descriptor(&self, name: &str) -> Result<ModelDescriptor, RegistryError> {
        let models = self.models.read().map_err(|e| {
            tracing::error!("Failed to look up model <{}>: {}", name, e);
            RegistryError::Poisoned
        })?;
        models
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    fn next_id(&self) -> Id {
        Id::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn ensure_open(&self) -> Result<(), RegistryError> {
        if self.closed.load(Ordering::Acquire) {
            Err(RegistryError::ShutDown)
        } else {
            Ok(())
        }
    }

    /// Creates an instance of `name` with its default parameters.
    pub fn create(&self, name: &str) -> Result<ModelInstance, RegistryError> {
        let descriptor = self.descriptor(name)?;
        let parameters = Json::Object(descriptor.metadata.properties.clone());
        self.instantiate(name, descriptor, parameters)
    }

    /// Creates the model named by the document's `modelName`. Keys of the
    /// document override the model's default parameters.
    pub fn create_from_parameters(&self, document: &str) -> Result<ModelInstance, RegistryError> {
        let document: Json = serde_json::from_str(document).map_err(RegistryError::MalformedParameters)?;
        if document.get("modelName").is_none() {
            tracing::error!("Rejecting parameter document without <modelName>");
            return Err(RegistryError::MissingModelName);
        }
        let parameters: ModelParameters =
            serde_json::from_value(document).map_err(RegistryError::MalformedParameters)?;
        let descriptor = self.descriptor(&parameters.model_name)?;
        let document = parameters.merged_with(&descriptor.metadata.properties);
        self.instantiate(&parameters.model_name, descriptor, document)
    }

    fn instantiate(
        &self,
        name: &str,
        descriptor: ModelDescriptor,
        parameters: Json,
    ) -> Result<ModelInstance, RegistryError> {
        self.ensure_open()?;
        let ports = descriptor.metadata.port_table().map_err(|e| {
            tracing::error!("Model <{}> has an invalid port table: {}", name, e);
            RegistryError::PortTable(name.to_string(), e)
        })?;
        let adapter = (descriptor.build)(&descriptor.metadata, ports).map_err(|e| {
            tracing::error!("Could not construct model <{}>: {}", name, e);
            RegistryError::Construction(name.to_string(), e)
        })?;

        self.track(name, adapter, parameters)
    }

    /// Gives a built model an id and keeps track of it until destroyed.
    fn track(&self, name: &str, adapter: Box<dyn Simulate>, parameters: Json) -> Result<ModelInstance, RegistryError> {
        let id = self.next_id();
        let instance = ModelInstance::create(
            id,
            name.to_string(),
            adapter,
            Some(parameters),
            Arc::downgrade(&self.instances),
        );
        self.instances.insert(id, instance.clone());
        if self.is_shut_down() {
            // Lost a race with `shutdown`
            let _ = instance.destroy();
            return Err(RegistryError::ShutDown);
        }
        instance_created_event(id, name);
        Ok(instance)
    }

    /// Registers the components networks named `name` are built from,
    /// replacing any catalog already registered under it.
    pub fn add_catalog<V>(&self, name: impl Into<String>, catalog: ComponentCatalog<V>)
    where
        V: Clone + Send + Serialize + DeserializeOwned + 'static,
    {
        let name = name.into();
        let catalog = Arc::new(catalog);
        let build: NetworkConstructor = Arc::new(
            move |document: &ModelDocument, ports: PortTable| -> Result<Box<dyn Simulate>, DigraphError> {
                let network = catalog.build(document)?;
                Ok(Box::new(ModelAdapter::new(network, ports)))
            },
        );
        match self.catalogs.write() {
            Ok(mut catalogs) => {
                if catalogs.insert(name.clone(), build).is_some() {
                    tracing::info!("Replacing component catalog <{}>", name);
                }
            }
            Err(e) => tracing::error!("Failed to register component catalog <{}>: {}", name, e),
        }
    }

    /// Registered catalog names, sorted.
    pub fn get_catalog_list(&self) -> Vec<String> {
        match self.catalogs.read() {
            Ok(catalogs) => catalogs.keys().cloned().collect(),
            Err(e) => {
                tracing::error!("Failed to list component catalogs: {}", e);
                vec![]
            }
        }
    }

    /// Builds a coupled network from a JSON description. The document's
    /// `modelTypeName` names the catalog its components come from.
    pub fn create_from_json(&self, document: &str) -> Result<ModelInstance, RegistryError> {
        let document: ModelDocument = serde_json::from_str(document).map_err(|e| {
            tracing::error!("Rejecting network document: {}", e);
            RegistryError::MalformedParameters(e)
        })?;
        let name = document.model_type_name.as_str();
        let build = self
            .catalogs
            .read()
            .map_err(|e| {
                tracing::error!("Failed to look up component catalog <{}>: {}", name, e);
                RegistryError::Poisoned
            })?
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        let ports = document.port_table().map_err(|e| {
            tracing::error!("Network <{}> has an invalid port table: {}", name, e);
            RegistryError::PortTable(name.to_string(), e)
        })?;
        self.ensure_open()?;
        let adapter = build(&document, ports).map_err(|e| {
            tracing::error!("Could not build network <{}>: {}", name, e);
            RegistryError::Network(name.to_string(), e)
        })?;
        self.track(name, adapter, document.parameters())
    }

    /// Registered model names, sorted.
    pub fn get_model_list(&self) -> Vec<String> {
        match self.models.read() {
            Ok(models) => models.keys().cloned().collect(),
            Err(e) => {
                tracing::error!("Failed to list models: {}", e);
                vec![]
            }
        }
    }

    pub fn get_model_info(&self, name: &str) -> Option<ModelMetadata> {
        self.descriptor(name)
            .ok()
            .map(|descriptor| descriptor.metadata.as_ref().clone())
    }

    /// The model's metadata as a parameter document, or `{}` for an unknown
    /// model.
    pub fn get_model_info_json(&self, name: &str) -> String {
        self.get_model_info(name)
            .map(|metadata| metadata.parameter_template(name))
            .unwrap_or_else(|| Json::Object(Default::default()))
            .to_string()
    }

    /// Binds a new simulator to `model`.
    pub fn create_sim(&self, model: &ModelInstance) -> Result<Simulator, RegistryError> {
        self.ensure_open()?;
        if model.is_destroyed() {
            return Err(InstanceError::Destroyed(model.id()).into());
        }
        let id = self.next_id();
        let simulator = Simulator::create(id, model.clone(), Arc::downgrade(&self.simulators));
        self.simulators.insert(id, simulator.clone());
        if self.is_shut_down() {
            let _ = simulator.destroy();
            return Err(RegistryError::ShutDown);
        }
        simulator_created_event(id, model.id());
        Ok(simulator)
    }

    /// Looks up a live instance.
    pub fn model(&self, id: Id) -> Result<ModelInstance, RegistryError> {
        self.instances
            .get(&id)
            .map(|instance| instance.value().clone())
            .ok_or(RegistryError::UnknownInstance(id))
    }

    /// Looks up a live simulator.
    pub fn simulator(&self, id: Id) -> Result<Simulator, RegistryError> {
        self.simulators
            .get(&id)
            .map(|simulator| simulator.value().clone())
            .ok_or(RegistryError::UnknownInstance(id))
    }

    /// Ids of every instance not yet destroyed.
    pub fn live_instances(&self) -> Vec<Id> {
        let mut ids: Vec<_> = self.instances.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Destroys every live simulator and instance and refuses to create more.
    pub fn shutdown(&self) {
        self.shutdown_with_status(ExitStatus::Exited)
    }

    pub fn shutdown_with_status(&self, status: ExitStatus) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Handles are collected first; destroying removes them from the map
        let simulators: Vec<_> = self.simulators.iter().map(|entry| entry.value().clone()).collect();
        for simulator in simulators {
            if let Err(e) = simulator.destroy() {
                tracing::debug!("Simulator already gone at shutdown: {}", e);
            }
        }
        let instances: Vec<_> = self.instances.iter().map(|entry| entry.value().clone()).collect();
        for instance in instances {
            if let Err(e) = instance.destroy() {
                tracing::debug!("Instance already gone at shutdown: {}", e);
            }
        }
        tracing::info!("Registry shut down");
        self.shutdown.shut_down_with_status(status);
    }

    /// A [`Shutdown`] that fires when the registry shuts down.
    pub fn get_shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Waits for the registry to shut down.
    pub async fn wait_for_shutdown(&self) -> ExitStatus {
        self.shutdown.wait_for_shutdown().await
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
