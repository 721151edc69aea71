//! Drives simulators to completion the way a remote client does.
//!
//! The simulator only answers questions and runs single events; the loop in
//! [`run_session`] is the scheduler. [`run_sessions`] runs several such
//! loops at once, one blocking task per instance.

use serde::Serialize;
use simhub_core::{
    Event, ExitStatus, InstanceError, ModelInstance, Registry, RegistryError, Simulator, Time,
    INFINITY,
};
use std::{sync::Arc, time::Duration};
use tokio::task::JoinSet;

/// The session bound used when neither the request nor the parameter
/// document names one.
pub const DEFAULT_TIME_MAX: Time = 100.0;

/// What happened during one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    /// The registered name of the model.
    pub model: String,
    /// Every output due within the bound, stamped with the model time of the
    /// internal event it belongs to.
    pub outputs: Vec<(Time, Event)>,
    /// Internal events executed.
    pub steps: u64,
    /// Model time when the session ended.
    pub end_time: Time,
    /// Whether the model ran out of events before the bound.
    pub halted: bool,
}

impl SessionReport {
    /// The payloads of every output on `port`, in order.
    pub fn values_on<'a>(&'a self, port: &'a str) -> impl Iterator<Item = (Time, &'a Event)> + 'a {
        self.outputs
            .iter()
            .filter(move |(_, event)| event.port == port)
            .map(|(time, event)| (*time, event))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{0}")]
    Registry(#[from] RegistryError),
    #[error("{0}")]
    Instance(#[from] InstanceError),
    #[error("Session task ended without reporting")]
    Lost,
    #[error("Sessions did not finish within {0:?}")]
    TimedOut(Duration),
}

/// Starts the simulator's model and runs internal events until the model
/// halts or the next event would pass `time_max`. Destroys both the
/// simulator and its model afterwards, whatever happened.
pub fn run_session(simulator: &Simulator, time_max: Time) -> Result<SessionReport, SessionError> {
    let model = simulator.get_model()?;
    let result = drive(simulator, &model, time_max);
    let destroyed = simulator.destroy().and(model.destroy());
    let report = result?;
    destroyed?;
    Ok(report)
}

fn drive(simulator: &Simulator, model: &ModelInstance, time_max: Time) -> Result<SessionReport, InstanceError> {
    let mut report = SessionReport {
        model: model.model_type()?,
        outputs: vec![],
        steps: 0,
        end_time: 0.0,
        halted: false,
    };
    // Output is what the model emits at its next internal event
    let record = |report: &mut SessionReport| -> Result<(), InstanceError> {
        let due = model.clock()?.time + simulator.next_event_time()?;
        if due == INFINITY || due > time_max {
            return Ok(());
        }
        for event in simulator.compute_next_output()? {
            report.outputs.push((due, event));
        }
        Ok(())
    };

    simulator.start()?;
    record(&mut report)?;
    while !simulator.halt()? {
        let next = simulator.next_event_time()?;
        if model.clock()?.time + next > time_max {
            break;
        }
        simulator.exec_next_event()?;
        report.steps += 1;
        record(&mut report)?;
    }
    report.end_time = model.clock()?.time;
    report.halted = simulator.halt()?;
    tracing::info!(
        "Session for <{}> ended at {} after {} steps",
        report.model,
        report.end_time,
        report.steps
    );
    Ok(report)
}

/// Where the model of a session comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// A registered model name, created with its default parameters.
    Model(String),
    /// A parameter document naming the model.
    Parameters(String),
    /// A JSON description of a coupled network.
    Network(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionRequest {
    pub source: Source,
    /// Overrides the parameter document's `timeMax`.
    pub time_max: Option<Time>,
}

impl SessionRequest {
    pub fn model(name: impl Into<String>) -> Self {
        Self {
            source: Source::Model(name.into()),
            time_max: None,
        }
    }

    pub fn parameters(document: impl Into<String>) -> Self {
        Self {
            source: Source::Parameters(document.into()),
            time_max: None,
        }
    }

    pub fn network(document: impl Into<String>) -> Self {
        Self {
            source: Source::Network(document.into()),
            time_max: None,
        }
    }

    pub fn time_max(mut self, time_max: Time) -> Self {
        self.time_max = Some(time_max);
        self
    }
}

fn open(registry: &Registry, request: SessionRequest) -> Result<SessionReport, SessionError> {
    let model = match &request.source {
        Source::Model(name) => registry.create(name)?,
        Source::Parameters(document) => registry.create_from_parameters(document)?,
        Source::Network(document) => registry.create_from_json(document)?,
    };
    let time_max = match request.time_max {
        Some(time_max) => time_max,
        None => model.time_max()?.unwrap_or(DEFAULT_TIME_MAX),
    };
    let simulator = match registry.create_sim(&model) {
        Ok(simulator) => simulator,
        Err(e) => {
            // The instance would otherwise outlive its session
            let _ = model.destroy();
            return Err(e.into());
        }
    };
    run_session(&simulator, time_max)
}

/// Runs every request concurrently. Results come back in request order.
pub async fn run_sessions(
    registry: Arc<Registry>,
    requests: Vec<SessionRequest>,
) -> Vec<Result<SessionReport, SessionError>> {
    let mut tasks = JoinSet::new();
    let count = requests.len();
    for (index, request) in requests.into_iter().enumerate() {
        let registry = registry.clone();
        tasks.spawn_blocking(move || (index, open(&registry, request)));
    }

    let mut results: Vec<Option<Result<SessionReport, SessionError>>> = (0..count).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => results[index] = Some(result),
            Err(e) => tracing::error!("A session task failed: {}", e),
        }
    }
    results
        .into_iter()
        .map(|result| result.unwrap_or(Err(SessionError::Lost)))
        .collect()
}

/// Runs every request concurrently, giving up after `duration`.
/// If the sessions do not finish in time, the registry is shut down with
/// [`ExitStatus::TimedOut`], which destroys every instance still running.
pub async fn run_sessions_with_timeout(
    registry: Arc<Registry>,
    requests: Vec<SessionRequest>,
    duration: Duration,
) -> Result<Vec<Result<SessionReport, SessionError>>, SessionError> {
    match tokio::time::timeout(duration, run_sessions(registry.clone(), requests)).await {
        Ok(results) => Ok(results),
        Err(_) => {
            registry.shutdown_with_status(ExitStatus::TimedOut);
            Err(SessionError::TimedOut(duration))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models;
    use simhub_core::{Atomic, ModelMetadata, PortIndex, PortValue};
    use tracing_test::traced_test;

    fn registry() -> Arc<Registry> {
        let registry = Registry::new();
        models::register_all(&registry);
        Arc::new(registry)
    }

    #[test]
    #[traced_test]
    fn session_stops_at_bound_and_cleans_up() -> anyhow::Result<()> {
        let registry = registry();
        let model = registry.create(models::gpt::NAME)?;
        let simulator = registry.create_sim(&model)?;
        let report = run_session(&simulator, 3.0)?;

        assert!(!report.halted);
        assert!(report.end_time <= 3.0);
        assert!(report.values_on("report").count() > 0);
        assert!(model.is_destroyed());
        assert!(simulator.is_destroyed());
        assert!(registry.live_instances().is_empty());
        assert!(logs_contain("Session for <gpt> ended"));
        Ok(())
    }

    /// Counts up every two time units, reporting the count it is about to
    /// reach.
    #[derive(Default)]
    struct Ticker(u32);

    impl Atomic for Ticker {
        type Value = u32;

        fn time_advance(&self) -> Time {
            2.0
        }

        fn internal_transition(&mut self) {
            self.0 += 1;
        }

        fn external_transition(&mut self, _elapsed: Time, _inputs: &[PortValue<u32>]) {}

        fn output(&self) -> Vec<PortValue<u32>> {
            vec![PortValue::new(0, self.0 + 1)]
        }

        fn input_ports(&self) -> Vec<PortIndex> {
            vec![]
        }

        fn output_ports(&self) -> Vec<PortIndex> {
            vec![0]
        }
    }

    #[test]
    fn outputs_are_stamped_when_due() -> anyhow::Result<()> {
        let registry = Registry::new();
        registry.add_model(
            "ticker",
            ModelMetadata::new("Ticker", "Counts every two time units").with_port("tick", 0),
            |_| Ok(Ticker::default()),
        );
        let model = registry.create("ticker")?;
        let simulator = registry.create_sim(&model)?;
        let report = run_session(&simulator, 5.0)?;

        assert_eq!(
            report.outputs,
            vec![(2.0, Event::new("tick", "1")), (4.0, Event::new("tick", "2"))]
        );
        assert_eq!(report.steps, 2);
        assert_eq!(report.end_time, 4.0);
        Ok(())
    }

    #[test]
    fn idle_model_halts_immediately() -> anyhow::Result<()> {
        let registry = registry();
        let model = registry.create(models::echo::NAME)?;
        let simulator = registry.create_sim(&model)?;
        let report = run_session(&simulator, 10.0)?;
        assert!(report.halted);
        assert_eq!(report.steps, 0);
        assert!(report.outputs.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn results_keep_request_order() {
        let registry = registry();
        let results = run_sessions(
            registry.clone(),
            vec![
                SessionRequest::model(models::gpt::NAME).time_max(2.0),
                SessionRequest::model("missing"),
                SessionRequest::parameters(r#"{"modelName": "gpt", "timeMax": 1.0}"#),
            ],
        )
        .await;

        assert_eq!(results.len(), 3);
        assert!(matches!(&results[0], Ok(report) if report.end_time <= 2.0));
        assert!(matches!(&results[1], Err(SessionError::Registry(RegistryError::NotFound(_)))));
        assert!(matches!(&results[2], Ok(report) if report.end_time == 1.0));
        assert!(registry.live_instances().is_empty());
    }

    #[tokio::test]
    async fn timeout_shuts_registry_down() {
        let registry = registry();
        let requests = vec![SessionRequest::model(models::gpt::NAME).time_max(1e12)];
        let result = run_sessions_with_timeout(registry.clone(), requests, Duration::from_millis(10)).await;
        assert!(matches!(result, Err(SessionError::TimedOut(_))));
        assert_eq!(registry.wait_for_shutdown().await, ExitStatus::TimedOut);
        assert!(matches!(registry.create(models::gpt::NAME), Err(RegistryError::ShutDown)));
    }
}
