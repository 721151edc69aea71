use super::{Interval, Job, Sampler, Traffic};
use simhub_core::{Atomic, InitContext, ModelError, PortIndex, PortValue, Time, INFINITY};
use std::collections::VecDeque;

/// Serves jobs one at a time in arrival order.
#[derive(Debug, Clone)]
pub struct Processor {
    /// Mean service time unless the parameters say otherwise
    service_time: Time,
    /// Draws the service time of each job
    sampler: Sampler,
    /// Waiting jobs; the front one is in service
    queue: VecDeque<Job>,
    /// Service time left for the front job
    sigma: Time,
}

impl Processor {
    pub const IN: PortIndex = 0;
    pub const OUT: PortIndex = 1;

    /// The service time parameter.
    pub const SERVICE_TIME: &'static str = "processing_time";

    /// Creates an idle processor taking `service_time` per job.
    pub fn new(service_time: Time) -> Self {
        Self {
            service_time,
            sampler: Sampler::fixed(service_time),
            queue: VecDeque::new(),
            sigma: service_time,
        }
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }
}

impl Atomic for Processor {
    type Value = Traffic;

    fn initialize(&mut self, context: &InitContext) -> Result<(), ModelError> {
        let interval = Interval::from_context(context, Self::SERVICE_TIME, self.service_time, 1)?;
        self.sampler = interval.sampler()?;
        self.queue.clear();
        Ok(())
    }

    fn time_advance(&self) -> Time {
        if self.queue.is_empty() {
            INFINITY
        } else {
            self.sigma
        }
    }

    fn internal_transition(&mut self) {
        self.queue.pop_front();
        if !self.queue.is_empty() {
            self.sigma = self.sampler.sample();
        }
    }

    fn external_transition(&mut self, elapsed: Time, inputs: &[PortValue<Traffic>]) {
        if !self.queue.is_empty() {
            self.sigma -= elapsed;
        }
        for input in inputs {
            if let (Self::IN, Traffic::Job(job)) = (input.port, &input.value) {
                if self.queue.is_empty() {
                    self.sigma = self.sampler.sample();
                }
                self.queue.push_back(job.clone());
            }
        }
    }

    fn output(&self) -> Vec<PortValue<Traffic>> {
        self.queue
            .front()
            .map(|job| vec![PortValue::new(Self::OUT, Traffic::Job(job.clone()))])
            .unwrap_or_default()
    }

    fn input_ports(&self) -> Vec<PortIndex> {
        vec![Self::IN]
    }

    fn output_ports(&self) -> Vec<PortIndex> {
        vec![Self::OUT]
    }
}
