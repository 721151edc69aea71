use super::{Interval, Job, Sampler, Traffic};
use simhub_core::{Atomic, InitContext, ModelError, PortIndex, PortValue, Time, INFINITY};

/// Emits numbered jobs, one every interval, until it is stopped.
#[derive(Debug, Clone)]
pub struct Generator {
    /// Mean time between two jobs unless the parameters say otherwise
    period: Time,
    /// Draws the time between two jobs
    sampler: Sampler,
    /// Time left until the next job
    sigma: Time,
    /// Time of the last transition
    clock: Time,
    /// Id of the next job
    next_id: u64,
    active: bool,
}

impl Generator {
    pub const START: PortIndex = 0;
    pub const STOP: PortIndex = 1;
    pub const OUT: PortIndex = 2;

    /// The interval parameter.
    pub const PERIOD: &'static str = "genr_period";

    /// Creates an active generator emitting a job every `period`.
    pub fn new(period: Time) -> Self {
        Self {
            period,
            sampler: Sampler::fixed(period),
            sigma: period,
            clock: 0.0,
            next_id: 1,
            active: true,
        }
    }
}

impl Atomic for Generator {
    type Value = Traffic;

    fn initialize(&mut self, context: &InitContext) -> Result<(), ModelError> {
        let interval = Interval::from_context(context, Self::PERIOD, self.period, 0)?;
        self.sampler = interval.sampler()?;
        self.sigma = self.sampler.sample();
        self.clock = 0.0;
        self.next_id = 1;
        self.active = true;
        Ok(())
    }

    fn time_advance(&self) -> Time {
        if self.active {
            self.sigma
        } else {
            INFINITY
        }
    }

    fn internal_transition(&mut self) {
        self.clock += self.sigma;
        self.next_id += 1;
        self.sigma = self.sampler.sample();
    }

    fn external_transition(&mut self, elapsed: Time, inputs: &[PortValue<Traffic>]) {
        self.clock += elapsed;
        if self.active {
            self.sigma -= elapsed;
        }
        for input in inputs {
            match input.port {
                Self::START if !self.active => {
                    self.active = true;
                    self.sigma = self.sampler.sample();
                }
                Self::STOP => self.active = false,
                _ => {}
            }
        }
    }

    fn output(&self) -> Vec<PortValue<Traffic>> {
        if !self.active {
            return vec![];
        }
        let job = Job {
            id: self.next_id,
            created: self.clock + self.sigma,
        };
        vec![PortValue::new(Self::OUT, Traffic::Job(job))]
    }

    fn input_ports(&self) -> Vec<PortIndex> {
        vec![Self::START, Self::STOP]
    }

    fn output_ports(&self) -> Vec<PortIndex> {
        vec![Self::OUT]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value as Json;

    fn job(output: &[PortValue<Traffic>]) -> Option<Job> {
        match output {
            [PortValue {
                port: Generator::OUT,
                value: Traffic::Job(job),
            }] => Some(job.clone()),
            _ => None,
        }
    }

    #[test]
    fn emits_numbered_jobs() {
        let mut generator = Generator::new(2.0);
        assert_eq!(generator.time_advance(), 2.0);
        assert_eq!(job(&generator.output()), Some(Job { id: 1, created: 2.0 }));

        generator.internal_transition();
        assert_eq!(job(&generator.output()), Some(Job { id: 2, created: 4.0 }));
    }

    #[test]
    fn stops_and_restarts() {
        let mut generator = Generator::new(2.0);
        generator.external_transition(0.5, &[PortValue::new(Generator::STOP, Traffic::Control(Json::Null))]);
        assert_eq!(generator.time_advance(), INFINITY);
        assert!(generator.output().is_empty());

        generator.external_transition(3.0, &[PortValue::new(Generator::START, Traffic::Control(Json::Null))]);
        assert_eq!(generator.time_advance(), 2.0);
        assert_eq!(job(&generator.output()), Some(Job { id: 1, created: 5.5 }));
    }

    #[test]
    fn initialize_reads_period() -> anyhow::Result<()> {
        let parameters = serde_json::json!({"genr_period": 3.0});
        let mut generator = Generator::new(1.0);
        generator.initialize(&InitContext::new(Some(&parameters)))?;
        assert_eq!(generator.time_advance(), 3.0);
        Ok(())
    }
}
