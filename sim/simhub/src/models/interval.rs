use rand::{rngs::SmallRng, Rng, SeedableRng};
use rand_distr::Exp;
use simhub_core::{InitContext, ModelError, Time};

/// How long to wait between two events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Interval {
    /// Always the same time.
    Fixed(Time),
    /// Exponentially distributed around `mean`, reproducible from `seed`.
    Exponential { mean: Time, seed: u64 },
}

impl Interval {
    /// Reads the interval's mean from parameter `key`, falling back to
    /// `default`. If the parameters carry a `seed`, the interval is
    /// exponential and seeded with `seed + stream`, so components sharing a
    /// document draw from different streams.
    pub fn from_context(
        context: &InitContext,
        key: &str,
        default: Time,
        stream: u64,
    ) -> Result<Self, ModelError> {
        let mean = match context.parameter(key) {
            None => default,
            Some(value) => value.as_f64().ok_or_else(|| ModelError::Parameter {
                key: key.to_string(),
                reason: format!("expected a number, found {}", value),
            })?,
        };
        if !(mean.is_finite() && mean > 0.0) {
            return Err(ModelError::Parameter {
                key: key.to_string(),
                reason: format!("must be positive and finite, found {}", mean),
            });
        }
        Ok(match context.parameter("seed").and_then(|seed| seed.as_u64()) {
            Some(seed) => Self::Exponential {
                mean,
                seed: seed.wrapping_add(stream),
            },
            None => Self::Fixed(mean),
        })
    }

    pub fn sampler(self) -> Result<Sampler, ModelError> {
        let source = match self {
            Self::Fixed(time) => Source::Fixed(time),
            Self::Exponential { mean, seed } => {
                let exp = Exp::new(1.0 / mean).map_err(|e| ModelError::Other(e.to_string()))?;
                Source::Exponential(SmallRng::seed_from_u64(seed), exp)
            }
        };
        Ok(Sampler { source })
    }
}

/// Draws successive waiting times from an [`Interval`].
#[derive(Debug, Clone)]
pub struct Sampler {
    source: Source,
}

#[derive(Debug, Clone)]
enum Source {
    Fixed(Time),
    Exponential(SmallRng, Exp<f64>),
}

impl Sampler {
    pub fn fixed(time: Time) -> Self {
        Self {
            source: Source::Fixed(time),
        }
    }

    pub fn sample(&mut self) -> Time {
        match &mut self.source {
            Source::Fixed(time) => *time,
            Source::Exponential(rng, exp) => rng.sample(*exp),
        }
    }
}
