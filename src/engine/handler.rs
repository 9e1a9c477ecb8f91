//! The handling step: what an employee does with a call once assigned.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::debug;

use crate::error::Result;
use crate::model::{Call, Employee};

/// Answers a call on behalf of an employee.
///
/// Returning `Err` (or panicking) rejects the call with
/// `Reason::ProcessingError`. The dispatcher frees the employee and the
/// capacity slot either way.
#[async_trait]
pub trait CallHandler: Send + Sync + 'static {
    async fn handle(&self, employee: &Employee, call: &Call) -> Result<()>;
}

/// How long a simulated call lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlingTime {
    Fixed(Duration),
    /// Uniform over `[min, max]`.
    Uniform { min: Duration, max: Duration },
}

impl HandlingTime {
    pub fn sample(&self) -> Duration {
        match *self {
            HandlingTime::Fixed(d) => d,
            HandlingTime::Uniform { min, max } if max <= min => min,
            HandlingTime::Uniform { min, max } => rand::thread_rng().gen_range(min..=max),
        }
    }
}

impl Default for HandlingTime {
    fn default() -> Self {
        HandlingTime::Uniform {
            min: Duration::from_secs(5),
            max: Duration::from_secs(10),
        }
    }
}

/// Stands in for a real conversation: sleeps for a sampled duration.
#[derive(Debug, Clone, Default)]
pub struct SimulatedHandler {
    time: HandlingTime,
}

impl SimulatedHandler {
    pub fn new(time: HandlingTime) -> Self {
        Self { time }
    }

    pub fn fixed(duration: Duration) -> Self {
        Self::new(HandlingTime::Fixed(duration))
    }
}

#[async_trait]
impl CallHandler for SimulatedHandler {
    async fn handle(&self, employee: &Employee, call: &Call) -> Result<()> {
        let duration = self.time.sample();
        debug!(
            call_id = %call.id,
            employee_id = %employee.id,
            tier = %employee.tier,
            duration_ms = duration.as_millis() as u64,
            "answering call"
        );
        tokio::time::sleep(duration).await;
        Ok(())
    }
}
