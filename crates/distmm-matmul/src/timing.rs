//! Compute-phase timing.

use comm::Communicator;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ROOT;

/// Compute time of one multiply as seen from one rank.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    /// Seconds this rank spent in its local compute phase.
    pub local: f64,
    /// Slowest rank's compute time; only known on the coordinator.
    pub max: Option<f64>,
}

/// Reduce every rank's `local` seconds to their maximum on the coordinator.
pub fn reduce_max_time<C: Communicator>(world: &C, local: f64) -> Result<Option<f64>> {
    Ok(world.reduce_max(local, ROOT)?)
}

/// Run `f` between two wall-clock readings and return its value with the
/// elapsed seconds.
pub fn timed<C: Communicator, T>(world: &C, f: impl FnOnce() -> Result<T>) -> Result<(T, f64)> {
    let start = world.wall_time();
    let value = f()?;
    Ok((value, world.wall_time() - start))
}

/// Reduce `local` and package it as a [`Timing`].
pub fn finish<C: Communicator>(world: &C, local: f64) -> Result<Timing> {
    let max = reduce_max_time(world, local)?;
    if let Some(max) = max {
        tracing::debug!(max, "compute time reduced");
    }
    Ok(Timing { local, max })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use comm::LocalUniverse;

    use super::*;

    #[test]
    fn test_reduce_max_time_on_root_only() {
        let locals = [0.1, 0.5, 0.3];
        let maxima = LocalUniverse::new(3)
            .recv_timeout(Duration::from_secs(10))
            .run(|world| reduce_max_time(&world, locals[world.rank()]))
            .unwrap();
        assert_eq!(maxima, vec![Some(0.5), None, None]);
    }

    #[test]
    fn test_timed_measures_nonnegative_span() {
        let spans = LocalUniverse::new(1)
            .run(|world| timed(&world, || Ok(7)))
            .unwrap();
        let (value, elapsed) = spans[0];
        assert_eq!(value, 7);
        assert!(elapsed >= 0.0);
    }
}
