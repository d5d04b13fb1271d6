//! In-process transport: every rank is a scoped OS thread.
//!
//! Ranks never share matrix memory. Each message moves an owned buffer into
//! the destination's mailbox, which is what a process-per-rank transport would
//! do over the wire.

mod comm;
mod fabric;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel;

pub use comm::LocalComm;
use fabric::Fabric;

use crate::CommError;

enum RankOutcome<T, E> {
    Done(T),
    Failed(E),
    Panicked,
}

/// A process group of `size` threads.
///
/// ```
/// use comm::{Communicator, LocalUniverse};
///
/// let ranks = LocalUniverse::new(3)
///     .run(|world| Ok::<_, comm::CommError>(world.rank()))
///     .unwrap();
/// assert_eq!(ranks, vec![0, 1, 2]);
/// ```
pub struct LocalUniverse {
    size: usize,
    recv_timeout: Option<Duration>,
    live_subgroups: Arc<AtomicUsize>,
}

impl LocalUniverse {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            recv_timeout: None,
            live_subgroups: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail a receive with [`CommError::Timeout`] instead of blocking forever.
    pub fn recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = Some(timeout);
        self
    }

    /// Sub-groups split during previous runs that have not been released.
    pub fn live_subgroups(&self) -> usize {
        self.live_subgroups.load(Ordering::SeqCst)
    }

    /// Run `f` once per rank, each call receiving that rank's world handle,
    /// and return the results in rank order.
    ///
    /// The first rank to fail aborts the group: ranks blocked in
    /// communication observe [`CommError::Aborted`], and the originating
    /// error is returned.
    pub fn run<T, E, F>(&self, f: F) -> Result<Vec<T>, E>
    where
        F: Fn(LocalComm) -> Result<T, E> + Sync,
        T: Send,
        E: Send + From<CommError>,
    {
        let (senders, inboxes): (Vec<_>, Vec<_>) =
            (0..self.size).map(|_| channel::unbounded()).unzip();
        let fabric = Arc::new(Fabric::new(
            senders,
            Arc::clone(&self.live_subgroups),
            self.recv_timeout,
        ));
        let f = &f;
        let size = self.size;

        let (mut outcomes, spawn_error) = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(size);
            let mut spawn_error = None;

            for (rank, inbox) in inboxes.into_iter().enumerate() {
                let rank_fabric = Arc::clone(&fabric);
                let spawned = thread::Builder::new()
                    .name(format!("rank-{rank}"))
                    .spawn_scoped(scope, move || {
                        let world =
                            LocalComm::world(rank, size, inbox, Arc::clone(&rank_fabric));
                        match panic::catch_unwind(AssertUnwindSafe(|| f(world))) {
                            Ok(Ok(value)) => RankOutcome::Done(value),
                            Ok(Err(err)) => {
                                rank_fabric.abort(rank);
                                RankOutcome::Failed(err)
                            }
                            Err(_) => {
                                rank_fabric.abort(rank);
                                RankOutcome::Panicked
                            }
                        }
                    });
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(source) => {
                        fabric.abort(rank);
                        spawn_error = Some(CommError::Spawn { rank, source });
                        break;
                    }
                }
            }

            let outcomes: Vec<RankOutcome<T, E>> = handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or(RankOutcome::Panicked))
                .collect();
            (outcomes, spawn_error)
        });

        if let Some(err) = spawn_error {
            return Err(err.into());
        }

        if let Some(origin) = fabric.abort_origin() {
            return Err(match outcomes.swap_remove(origin) {
                RankOutcome::Failed(err) => err,
                RankOutcome::Panicked => CommError::RankPanicked(origin).into(),
                RankOutcome::Done(_) => CommError::Aborted { origin }.into(),
            });
        }

        outcomes
            .into_iter()
            .enumerate()
            .map(|(rank, outcome)| match outcome {
                RankOutcome::Done(value) => Ok(value),
                RankOutcome::Failed(err) => Err(err),
                RankOutcome::Panicked => Err(CommError::RankPanicked(rank).into()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Communicator, Result};

    fn universe(size: usize) -> LocalUniverse {
        LocalUniverse::new(size).recv_timeout(Duration::from_secs(10))
    }

    #[test]
    fn test_rank_and_size() {
        let seen = universe(4)
            .run(|world| Ok::<_, CommError>((world.rank(), world.size())))
            .unwrap();
        assert_eq!(seen, vec![(0, 4), (1, 4), (2, 4), (3, 4)]);
    }

    #[test]
    fn test_scatter_then_gather_is_identity() {
        let original: Vec<i32> = (0..12).collect();
        let gathered = universe(4)
            .run(|world| -> Result<Option<Vec<i32>>> {
                let mut chunk = [0i32; 3];
                let send = (world.rank() == 0).then_some(original.as_slice());
                world.scatter(send, &mut chunk, 0)?;

                let mut out = (world.rank() == 0).then(|| vec![0i32; 12]);
                world.gather(&chunk, out.as_deref_mut(), 0)?;
                Ok(out)
            })
            .unwrap();

        assert_eq!(gathered[0].as_deref(), Some(original.as_slice()));
        assert!(gathered[1..].iter().all(Option::is_none));
    }

    #[test]
    fn test_scatter_delivers_rank_chunks() {
        let chunks = universe(3)
            .run(|world| -> Result<Vec<i64>> {
                let source: Vec<i64> = vec![10, 11, 20, 21, 30, 31];
                let mut chunk = vec![0i64; 2];
                let send = (world.rank() == 0).then_some(source.as_slice());
                world.scatter(send, &mut chunk, 0)?;
                Ok(chunk)
            })
            .unwrap();
        assert_eq!(chunks, vec![vec![10, 11], vec![20, 21], vec![30, 31]]);
    }

    #[test]
    fn test_broadcast_replicates_root_buffer() {
        let buffers = universe(3)
            .run(|world| -> Result<Vec<i32>> {
                let mut buf = if world.rank() == 1 {
                    vec![7, 8, 9]
                } else {
                    vec![0; 3]
                };
                world.broadcast(&mut buf, 1)?;
                Ok(buf)
            })
            .unwrap();
        assert!(buffers.iter().all(|buf| buf == &[7, 8, 9]));
    }

    #[test]
    fn test_reduce_max_returns_largest() {
        let local_times = [0.1, 0.5, 0.3];
        let reduced = universe(3)
            .run(|world| world.reduce_max(local_times[world.rank()], 0))
            .unwrap();
        assert_eq!(reduced, vec![Some(0.5), None, None]);
    }

    #[test]
    fn test_sendrecv_replace_rotates_left() {
        let rotated = universe(4)
            .run(|world| -> Result<i32> {
                let size = world.size();
                let mut buf = [world.rank() as i32];
                let left = (world.rank() + size - 1) % size;
                let right = (world.rank() + 1) % size;
                world.sendrecv_replace(&mut buf, left, right)?;
                Ok(buf[0])
            })
            .unwrap();
        assert_eq!(rotated, vec![1, 2, 3, 0]);
    }

    #[test]
    fn test_sendrecv_replace_with_self() {
        let values = universe(1)
            .run(|world| -> Result<Vec<u32>> {
                let mut buf = vec![4, 5];
                world.sendrecv_replace(&mut buf, 0, 0)?;
                Ok(buf)
            })
            .unwrap();
        assert_eq!(values, vec![vec![4, 5]]);
    }

    #[test]
    fn test_split_orders_by_key() {
        let ranks = universe(6)
            .run(|world| -> Result<(usize, usize)> {
                let color = world.rank() % 2;
                let key = world.size() - world.rank();
                let group = world.split(color, key)?;
                Ok((group.rank(), group.size()))
            })
            .unwrap();
        // Evens {0, 2, 4} and odds {1, 3, 5}, both reversed by the key.
        assert_eq!(ranks, vec![(2, 3), (2, 3), (1, 3), (1, 3), (0, 3), (0, 3)]);
    }

    #[test]
    fn test_split_groups_route_messages() {
        let maxima = universe(4)
            .run(|world| -> Result<Option<f64>> {
                let row = world.rank() / 2;
                let col = world.rank() % 2;
                let row_group = world.split(row, col)?;
                row_group.reduce_max(world.rank() as f64, 0)
            })
            .unwrap();
        assert_eq!(maxima, vec![Some(1.0), None, Some(3.0), None]);
    }

    #[test]
    fn test_subgroups_released_on_free_and_drop() {
        let universe = universe(4);
        universe
            .run(|world| -> Result<()> {
                let freed = world.split(world.rank() / 2, world.rank())?;
                let _dropped = world.split(world.rank() % 2, world.rank())?;
                freed.free()
            })
            .unwrap();
        assert_eq!(universe.live_subgroups(), 0);
    }

    #[test]
    fn test_point_to_point_preserves_order() {
        let received = universe(2)
            .run(|world| -> Result<Vec<i32>> {
                if world.rank() == 0 {
                    for value in 0..5 {
                        world.send(&[value], 1, 7)?;
                    }
                    Ok(Vec::new())
                } else {
                    let mut out = Vec::new();
                    for _ in 0..5 {
                        let mut buf = [0i32];
                        world.recv(&mut buf, 0, 7)?;
                        out.push(buf[0]);
                    }
                    Ok(out)
                }
            })
            .unwrap();
        assert_eq!(received[1], vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_out_of_order_tags_are_matched() {
        let received = universe(2)
            .run(|world| -> Result<(i32, i32)> {
                if world.rank() == 0 {
                    world.send(&[1], 1, 1)?;
                    world.send(&[2], 1, 2)?;
                    Ok((0, 0))
                } else {
                    let (mut second, mut first) = ([0i32], [0i32]);
                    world.recv(&mut second, 0, 2)?;
                    world.recv(&mut first, 0, 1)?;
                    Ok((first[0], second[0]))
                }
            })
            .unwrap();
        assert_eq!(received[1], (1, 2));
    }

    #[test]
    fn test_reserved_tag_rejected() {
        let err = universe(1)
            .run(|world| world.send(&[1i32], 0, crate::RESERVED_TAG_BASE))
            .unwrap_err();
        assert!(matches!(err, CommError::ReservedTag(_)));
    }

    #[test]
    fn test_scatter_length_mismatch() {
        let err = universe(2)
            .run(|world| -> Result<()> {
                let source = [1i32, 2, 3];
                let mut chunk = [0i32; 2];
                let send = (world.rank() == 0).then_some(&source[..]);
                world.scatter(send, &mut chunk, 0)
            })
            .unwrap_err();
        assert!(matches!(
            err,
            CommError::LengthMismatch {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_failure_aborts_blocked_ranks() {
        let err = universe(3)
            .run(|world| -> Result<()> {
                if world.rank() == 2 {
                    return Err(CommError::RankOutOfRange { rank: 9, size: 3 });
                }
                let mut buf = [0i32; 1];
                world.broadcast(&mut buf, 2)
            })
            .unwrap_err();
        assert!(matches!(err, CommError::RankOutOfRange { rank: 9, .. }));
    }

    #[test]
    fn test_panic_is_reported() {
        let err = universe(2)
            .run(|world| -> Result<()> {
                if world.rank() == 1 {
                    panic!("rank 1 gives up");
                }
                let mut buf = [0i32; 1];
                world.recv(&mut buf, 1, 0)
            })
            .unwrap_err();
        assert!(matches!(err, CommError::RankPanicked(1)));
    }

    #[test]
    fn test_recv_timeout_fires() {
        let err = LocalUniverse::new(2)
            .recv_timeout(Duration::from_millis(50))
            .run(|world| -> Result<()> {
                if world.rank() == 1 {
                    thread::sleep(Duration::from_millis(500));
                    return Ok(());
                }
                let mut buf = [0i32; 1];
                world.recv(&mut buf, 1, 0)
            })
            .unwrap_err();
        assert!(matches!(err, CommError::Timeout(timeout) if timeout == Duration::from_millis(50)));
    }

    #[test]
    fn test_wall_time_is_monotonic() {
        let deltas = universe(2)
            .run(|world| -> Result<f64> {
                let start = world.wall_time();
                thread::sleep(Duration::from_millis(2));
                Ok(world.wall_time() - start)
            })
            .unwrap();
        assert!(deltas.iter().all(|&delta| delta > 0.0));
    }
}
