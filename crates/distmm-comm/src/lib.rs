//! Message-passing process groups.
//!
//! A [`Communicator`] is a handle on an ordered group of ranks. The
//! distributed multipliers only talk to each other through this trait, so
//! any transport that honours the collective contract below can drive them.
//! [`LocalUniverse`] is the transport shipped with the workspace: one OS
//! thread per rank, exchanging owned buffers through channel mailboxes.
//!
//! Contract shared by every implementation:
//!
//! - all collectives synchronize within their group, and every member calls
//!   the same collectives in the same order with compatible sizes;
//! - point-to-point messages between the same pair with the same tag are
//!   delivered in send order;
//! - sub-groups returned by [`Communicator::split`] are released exactly once,
//!   either through [`Communicator::free`] or when dropped.

mod error;
pub mod local;

pub use error::{CommError, Result};
pub use local::{LocalComm, LocalUniverse};

/// Message tag for point-to-point traffic.
pub type Tag = u32;

/// Tags at or above this value are used internally by collectives.
pub const RESERVED_TAG_BASE: Tag = 0xFFFF_0000;

/// Plain values that can travel in a message buffer.
pub trait Element: Copy + Default + Send + 'static {}

impl Element for i32 {}
impl Element for i64 {}
impl Element for u32 {}
impl Element for u64 {}
impl Element for usize {}
impl Element for f64 {}

/// A rank's handle on an ordered process group. Every member must call the
/// collectives in the same order with compatible buffer sizes.
pub trait Communicator: Sized {
    /// This process's ordinal within the group.
    fn rank(&self) -> usize;

    /// Number of processes in the group.
    fn size(&self) -> usize;

    /// Send `buf` to `dest`.
    fn send<T: Element>(&self, buf: &[T], dest: usize, tag: Tag) -> Result<()>;

    /// Receive exactly `buf.len()` elements from `source`.
    fn recv<T: Element>(&self, buf: &mut [T], source: usize, tag: Tag) -> Result<()>;

    /// Distribute `recv.len()`-sized consecutive chunks of the root's `send`
    /// buffer, chunk `i` to rank `i`. Only the root's `send` is read.
    fn scatter<T: Element>(&self, send: Option<&[T]>, recv: &mut [T], root: usize) -> Result<()>;

    /// Overwrite every member's `buf` with the root's.
    fn broadcast<T: Element>(&self, buf: &mut [T], root: usize) -> Result<()>;

    /// Inverse of [`Communicator::scatter`]: the root's `recv` receives every
    /// member's `send` buffer in rank order.
    fn gather<T: Element>(&self, send: &[T], recv: Option<&mut [T]>, root: usize) -> Result<()>;

    /// Maximum of one scalar per member, delivered on the root only.
    fn reduce_max(&self, value: f64, root: usize) -> Result<Option<f64>>;

    /// Send `buf` to `send_to` and overwrite it with the message from
    /// `recv_from`, without deadlocking whatever the pairing.
    fn sendrecv_replace<T: Element>(
        &self,
        buf: &mut [T],
        send_to: usize,
        recv_from: usize,
    ) -> Result<()>;

    /// Partition the group by `color`. Within each sub-group ranks follow
    /// ascending `key`, ties broken by rank in this group.
    fn split(&self, color: usize, key: usize) -> Result<Self>;

    /// Release a sub-group.
    fn free(self) -> Result<()>;

    /// Monotonic wall-clock seconds, suitable for differencing.
    fn wall_time(&self) -> f64;
}
