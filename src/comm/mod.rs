//! Message passing between time-slices
//!
//! PFASST runs one controller per time-slice ("rank") and couples them
//! through a [`Communicator`]. The algorithm is single-threaded per rank, so
//! a communicator only has to be safe to call once per logical message from
//! its owning rank; it is the one object shared across concurrent ranks.
//!
//! # Messages
//!
//! Two payload kinds travel between ranks:
//!
//! - **State buffers**: raw contiguous `f64` slices of `size()` elements with
//!   no framing. The receiver must already know the expected length, which is
//!   agreed out-of-band through matching factory sizes on both ends.
//! - **Status records**: a fixed-layout [`StatusDetail`] copied byte for
//!   byte, see [`crate::controller::status`].
//!
//! Ordering is only guaranteed between matching `send`/`recv` pairs with the
//! same `(source, destination, tag)`. There is no global ordering.
//!
//! # Blocking and non-blocking calls
//!
//! Blocking calls return once the transfer completed. Non-blocking calls
//! post a request keyed by `(rank, tag)` and return immediately; at most one
//! request may be outstanding per key. A posted receive is completed by the
//! next blocking receive on the same key. A posted send completes once the
//! destination has received its message; posting another send on the same
//! key before that is an error.
//!
//! # Implementations
//!
//! - [`ThreadCommunicator`]: in-process ranks running on OS threads, built
//!   with [`ThreadCommunicator::world`].

mod convergence;
mod thread;

pub use convergence::ConvergenceFlags;
pub use thread::ThreadCommunicator;

use std::fmt;

use crate::controller::status::StatusDetail;
use crate::error::Result;

/// Tag reserved for broadcasts
pub const BCAST_TAG: i32 = -1;

/// Abstract point-to-point and broadcast transport between ranks
pub trait Communicator: Send + Sync + fmt::Debug {
    /// Number of ranks in the world
    fn size(&self) -> usize;

    /// Rank of this endpoint, in `0..size()`
    fn rank(&self) -> usize;

    /// Human readable endpoint name, used in log lines
    fn name(&self) -> String {
        format!("rank {}/{}", self.rank(), self.size())
    }

    /// Whether this rank owns the first time-slice
    fn is_first(&self) -> bool {
        self.rank() == 0
    }

    /// Whether this rank owns the last time-slice
    fn is_last(&self) -> bool {
        self.rank() + 1 == self.size()
    }

    /// Blocking send of a state buffer
    fn send(&self, data: &[f64], dest: usize, tag: i32) -> Result<()>;

    /// Non-blocking send of a state buffer
    fn isend(&self, data: &[f64], dest: usize, tag: i32) -> Result<()>;

    /// Blocking receive into `data`, completing a posted request if any
    fn recv(&self, data: &mut [f64], src: usize, tag: i32) -> Result<()>;

    /// Post a receive request for `(src, tag)` and return immediately
    fn irecv(&self, src: usize, tag: i32) -> Result<()>;

    /// Whether a message from `src` with `tag` is ready to be received
    fn probe(&self, src: usize, tag: i32) -> Result<bool>;

    /// Blocking send of a status record
    fn send_status(&self, status: &StatusDetail, dest: usize, tag: i32) -> Result<()>;

    /// Non-blocking send of a status record
    fn isend_status(&self, status: &StatusDetail, dest: usize, tag: i32) -> Result<()>;

    /// Blocking receive of a status record
    fn recv_status(&self, status: &mut StatusDetail, src: usize, tag: i32) -> Result<()>;

    /// Post a status receive request for `(src, tag)`
    fn irecv_status(&self, src: usize, tag: i32) -> Result<()>;

    /// Broadcast `data` from `root` to every rank
    ///
    /// On the root `data` is the payload, on every other rank it is
    /// overwritten with the root's payload.
    fn bcast(&self, data: &mut [f64], root: usize) -> Result<()>;

    /// Drop every completed or outstanding request of this endpoint
    fn cleanup(&self) -> Result<()>;

    /// Abort the whole world with `err_code`
    ///
    /// Ranks blocked in a receive wake up with a communication error.
    fn abort(&self, err_code: i32);
}
