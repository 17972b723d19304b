//! In-process communicator for ranks running on threads
//!
//! All endpoints of one world share a mailbox: a map from
//! `(source, destination, tag)` to a FIFO of byte buffers, guarded by a
//! `parking_lot` mutex and a condition variable that wakes blocked receivers
//! whenever a message lands or the world is aborted.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::comm::{BCAST_TAG, Communicator};
use crate::controller::status::StatusDetail;
use crate::error::{PfasstError, Result};

type Route = (usize, usize, i32);

#[derive(Default)]
struct Mail {
    queues: HashMap<Route, VecDeque<Vec<u8>>>,
    aborted: Option<i32>,
}

#[derive(Default)]
struct Mailbox {
    mail: Mutex<Mail>,
    arrived: Condvar,
}

/// One endpoint of an in-process world
///
/// # Example
///
/// ```rust
/// use pfasst_rs::comm::{Communicator, ThreadCommunicator};
///
/// let mut world = ThreadCommunicator::world(2);
/// let second = world.pop().unwrap();
/// let first = world.pop().unwrap();
///
/// first.send(&[1.0, 2.0], 1, 7).unwrap();
/// let mut buffer = [0.0; 2];
/// second.recv(&mut buffer, 0, 7).unwrap();
/// assert_eq!(buffer, [1.0, 2.0]);
/// ```
pub struct ThreadCommunicator {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
    posted_recvs: Mutex<HashSet<(usize, i32)>>,
    posted_sends: Mutex<HashSet<(usize, i32)>>,
    timeout: Option<Duration>,
}

impl ThreadCommunicator {
    /// Create `size` connected endpoints, index `i` being rank `i`
    ///
    /// # Panics
    ///
    /// Panics when `size == 0`.
    pub fn world(size: usize) -> Vec<ThreadCommunicator> {
        assert!(size > 0, "a communicator world needs at least one rank");
        let mailbox = Arc::new(Mailbox::default());

        (0..size)
            .map(|rank| ThreadCommunicator {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
                posted_recvs: Mutex::new(HashSet::new()),
                posted_sends: Mutex::new(HashSet::new()),
                timeout: None,
            })
            .collect()
    }

    /// Fail blocking receives that wait longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Number of delivered but not yet received messages addressed to this rank
    pub fn pending_messages(&self) -> usize {
        let mail = self.mailbox.mail.lock();
        mail.queues
            .iter()
            .filter(|((_, dest, _), _)| *dest == self.rank)
            .map(|(_, queue)| queue.len())
            .sum()
    }

    fn check_rank(&self, other: usize, role: &str) -> Result<()> {
        if other >= self.size {
            return Err(PfasstError::Communication(format!(
                "{} rank {} out of range for world of size {}",
                role, other, self.size
            )));
        }
        Ok(())
    }

    fn deliver(&self, bytes: &[u8], dest: usize, tag: i32) -> Result<()> {
        self.check_rank(dest, "destination")?;

        let mut mail = self.mailbox.mail.lock();
        if let Some(code) = mail.aborted {
            return Err(PfasstError::Communication(format!("world aborted with code {}", code)));
        }
        mail.queues
            .entry((self.rank, dest, tag))
            .or_default()
            .push_back(bytes.to_vec());
        drop(mail);

        self.mailbox.arrived.notify_all();
        Ok(())
    }

    fn take(&self, buffer: &mut [u8], src: usize, tag: i32) -> Result<()> {
        self.check_rank(src, "source")?;
        self.posted_recvs.lock().remove(&(src, tag));

        let route = (src, self.rank, tag);
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut mail = self.mailbox.mail.lock();

        loop {
            if let Some(code) = mail.aborted {
                return Err(PfasstError::Communication(format!("world aborted with code {}", code)));
            }

            if let Some(message) = mail.queues.get_mut(&route).and_then(|q| q.pop_front()) {
                if message.len() != buffer.len() {
                    return Err(PfasstError::Communication(format!(
                        "message from rank {} with tag {} has {} bytes, expected {}",
                        src, tag, message.len(), buffer.len()
                    )));
                }
                buffer.copy_from_slice(&message);
                return Ok(());
            }

            match deadline {
                None => self.mailbox.arrived.wait(&mut mail),
                Some(deadline) => {
                    if self.mailbox.arrived.wait_until(&mut mail, deadline).timed_out() {
                        return Err(PfasstError::Communication(format!(
                            "rank {} timed out waiting for rank {} (tag {})",
                            self.rank, src, tag
                        )));
                    }
                }
            }
        }
    }

    /// A posted send stays outstanding until `dest` has taken its message
    fn post_send(&self, dest: usize, tag: i32) -> Result<()> {
        self.check_rank(dest, "destination")?;

        let mut posted = self.posted_sends.lock();
        if posted.contains(&(dest, tag)) {
            let mail = self.mailbox.mail.lock();
            let undelivered = mail
                .queues
                .get(&(self.rank, dest, tag))
                .is_some_and(|q| !q.is_empty());
            if undelivered {
                return Err(PfasstError::Communication(format!(
                    "send to rank {} with tag {} is already posted",
                    dest, tag
                )));
            }
        }
        posted.insert((dest, tag));
        Ok(())
    }

    fn post_recv(&self, src: usize, tag: i32) -> Result<()> {
        self.check_rank(src, "source")?;
        if !self.posted_recvs.lock().insert((src, tag)) {
            return Err(PfasstError::Communication(format!(
                "receive from rank {} with tag {} is already posted",
                src, tag
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for ThreadCommunicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadCommunicator")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl Communicator for ThreadCommunicator {
    fn size(&self) -> usize {
        self.size
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn send(&self, data: &[f64], dest: usize, tag: i32) -> Result<()> {
        self.deliver(bytemuck::cast_slice(data), dest, tag)
    }

    fn isend(&self, data: &[f64], dest: usize, tag: i32) -> Result<()> {
        self.post_send(dest, tag)?;
        self.deliver(bytemuck::cast_slice(data), dest, tag)
    }

    fn recv(&self, data: &mut [f64], src: usize, tag: i32) -> Result<()> {
        self.take(bytemuck::cast_slice_mut(data), src, tag)
    }

    fn irecv(&self, src: usize, tag: i32) -> Result<()> {
        self.post_recv(src, tag)
    }

    fn probe(&self, src: usize, tag: i32) -> Result<bool> {
        self.check_rank(src, "source")?;
        let mail = self.mailbox.mail.lock();
        Ok(mail
            .queues
            .get(&(src, self.rank, tag))
            .is_some_and(|q| !q.is_empty()))
    }

    fn send_status(&self, status: &StatusDetail, dest: usize, tag: i32) -> Result<()> {
        self.deliver(bytemuck::bytes_of(status), dest, tag)
    }

    fn isend_status(&self, status: &StatusDetail, dest: usize, tag: i32) -> Result<()> {
        self.post_send(dest, tag)?;
        self.deliver(bytemuck::bytes_of(status), dest, tag)
    }

    fn recv_status(&self, status: &mut StatusDetail, src: usize, tag: i32) -> Result<()> {
        self.take(bytemuck::bytes_of_mut(status), src, tag)
    }

    fn irecv_status(&self, src: usize, tag: i32) -> Result<()> {
        self.post_recv(src, tag)
    }

    fn bcast(&self, data: &mut [f64], root: usize) -> Result<()> {
        self.check_rank(root, "root")?;

        if self.rank == root {
            for dest in (0..self.size).filter(|&r| r != root) {
                self.send(data, dest, BCAST_TAG)?;
            }
            Ok(())
        } else {
            self.recv(data, root, BCAST_TAG)
        }
    }

    fn cleanup(&self) -> Result<()> {
        let outstanding = self.posted_recvs.lock().len();
        if outstanding > 0 {
            log::warn!(
                target: "pfasst::comm",
                "rank {} drops {} posted receive(s) on cleanup",
                self.rank, outstanding
            );
        }
        self.posted_recvs.lock().clear();
        self.posted_sends.lock().clear();
        Ok(())
    }

    fn abort(&self, err_code: i32) {
        log::error!(target: "pfasst::comm", "rank {} aborts the world with code {}", self.rank, err_code);
        self.mailbox.mail.lock().aborted = Some(err_code);
        self.mailbox.arrived.notify_all();
    }
}
