use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use crossbeam::channel::Receiver;

use super::fabric::{Envelope, Fabric, Mailbox, Message, WORLD_CONTEXT};
use crate::{CommError, Communicator, Element, Result, Tag, RESERVED_TAG_BASE};

const TAG_SCATTER: Tag = RESERVED_TAG_BASE;
const TAG_BROADCAST: Tag = RESERVED_TAG_BASE + 1;
const TAG_GATHER: Tag = RESERVED_TAG_BASE + 2;
const TAG_REDUCE: Tag = RESERVED_TAG_BASE + 3;
const TAG_SHIFT: Tag = RESERVED_TAG_BASE + 4;
const TAG_SPLIT_REQUEST: Tag = RESERVED_TAG_BASE + 5;
const TAG_SPLIT_REPLY: Tag = RESERVED_TAG_BASE + 6;

/// Group rank that coordinates [`Communicator::split`].
const SPLIT_LEADER: usize = 0;

/// A rank's handle on one group of a [`super::LocalUniverse`].
///
/// The world handle and every sub-group split from it share the rank's
/// mailbox, so handles stay on the thread that owns the rank.
pub struct LocalComm {
    mailbox: Rc<Mailbox>,
    context: usize,
    rank: usize,
    /// Global rank of every member, indexed by group rank.
    members: Rc<[usize]>,
}

impl LocalComm {
    pub(crate) fn world(
        rank: usize,
        size: usize,
        inbox: Receiver<Envelope>,
        fabric: Arc<Fabric>,
    ) -> Self {
        Self {
            mailbox: Rc::new(Mailbox::new(rank, inbox, fabric)),
            context: WORLD_CONTEXT,
            rank,
            members: (0..size).collect(),
        }
    }

    /// Rank of this process in the world group.
    pub fn global_rank(&self) -> usize {
        self.mailbox.global_rank
    }

    fn is_subgroup(&self) -> bool {
        self.context != WORLD_CONTEXT
    }

    fn check_rank(&self, rank: usize) -> Result<()> {
        if rank < self.members.len() {
            Ok(())
        } else {
            Err(CommError::RankOutOfRange {
                rank,
                size: self.members.len(),
            })
        }
    }

    fn post<T: Element>(&self, dest: usize, tag: Tag, data: Vec<T>) -> Result<()> {
        self.check_rank(dest)?;
        let message = Message {
            context: self.context,
            source: self.rank,
            tag,
            payload: Box::new(data),
        };
        self.mailbox
            .fabric
            .post(self.members[dest], Envelope::Message(message))
    }

    fn take<T: Element>(&self, source: usize, tag: Tag) -> Result<Vec<T>> {
        self.check_rank(source)?;
        let payload = self.mailbox.take(self.context, source, tag)?;
        payload
            .downcast::<Vec<T>>()
            .map(|data| *data)
            .map_err(|_| CommError::TypeMismatch { peer: source })
    }

    fn take_into<T: Element>(&self, buf: &mut [T], source: usize, tag: Tag) -> Result<()> {
        let data = self.take::<T>(source, tag)?;
        if data.len() != buf.len() {
            return Err(CommError::LengthMismatch {
                expected: buf.len(),
                actual: data.len(),
            });
        }
        buf.copy_from_slice(&data);
        Ok(())
    }
}

fn check_len(actual: usize, expected: usize) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(CommError::LengthMismatch { expected, actual })
    }
}

fn check_user_tag(tag: Tag) -> Result<()> {
    if tag >= RESERVED_TAG_BASE {
        Err(CommError::ReservedTag(tag))
    } else {
        Ok(())
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.members.len()
    }

    fn send<T: Element>(&self, buf: &[T], dest: usize, tag: Tag) -> Result<()> {
        check_user_tag(tag)?;
        self.post(dest, tag, buf.to_vec())
    }

    fn recv<T: Element>(&self, buf: &mut [T], source: usize, tag: Tag) -> Result<()> {
        check_user_tag(tag)?;
        self.take_into(buf, source, tag)
    }

    fn scatter<T: Element>(&self, send: Option<&[T]>, recv: &mut [T], root: usize) -> Result<()> {
        self.check_rank(root)?;
        if self.rank != root {
            return self.take_into(recv, root, TAG_SCATTER);
        }

        let send = send.ok_or(CommError::MissingRootBuffer { root, op: "scatter" })?;
        let count = recv.len();
        check_len(send.len(), count * self.size())?;
        for dest in 0..self.size() {
            let chunk = &send[dest * count..(dest + 1) * count];
            if dest == root {
                recv.copy_from_slice(chunk);
            } else {
                self.post(dest, TAG_SCATTER, chunk.to_vec())?;
            }
        }
        Ok(())
    }

    fn broadcast<T: Element>(&self, buf: &mut [T], root: usize) -> Result<()> {
        self.check_rank(root)?;
        if self.rank != root {
            return self.take_into(buf, root, TAG_BROADCAST);
        }

        for dest in (0..self.size()).filter(|&dest| dest != root) {
            self.post(dest, TAG_BROADCAST, buf.to_vec())?;
        }
        Ok(())
    }

    fn gather<T: Element>(&self, send: &[T], recv: Option<&mut [T]>, root: usize) -> Result<()> {
        self.check_rank(root)?;
        if self.rank != root {
            return self.post(root, TAG_GATHER, send.to_vec());
        }

        let recv = recv.ok_or(CommError::MissingRootBuffer { root, op: "gather" })?;
        let count = send.len();
        check_len(recv.len(), count * self.size())?;
        for source in 0..self.size() {
            let chunk = &mut recv[source * count..(source + 1) * count];
            if source == root {
                chunk.copy_from_slice(send);
            } else {
                self.take_into(chunk, source, TAG_GATHER)?;
            }
        }
        Ok(())
    }

    fn reduce_max(&self, value: f64, root: usize) -> Result<Option<f64>> {
        self.check_rank(root)?;
        if self.rank != root {
            self.post(root, TAG_REDUCE, vec![value])?;
            return Ok(None);
        }

        let mut max = value;
        for source in (0..self.size()).filter(|&source| source != root) {
            let mut other = [0.0f64];
            self.take_into(&mut other, source, TAG_REDUCE)?;
            max = max.max(other[0]);
        }
        Ok(Some(max))
    }

    fn sendrecv_replace<T: Element>(
        &self,
        buf: &mut [T],
        send_to: usize,
        recv_from: usize,
    ) -> Result<()> {
        self.check_rank(recv_from)?;
        // Mailboxes are unbounded, so posting never blocks and the receive
        // below cannot wait on a peer that is itself stuck sending.
        self.post(send_to, TAG_SHIFT, buf.to_vec())?;
        self.take_into(buf, recv_from, TAG_SHIFT)
    }

    fn split(&self, color: usize, key: usize) -> Result<Self> {
        self.post(SPLIT_LEADER, TAG_SPLIT_REQUEST, vec![color, key])?;

        if self.rank == SPLIT_LEADER {
            let mut groups: BTreeMap<usize, Vec<(usize, usize)>> = BTreeMap::new();
            for source in 0..self.size() {
                let request: Vec<usize> = self.take(source, TAG_SPLIT_REQUEST)?;
                check_len(request.len(), 2)?;
                groups
                    .entry(request[0])
                    .or_default()
                    .push((request[1], source));
            }

            for mut group in groups.into_values() {
                group.sort_unstable();
                let context = self.mailbox.fabric.allocate_context();
                let members: Vec<usize> = group
                    .iter()
                    .map(|&(_, parent)| self.members[parent])
                    .collect();
                for (sub_rank, &(_, parent)) in group.iter().enumerate() {
                    let mut reply = Vec::with_capacity(members.len() + 2);
                    reply.push(context);
                    reply.push(sub_rank);
                    reply.extend_from_slice(&members);
                    self.post(parent, TAG_SPLIT_REPLY, reply)?;
                }
            }
        }

        let reply: Vec<usize> = self.take(SPLIT_LEADER, TAG_SPLIT_REPLY)?;
        if reply.len() < 3 {
            return Err(CommError::LengthMismatch {
                expected: 3,
                actual: reply.len(),
            });
        }

        self.mailbox.fabric.subgroup_created();
        tracing::trace!(
            global_rank = self.global_rank(),
            color,
            key,
            context = reply[0],
            sub_rank = reply[1],
            "split"
        );
        Ok(Self {
            mailbox: Rc::clone(&self.mailbox),
            context: reply[0],
            rank: reply[1],
            members: reply[2..].into(),
        })
    }

    fn free(self) -> Result<()> {
        drop(self);
        Ok(())
    }

    fn wall_time(&self) -> f64 {
        self.mailbox.fabric.elapsed()
    }
}

impl Drop for LocalComm {
    fn drop(&mut self) {
        if self.is_subgroup() {
            self.mailbox.fabric.subgroup_released();
        }
    }
}
