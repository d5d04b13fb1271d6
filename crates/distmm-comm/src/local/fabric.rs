use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};

use crate::{CommError, Result, Tag};

pub(crate) const WORLD_CONTEXT: usize = 0;
const NO_ORIGIN: usize = usize::MAX;

pub(crate) type Payload = Box<dyn Any + Send>;

pub(crate) struct Message {
    pub context: usize,
    pub source: usize,
    pub tag: Tag,
    pub payload: Payload,
}

impl Message {
    fn matches(&self, context: usize, source: usize, tag: Tag) -> bool {
        self.context == context && self.source == source && self.tag == tag
    }
}

pub(crate) enum Envelope {
    Message(Message),
    Abort { origin: usize },
}

/// State shared by every rank of one universe run.
pub(crate) struct Fabric {
    mailboxes: Vec<Sender<Envelope>>,
    next_context: AtomicUsize,
    live_subgroups: Arc<AtomicUsize>,
    aborted: AtomicBool,
    abort_origin: AtomicUsize,
    epoch: Instant,
    recv_timeout: Option<Duration>,
}

impl Fabric {
    pub fn new(
        mailboxes: Vec<Sender<Envelope>>,
        live_subgroups: Arc<AtomicUsize>,
        recv_timeout: Option<Duration>,
    ) -> Self {
        Self {
            mailboxes,
            next_context: AtomicUsize::new(WORLD_CONTEXT + 1),
            live_subgroups,
            aborted: AtomicBool::new(false),
            abort_origin: AtomicUsize::new(NO_ORIGIN),
            epoch: Instant::now(),
            recv_timeout,
        }
    }

    pub fn post(&self, global_dest: usize, envelope: Envelope) -> Result<()> {
        let mailbox = self
            .mailboxes
            .get(global_dest)
            .ok_or(CommError::RankOutOfRange {
                rank: global_dest,
                size: self.mailboxes.len(),
            })?;
        mailbox
            .send(envelope)
            .map_err(|_| CommError::Disconnected(global_dest))
    }

    /// Wake every blocked rank with an abort notice. Only the first caller
    /// is recorded as the origin.
    pub fn abort(&self, origin: usize) {
        if self.aborted.swap(true, Ordering::SeqCst) {
            return;
        }
        self.abort_origin.store(origin, Ordering::SeqCst);
        tracing::debug!(origin, "aborting process group");
        for mailbox in &self.mailboxes {
            // Ranks that already finished have dropped their inbox.
            let _ = mailbox.send(Envelope::Abort { origin });
        }
    }

    pub fn abort_origin(&self) -> Option<usize> {
        match self.abort_origin.load(Ordering::SeqCst) {
            NO_ORIGIN => None,
            origin => Some(origin),
        }
    }

    pub fn allocate_context(&self) -> usize {
        self.next_context.fetch_add(1, Ordering::SeqCst)
    }

    pub fn subgroup_created(&self) {
        self.live_subgroups.fetch_add(1, Ordering::SeqCst);
    }

    pub fn subgroup_released(&self) {
        self.live_subgroups.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn elapsed(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

/// One rank's inbox. Messages that arrive before anybody asks for them wait
/// in `pending`, in arrival order.
pub(crate) struct Mailbox {
    pub global_rank: usize,
    pub fabric: Arc<Fabric>,
    inbox: Receiver<Envelope>,
    pending: RefCell<VecDeque<Message>>,
}

impl Mailbox {
    pub fn new(global_rank: usize, inbox: Receiver<Envelope>, fabric: Arc<Fabric>) -> Self {
        Self {
            global_rank,
            fabric,
            inbox,
            pending: RefCell::new(VecDeque::new()),
        }
    }

    /// Block until the first message matching (`context`, `source`, `tag`).
    pub fn take(&self, context: usize, source: usize, tag: Tag) -> Result<Payload> {
        {
            let mut pending = self.pending.borrow_mut();
            let position = pending
                .iter()
                .position(|message| message.matches(context, source, tag));
            if let Some(message) = position.and_then(|index| pending.remove(index)) {
                return Ok(message.payload);
            }
        }

        loop {
            match self.next_envelope()? {
                Envelope::Abort { origin } => return Err(CommError::Aborted { origin }),
                Envelope::Message(message) if message.matches(context, source, tag) => {
                    return Ok(message.payload)
                }
                Envelope::Message(message) => self.pending.borrow_mut().push_back(message),
            }
        }
    }

    fn next_envelope(&self) -> Result<Envelope> {
        match self.fabric.recv_timeout {
            Some(timeout) => self.inbox.recv_timeout(timeout).map_err(|err| match err {
                RecvTimeoutError::Timeout => CommError::Timeout(timeout),
                RecvTimeoutError::Disconnected => CommError::Disconnected(self.global_rank),
            }),
            None => self
                .inbox
                .recv()
                .map_err(|_| CommError::Disconnected(self.global_rank)),
        }
    }
}
