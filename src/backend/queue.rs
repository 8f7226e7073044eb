// Queue tracker - submission IDs and in-flight command batches
//
// Up to three hardware queues (graphics, compute, copy). Each queue hands out
// strictly increasing submission IDs starting at 1, keeps the batches the GPU
// has not finished yet, and recycles their command buffers once it has.
//
// Hardware queues are not reentrant: every native call on a queue happens
// under that queue's lock. Different queues never share a lock.

use ash::vk;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::errors::{Result, RhiError};

use super::native::NativeQueue;

/// Hardware queue kinds, in slot order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueueKind {
    Graphics = 0,
    Compute = 1,
    Copy = 2,
}

impl QueueKind {
    pub const COUNT: usize = 3;
    pub const ALL: [QueueKind; Self::COUNT] = [QueueKind::Graphics, QueueKind::Compute, QueueKind::Copy];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Where and when a command list was last submitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub queue: QueueKind,
    pub submission_id: u64,
}

/// Command buffers submitted together under one submission ID.
#[derive(Debug)]
pub struct CommandBatch {
    pub submission_id: u64,
    pub command_buffers: Vec<vk::CommandBuffer>,
}

#[derive(Debug)]
struct QueueState {
    next_submission_id: u64,
    last_finished_id: u64,
    in_flight: VecDeque<CommandBatch>,
    /// Command buffers of retired batches, ready to record again.
    free_command_buffers: Vec<vk::CommandBuffer>,
}

/// One hardware queue and its in-flight work.
pub struct Queue {
    kind: QueueKind,
    native: Arc<dyn NativeQueue>,
    state: Mutex<QueueState>,
}

impl Queue {
    pub fn new(kind: QueueKind, native: Arc<dyn NativeQueue>) -> Self {
        Self {
            kind,
            native,
            state: Mutex::new(QueueState {
                next_submission_id: 1,
                last_finished_id: 0,
                in_flight: VecDeque::new(),
                free_command_buffers: Vec::new(),
            }),
        }
    }

    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    pub fn raw(&self) -> vk::Queue {
        self.native.raw()
    }

    pub fn family_index(&self) -> u32 {
        self.native.family_index()
    }

    /// The last ID handed out, or 0 before the first submission.
    pub fn last_submitted_id(&self) -> u64 {
        self.state.lock().next_submission_id - 1
    }

    /// Highest completed ID observed by the last [`retire`](Self::retire).
    pub fn last_finished_id(&self) -> u64 {
        self.state.lock().last_finished_id
    }

    /// Submission IDs of every batch still in flight, oldest first.
    pub fn in_flight_ids(&self) -> Vec<u64> {
        self.state
            .lock()
            .in_flight
            .iter()
            .map(|batch| batch.submission_id)
            .collect()
    }

    /// Hands out a command buffer in the recording state.
    fn begin_command_buffer(&self) -> Result<vk::CommandBuffer> {
        let mut state = self.state.lock();
        let command_buffer = match state.free_command_buffers.pop() {
            Some(recycled) => recycled,
            None => self
                .native
                .allocate_command_buffer()
                .map_err(RhiError::vulkan("command buffer allocation"))?,
        };

        if let Err(result) = self.native.begin_command_buffer(command_buffer) {
            state.free_command_buffers.push(command_buffer);
            return Err(RhiError::Vulkan {
                context: "begin command buffer",
                result,
            });
        }
        Ok(command_buffer)
    }

    /// Takes back a command buffer that was never submitted.
    fn release_command_buffer(&self, command_buffer: vk::CommandBuffer, recording: bool) {
        let mut state = self.state.lock();
        if recording {
            if let Err(result) = self.native.end_command_buffer(command_buffer) {
                log::debug!("{:?} queue: ending abandoned command buffer failed: {:?}", self.kind, result);
            }
        }
        state.free_command_buffers.push(command_buffer);
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> Result<()> {
        let _state = self.state.lock();
        self.native
            .end_command_buffer(command_buffer)
            .map_err(RhiError::vulkan("end command buffer"))
    }

    /// Submits the closed command lists as one batch and returns its ID.
    ///
    /// Every list records `(kind, id)`. The ID is consumed even when the native
    /// submit fails, so IDs are never reused.
    pub fn submit(&self, command_lists: &mut [&mut CommandList]) -> Result<u64> {
        let command_buffers = command_lists
            .iter()
            .map(|list| {
                if list.queue_kind() != self.kind {
                    return Err(RhiError::CommandListState("recorded for a different queue"));
                }
                list.closed_buffer()
            })
            .collect::<Result<Vec<_>>>()?;

        let mut state = self.state.lock();
        let submission_id = state.next_submission_id;
        state.next_submission_id += 1;

        self.native
            .submit(&command_buffers, submission_id)
            .map_err(RhiError::vulkan("queue submit"))?;

        state.in_flight.push_back(CommandBatch {
            submission_id,
            command_buffers,
        });
        drop(state);

        for list in command_lists.iter_mut() {
            list.executed(self.kind, submission_id);
        }

        log::trace!("{:?} queue: submitted batch {}", self.kind, submission_id);
        Ok(submission_id)
    }

    /// Drops every batch the GPU has finished. Never blocks.
    ///
    /// Returns how many batches were retired.
    pub fn retire(&self) -> Result<usize> {
        let mut state = self.state.lock();
        let completed = self
            .native
            .completed_submission_id()
            .map_err(RhiError::vulkan("completion poll"))?;
        state.last_finished_id = state.last_finished_id.max(completed);
        let last_finished = state.last_finished_id;

        let mut retired = 0;
        while state
            .in_flight
            .front()
            .is_some_and(|batch| batch.submission_id <= last_finished)
        {
            if let Some(batch) = state.in_flight.pop_front() {
                state.free_command_buffers.extend(batch.command_buffers);
                retired += 1;
            }
        }
        Ok(retired)
    }
}

/// The queues of one device, indexed by kind.
pub struct QueueTracker {
    queues: [Option<Arc<Queue>>; QueueKind::COUNT],
}

impl QueueTracker {
    /// One queue per supplied native handle; absent kinds stay absent.
    pub fn new(natives: [Option<Arc<dyn NativeQueue>>; QueueKind::COUNT]) -> Self {
        let mut queues: [Option<Arc<Queue>>; QueueKind::COUNT] = Default::default();
        for (kind, native) in QueueKind::ALL.into_iter().zip(natives) {
            queues[kind.index()] = native.map(|native| Arc::new(Queue::new(kind, native)));
        }
        Self { queues }
    }

    pub fn get(&self, kind: QueueKind) -> Option<&Arc<Queue>> {
        self.queues[kind.index()].as_ref()
    }

    pub fn has(&self, kind: QueueKind) -> bool {
        self.get(kind).is_some()
    }

    pub fn submit(&self, command_lists: &mut [&mut CommandList], kind: QueueKind) -> Result<u64> {
        self.get(kind)
            .ok_or(RhiError::QueueUnavailable(kind))?
            .submit(command_lists)
    }

    /// Retires finished batches on every present queue.
    ///
    /// A failing queue does not stop the others from retiring; the first
    /// error is returned once every queue has been polled.
    pub fn retire(&self) -> Result<usize> {
        let mut retired = 0;
        let mut first_error = None;
        for queue in self.queues.iter().flatten() {
            match queue.retire() {
                Ok(count) => retired += count,
                Err(err) => {
                    log::warn!("{:?} queue: {}", queue.kind(), err);
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(retired),
        }
    }
}

/// Records work for one queue.
///
/// `open` and `close` bracket recording. A closed list can be submitted once;
/// after that it may be opened again.
pub struct CommandList {
    queue: Arc<Queue>,
    command_buffer: Option<vk::CommandBuffer>,
    recording: bool,
    last_submission: Option<SubmissionRecord>,
}

impl CommandList {
    pub fn new(queue: Arc<Queue>) -> Self {
        Self {
            queue,
            command_buffer: None,
            recording: false,
            last_submission: None,
        }
    }

    pub fn queue_kind(&self) -> QueueKind {
        self.queue.kind()
    }

    /// The command buffer being recorded, if the list is open or closed but not yet submitted.
    pub fn raw(&self) -> Option<vk::CommandBuffer> {
        self.command_buffer
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// The submission that last included this list.
    pub fn last_submission(&self) -> Option<SubmissionRecord> {
        self.last_submission
    }

    pub fn open(&mut self) -> Result<()> {
        if self.command_buffer.is_some() {
            return Err(RhiError::CommandListState("already open or awaiting submission"));
        }
        self.command_buffer = Some(self.queue.begin_command_buffer()?);
        self.recording = true;
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        let command_buffer = match self.command_buffer {
            Some(cb) if self.recording => cb,
            _ => return Err(RhiError::CommandListState("not open")),
        };
        self.queue.end_command_buffer(command_buffer)?;
        self.recording = false;
        Ok(())
    }

    fn closed_buffer(&self) -> Result<vk::CommandBuffer> {
        match self.command_buffer {
            Some(cb) if !self.recording => Ok(cb),
            Some(_) => Err(RhiError::CommandListState("still recording")),
            None => Err(RhiError::CommandListState("nothing recorded")),
        }
    }

    fn executed(&mut self, queue: QueueKind, submission_id: u64) {
        self.command_buffer = None;
        self.last_submission = Some(SubmissionRecord { queue, submission_id });
    }
}

impl Drop for CommandList {
    fn drop(&mut self) {
        if let Some(command_buffer) = self.command_buffer.take() {
            self.queue.release_command_buffer(command_buffer, self.recording);
        }
    }
}

impl std::fmt::Debug for CommandList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandList")
            .field("queue", &self.queue.kind())
            .field("command_buffer", &self.command_buffer)
            .field("recording", &self.recording)
            .field("last_submission", &self.last_submission)
            .finish()
    }
}
