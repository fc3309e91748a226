use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::ThreadId;

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{IoConfig, MAX_REGION_NAME_LEN};
use crate::envelope::{split_envelope, ENVELOPE_HEADER_SIZE};
use crate::error::{IoError, Result};
use crate::ledger::{Entry, Ledger, LedgerSnapshot};
use crate::stream_id::StreamId;
use crate::subsystem::{ChannelDirection, IoSubsystem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    /// Held by a caller; must be submitted or released.
    CheckedOut,
    /// Sitting in a ring.
    Parked,
    /// Returned to the region.
    Returned,
}

/// One message slot of a [`LocalIo`] region.
#[derive(Debug)]
pub struct LocalBuffer {
    stream_id: StreamId,
    body: Bytes,
    state: SlotState,
    ledger: Arc<Ledger>,
}

impl LocalBuffer {
    /// Stream the buffer currently belongs to.
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    /// Message body without the envelope.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    fn finish(mut self, entry: Entry) {
        self.state = SlotState::Returned;
        self.ledger.record(entry);
    }
}

impl Drop for LocalBuffer {
    fn drop(&mut self) {
        if self.state == SlotState::CheckedOut {
            self.ledger.record(Entry::Leaked);
            warn!(stream_id = %self.stream_id, "buffer dropped without submit or release");
        }
    }
}

#[derive(Debug)]
struct Ring {
    stream_id: StreamId,
    direction: ChannelDirection,
    capacity: usize,
    slots: Mutex<VecDeque<LocalBuffer>>,
}

impl Ring {
    fn slots(&self) -> MutexGuard<'_, VecDeque<LocalBuffer>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Park `buffer`, or hand it back if the ring is full.
    fn push(&self, mut buffer: LocalBuffer) -> std::result::Result<(), LocalBuffer> {
        let mut slots = self.slots();
        if slots.len() >= self.capacity {
            return Err(buffer);
        }
        buffer.stream_id = self.stream_id;
        buffer.state = SlotState::Parked;
        slots.push_back(buffer);
        Ok(())
    }
}

/// Handle to one ring of a [`LocalIo`] region.
#[derive(Debug, Clone)]
pub struct LocalChannel {
    ring: Arc<Ring>,
}

impl LocalChannel {
    pub fn stream_id(&self) -> StreamId {
        self.ring.stream_id
    }

    pub fn direction(&self) -> ChannelDirection {
        self.ring.direction
    }
}

/// Summary of one ring for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelInfo {
    pub stream_id: StreamId,
    pub direction: ChannelDirection,
    pub capacity: usize,
    pub queued: usize,
    pub linked_to: Option<StreamId>,
}

type ChannelKey = (StreamId, ChannelDirection);

/// In-process channel region.
///
/// Rings are bounded queues of [`LocalBuffer`] slots; the region's
/// `region_size / slot_size` budget caps the total number of slots across
/// rings. An input stream can be linked to an output stream, in which case
/// buffers submitted to the input ring are forwarded straight to the output
/// ring, the way an echoing codelet would.
#[derive(Debug)]
pub struct LocalIo {
    config: IoConfig,
    slots_reserved: Mutex<usize>,
    channels: RwLock<HashMap<ChannelKey, Arc<Ring>>>,
    links: RwLock<HashMap<StreamId, StreamId>>,
    registered: RwLock<HashSet<ThreadId>>,
    ledger: Arc<Ledger>,
}

impl LocalIo {
    /// Validate `config` and create an empty region.
    pub fn initialize(config: IoConfig) -> Result<Self> {
        if config.region_name.is_empty() || config.region_name.len() > MAX_REGION_NAME_LEN {
            return Err(IoError::InvalidConfig(format!(
                "region name must be 1..={MAX_REGION_NAME_LEN} bytes, got {}",
                config.region_name.len()
            )));
        }
        if config.slot_size == 0 {
            return Err(IoError::InvalidConfig("slot size must be non-zero".into()));
        }
        if config.total_slots() == 0 {
            return Err(IoError::InvalidConfig(format!(
                "region of {} bytes cannot hold one {}-byte slot",
                config.region_size, config.slot_size
            )));
        }

        info!(
            region = %config.region_name,
            region_size = config.region_size,
            slot_size = config.slot_size,
            slots = config.total_slots(),
            "initialized io region"
        );

        Ok(Self {
            config,
            slots_reserved: Mutex::new(0),
            channels: RwLock::new(HashMap::new()),
            links: RwLock::new(HashMap::new()),
            registered: RwLock::new(HashSet::new()),
            ledger: Arc::new(Ledger::default()),
        })
    }

    pub fn config(&self) -> &IoConfig {
        &self.config
    }

    /// Create a ring with the configured default capacity.
    pub fn create_channel(&self, stream_id: StreamId, direction: ChannelDirection) -> Result<()> {
        self.create_channel_with_capacity(stream_id, direction, self.config.ring_capacity)
    }

    /// Create a ring holding up to `capacity` buffers.
    pub fn create_channel_with_capacity(
        &self,
        stream_id: StreamId,
        direction: ChannelDirection,
        capacity: usize,
    ) -> Result<()> {
        if capacity == 0 {
            return Err(IoError::InvalidConfig("ring capacity must be non-zero".into()));
        }

        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        if channels.contains_key(&(stream_id, direction)) {
            return Err(IoError::ChannelExists {
                stream_id,
                direction,
            });
        }

        let mut reserved = self
            .slots_reserved
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let available = self.config.total_slots().saturating_sub(*reserved);
        if capacity > available {
            return Err(IoError::RegionExhausted {
                requested: capacity,
                available,
            });
        }
        *reserved += capacity;

        channels.insert(
            (stream_id, direction),
            Arc::new(Ring {
                stream_id,
                direction,
                capacity,
                slots: Mutex::new(VecDeque::with_capacity(capacity)),
            }),
        );
        debug!(%stream_id, %direction, capacity, "created channel");
        Ok(())
    }

    /// Forward everything submitted on input `from` to output `to`.
    pub fn link(&self, from: StreamId, to: StreamId) -> Result<()> {
        self.ring(&from, ChannelDirection::Input)?;
        self.ring(&to, ChannelDirection::Output)?;
        self.links
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(from, to);
        debug!(%from, %to, "linked input stream to output stream");
        Ok(())
    }

    /// Producer side: park `body` in the output ring of `stream_id`.
    pub fn publish(&self, stream_id: &StreamId, body: &[u8]) -> Result<()> {
        self.ensure_registered()?;
        self.check_slot_fits(body.len())?;
        let ring = self.ring(stream_id, ChannelDirection::Output)?;
        let buffer = self.new_buffer(*stream_id, Bytes::copy_from_slice(body));
        match ring.push(buffer) {
            Ok(()) => {
                self.ledger.record(Entry::Published);
                Ok(())
            }
            Err(buffer) => {
                buffer.finish(Entry::Released);
                Err(IoError::RingFull {
                    stream_id: *stream_id,
                    capacity: ring.capacity,
                })
            }
        }
    }

    /// Consumer side: take the oldest body parked in the input ring of `stream_id`.
    pub fn take_input(&self, stream_id: &StreamId) -> Result<Option<Bytes>> {
        self.ensure_registered()?;
        let ring = self.ring(stream_id, ChannelDirection::Input)?;
        let next = ring.slots().pop_front();
        Ok(next.map(|buffer| {
            let body = buffer.body.clone();
            buffer.finish(Entry::Consumed);
            body
        }))
    }

    /// Snapshot of buffer accounting.
    pub fn ledger(&self) -> LedgerSnapshot {
        self.ledger.snapshot()
    }

    /// All rings, ordered by stream id then direction.
    pub fn channels(&self) -> Vec<ChannelInfo> {
        let links = self.links.read().unwrap_or_else(PoisonError::into_inner);
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        let mut infos: Vec<ChannelInfo> = channels
            .values()
            .map(|ring| ChannelInfo {
                stream_id: ring.stream_id,
                direction: ring.direction,
                capacity: ring.capacity,
                queued: ring.slots().len(),
                linked_to: match ring.direction {
                    ChannelDirection::Input => links.get(&ring.stream_id).copied(),
                    ChannelDirection::Output => None,
                },
            })
            .collect();
        infos.sort_by_key(|info| (info.stream_id, info.direction == ChannelDirection::Output));
        infos
    }

    fn ring(&self, stream_id: &StreamId, direction: ChannelDirection) -> Result<Arc<Ring>> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(*stream_id, direction))
            .cloned()
            .ok_or(IoError::ChannelNotFound {
                stream_id: *stream_id,
                direction,
            })
    }

    fn output_rings(&self) -> Vec<Arc<Ring>> {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        let mut rings: Vec<Arc<Ring>> = channels
            .values()
            .filter(|ring| ring.direction == ChannelDirection::Output)
            .cloned()
            .collect();
        rings.sort_by_key(|ring| ring.stream_id);
        rings
    }

    /// Number of threads currently registered.
    pub fn registered_threads(&self) -> usize {
        self.registered
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn ensure_registered(&self) -> Result<()> {
        let current = std::thread::current();
        if self
            .registered
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&current.id())
        {
            return Ok(());
        }
        Err(IoError::ThreadNotRegistered(
            current
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{:?}", current.id())),
        ))
    }

    fn check_slot_fits(&self, size: usize) -> Result<()> {
        if size > self.config.slot_size {
            return Err(IoError::BufferOverflow {
                size,
                capacity: self.config.slot_size,
            });
        }
        Ok(())
    }

    fn new_buffer(&self, stream_id: StreamId, body: Bytes) -> LocalBuffer {
        LocalBuffer {
            stream_id,
            body,
            state: SlotState::CheckedOut,
            ledger: Arc::clone(&self.ledger),
        }
    }
}

impl IoSubsystem for LocalIo {
    type Channel = LocalChannel;
    type Buffer = LocalBuffer;

    fn register_current_thread(&self) -> Result<()> {
        let current = std::thread::current();
        self.registered
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(current.id());
        debug!(thread = ?current.name(), "registered thread with io region");
        Ok(())
    }

    fn unregister_current_thread(&self) {
        let current = std::thread::current();
        let removed = self
            .registered
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&current.id());
        if removed {
            debug!(thread = ?current.name(), "unregistered thread from io region");
        }
    }

    fn find_channel(
        &self,
        stream_id: &StreamId,
        direction: ChannelDirection,
    ) -> Result<Self::Channel> {
        self.ensure_registered()?;
        self.ring(stream_id, direction)
            .map(|ring| LocalChannel { ring })
    }

    fn deserialize_into_buffer(&self, raw: &[u8]) -> Result<(Self::Buffer, StreamId)> {
        self.ensure_registered()?;
        let (stream_id, body) = split_envelope(raw)?;
        self.check_slot_fits(body.len())?;
        let buffer = self.new_buffer(stream_id, Bytes::copy_from_slice(body));
        self.ledger.record(Entry::Acquired);
        Ok((buffer, stream_id))
    }

    fn submit_buffer(&self, channel: &Self::Channel, buffer: Self::Buffer) -> Result<()> {
        if let Err(err) = self.ensure_registered() {
            buffer.finish(Entry::Released);
            return Err(err);
        }

        let linked = match channel.ring.direction {
            ChannelDirection::Input => self
                .links
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&channel.ring.stream_id)
                .copied(),
            ChannelDirection::Output => None,
        };
        let target = match linked {
            Some(output) => match self.ring(&output, ChannelDirection::Output) {
                Ok(ring) => ring,
                Err(err) => {
                    buffer.finish(Entry::Released);
                    return Err(err);
                }
            },
            None => Arc::clone(&channel.ring),
        };

        match target.push(buffer) {
            Ok(()) => {
                self.ledger.record(Entry::Submitted);
                Ok(())
            }
            Err(buffer) => {
                buffer.finish(Entry::Released);
                Err(IoError::RingFull {
                    stream_id: target.stream_id,
                    capacity: target.capacity,
                })
            }
        }
    }

    fn serialize_buffer(&self, buffer: &Self::Buffer, out: &mut [u8]) -> Result<usize> {
        self.ensure_registered()?;
        let needed = ENVELOPE_HEADER_SIZE + buffer.body.len();
        if needed > out.len() {
            return Err(IoError::ScratchTooSmall {
                needed,
                capacity: out.len(),
            });
        }
        out[..ENVELOPE_HEADER_SIZE].copy_from_slice(buffer.stream_id.as_bytes());
        out[ENVELOPE_HEADER_SIZE..needed].copy_from_slice(&buffer.body);
        Ok(needed)
    }

    fn release_buffer(&self, buffer: Self::Buffer) {
        buffer.finish(Entry::Released);
    }

    fn poll_output_buffers(
        &self,
        max_batch: usize,
        handler: &mut dyn FnMut(&StreamId, Vec<Self::Buffer>),
    ) -> Result<usize> {
        self.ensure_registered()?;
        let mut total = 0usize;
        for ring in self.output_rings() {
            let batch: Vec<LocalBuffer> = {
                let mut slots = ring.slots();
                let take = slots.len().min(max_batch);
                slots
                    .drain(..take)
                    .map(|mut buffer| {
                        buffer.state = SlotState::CheckedOut;
                        buffer
                    })
                    .collect()
            };
            if batch.is_empty() {
                continue;
            }
            for _ in &batch {
                self.ledger.record(Entry::HandedOut);
            }
            total += batch.len();
            handler(&ring.stream_id, batch);
        }
        Ok(total)
    }
}
