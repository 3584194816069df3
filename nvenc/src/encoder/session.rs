use super::{
    BitstreamBuffer, DeviceFrame, EncodeApi, InputResource, MappedInput, Packet, PictureParams,
    RegisteredInput,
};
use crate::{FormatDescriptor, NvEncError, Result, SessionConfig};
use std::collections::VecDeque;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Open,
    Flushing,
    Closed,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Every picture retrievable after this submission, in encode order. May be empty.
    Packets(Vec<Packet>),
    /// The encoder is holding the picture until it receives more input.
    NeedsMoreInput,
}

/// A submitted picture whose output has not been retrieved yet. Its input stays mapped until
/// then.
#[derive(Debug)]
struct PendingPicture {
    slot: usize,
    mapped: MappedInput,
}

/// Input registered for one slot. Kept across pictures and replaced only if the slot's memory
/// changes.
#[derive(Debug, Copy, Clone)]
struct SlotRegistration {
    resource: InputResource,
    registered: RegisteredInput,
}

/// Owns an encoder handle together with its bitstream pool and input-frame pool.
///
/// Slot `i` pairs bitstream buffer `i` with input frame `i`. A slot is free when no unretrieved
/// picture uses it. Dropping an open session flushes it before `E` is destroyed.
pub struct EncoderSession<E: EncodeApi, F> {
    api: E,
    state: SessionState,
    config: Option<SessionConfig>,
    bitstream_buffers: Vec<BitstreamBuffer>,
    input_frames: Vec<F>,
    registrations: Vec<Option<SlotRegistration>>,
    free_slots: VecDeque<usize>,
    pending: VecDeque<PendingPicture>,
    /// Packets read from the encoder but not yet handed out.
    retrieved: Vec<Packet>,
    /// Slots whose input the encoder no longer uses, reported by `take_released_inputs`.
    released: Vec<usize>,
    frame_index: u64,
}

impl<E: EncodeApi, F> EncoderSession<E, F> {
    pub fn new(api: E) -> Self {
        EncoderSession {
            api,
            state: SessionState::Uninitialized,
            config: None,
            bitstream_buffers: Vec::new(),
            input_frames: Vec::new(),
            registrations: Vec::new(),
            free_slots: VecDeque::new(),
            pending: VecDeque::new(),
            retrieved: Vec::new(),
            released: Vec::new(),
            frame_index: 0,
        }
    }

    /// Initialize the encoder and allocate the bitstream pool. `input_frames` must hold exactly
    /// `config.pool_capacity()` frames.
    pub fn open(&mut self, config: SessionConfig, input_frames: Vec<F>) -> Result<()> {
        if self.state != SessionState::Uninitialized {
            return Err(NvEncError::SessionAlreadyOpen);
        }

        let capacity = config.pool_capacity();
        if input_frames.len() != capacity {
            return Err(NvEncError::InputPoolMismatch {
                expected: capacity,
                actual: input_frames.len(),
            });
        }

        self.api.initialize(&config)?;

        let mut buffers = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            match self.api.create_bitstream_buffer() {
                Ok(buffer) => buffers.push(buffer),
                Err(err) => {
                    for buffer in buffers {
                        let _ = self.api.destroy_bitstream_buffer(buffer);
                    }
                    return Err(err);
                }
            }
        }

        tracing::info!(
            width = config.width,
            height = config.height,
            format = ?config.buffer_format,
            codec = ?config.codec,
            capacity,
            "Encoder session opened"
        );

        self.bitstream_buffers = buffers;
        self.input_frames = input_frames;
        self.registrations = vec![None; capacity];
        self.free_slots = (0..capacity).collect();
        self.config = Some(config);
        self.state = SessionState::Open;
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> Option<&SessionConfig> {
        self.config.as_ref()
    }

    pub fn api(&self) -> &E {
        &self.api
    }

    /// Number of pictures submitted so far.
    pub fn frames_submitted(&self) -> u64 {
        self.frame_index
    }

    pub fn pending_pictures(&self) -> usize {
        self.pending.len()
    }

    /// The input frame the next `submit_frame` will use. `None` if the session is not open or
    /// every slot is held by an unretrieved picture.
    pub fn next_input_frame(&self) -> Option<&F> {
        if self.state != SessionState::Open {
            return None;
        }
        self.free_slots
            .front()
            .and_then(|&slot| self.input_frames.get(slot))
    }

    /// Input frames the encoder stopped reading since the last call, either because their
    /// picture was retrieved or because its submission failed.
    pub fn take_released_inputs(&mut self) -> Vec<&F> {
        let slots = std::mem::take(&mut self.released);
        slots
            .into_iter()
            .filter_map(|slot| self.input_frames.get(slot))
            .collect()
    }

    /// Packets retrieved before a `submit_frame` or `flush` error. They are also handed out at
    /// the front of the next successful call.
    pub fn take_retrieved(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.retrieved)
    }

    /// Encode `frame` in the next free slot and retrieve every packet that became available.
    ///
    /// On failure the slot is released so the pool never leaks. Packets retrieved before a
    /// retrieval error stay available through `take_retrieved`.
    pub fn submit_frame(&mut self, frame: &DeviceFrame, timestamp: u64) -> Result<SubmitOutcome> {
        let (width, height, format) = match (&self.state, &self.config) {
            (SessionState::Open, Some(config)) => {
                (config.width, config.height, config.buffer_format)
            }
            _ => return Err(NvEncError::SessionNotOpen),
        };
        if frame.width != width || frame.height != height || frame.format != format {
            return Err(NvEncError::FrameMismatch);
        }

        let slot = match self.free_slots.pop_front() {
            Some(slot) => slot,
            None => {
                debug_assert!(false, "bitstream buffer pool exhausted");
                return Err(NvEncError::BitstreamPoolExhausted);
            }
        };

        let descriptor = FormatDescriptor::new(format, width, height, frame.memory.pitch());
        let resource = InputResource {
            memory: frame.memory,
            width,
            height,
            pitch: descriptor.luma_pitch(),
            format,
        };

        let registered = match self.registration(slot, resource) {
            Ok(registered) => registered,
            Err(err) => {
                self.abandon_slot(slot);
                return Err(err);
            }
        };

        let mapped = match self.api.map_input_resource(registered) {
            Ok(mapped) => mapped,
            Err(err) => {
                self.abandon_slot(slot);
                return Err(err);
            }
        };

        let frame_index = self.frame_index;
        self.frame_index += 1;

        let params = PictureParams {
            input: mapped,
            output: self.bitstream_buffers[slot],
            width,
            height,
            pitch: resource.pitch,
            format,
            frame_index,
            timestamp,
        };

        match self.api.encode_picture(&params) {
            Ok(()) => {
                self.pending.push_back(PendingPicture { slot, mapped });
                self.drain_pending()?;
                Ok(SubmitOutcome::Packets(self.take_retrieved()))
            }
            Err(err) if err.is_need_more_input() => {
                tracing::trace!(frame_index, "Encoder needs more input");
                self.pending.push_back(PendingPicture { slot, mapped });
                Ok(SubmitOutcome::NeedsMoreInput)
            }
            Err(err) => {
                self.unmap_input(mapped);
                self.abandon_slot(slot);
                Err(err)
            }
        }
    }

    /// Signal end of stream, drain every buffered picture and release the bitstream pool.
    ///
    /// A no-op for sessions that were never opened or are already closed. A picture that cannot
    /// be read does not stop the ones after it from being drained.
    pub fn flush(&mut self) -> Result<Vec<Packet>> {
        match self.state {
            SessionState::Uninitialized | SessionState::Closed => return Ok(self.take_retrieved()),
            SessionState::Open | SessionState::Flushing => {}
        }
        self.state = SessionState::Flushing;

        let mut result = self.api.end_of_stream();
        if result.is_ok() {
            while !self.pending.is_empty() {
                if let Err(err) = self.drain_pending() {
                    if result.is_ok() {
                        result = Err(err);
                    }
                }
            }
        }

        // Anything still pending could not be retrieved but its input must be released anyway
        while let Some(picture) = self.pending.pop_front() {
            self.unmap_input(picture.mapped);
        }
        for registration in std::mem::take(&mut self.registrations).into_iter().flatten() {
            self.unregister_input(registration.registered);
        }
        for buffer in std::mem::take(&mut self.bitstream_buffers) {
            if let Err(err) = self.api.destroy_bitstream_buffer(buffer) {
                tracing::warn!(%err, "Failed to destroy bitstream buffer");
            }
        }
        self.free_slots.clear();
        self.released.clear();
        self.input_frames.clear();
        self.state = SessionState::Closed;

        tracing::info!(
            frames = self.frame_index,
            flushed = self.retrieved.len(),
            "Encoder session closed"
        );
        result.map(|()| self.take_retrieved())
    }

    /// Codec headers of the open session.
    pub fn sequence_params(&mut self) -> Result<Vec<u8>> {
        if self.state != SessionState::Open {
            return Err(NvEncError::SessionNotOpen);
        }
        self.api.sequence_params()
    }

    /// Retrieve pending pictures in submission order into `self.retrieved`. Stops at the first
    /// lock failure, leaving the pictures after it pending.
    fn drain_pending(&mut self) -> Result<()> {
        while let Some(picture) = self.pending.pop_front() {
            let packet = self.retrieve(picture.slot);
            // The input can only be unmapped after its output has been read
            self.unmap_input(picture.mapped);
            self.free_slots.push_back(picture.slot);
            self.released.push(picture.slot);
            self.retrieved.push(packet?);
        }
        Ok(())
    }

    fn retrieve(&mut self, slot: usize) -> Result<Packet> {
        let buffer = self.bitstream_buffers[slot];
        let locked = self.api.lock_bitstream(buffer)?;

        let data = if locked.data.is_null() || locked.len == 0 {
            Vec::new()
        } else {
            // SAFETY: `EncodeApi` guarantees the locked region is valid until the unlock below
            unsafe { std::slice::from_raw_parts(locked.data, locked.len) }.to_vec()
        };
        self.api.unlock_bitstream(buffer)?;

        Ok(Packet {
            data,
            frame_index: locked.frame_index,
            timestamp: locked.timestamp,
            keyframe: locked.keyframe,
        })
    }

    /// The registration of `slot` for `resource`, registering on first use.
    fn registration(&mut self, slot: usize, resource: InputResource) -> Result<RegisteredInput> {
        let current = self.registrations[slot];
        match current {
            Some(existing) if existing.resource == resource => return Ok(existing.registered),
            Some(stale) => {
                self.registrations[slot] = None;
                self.unregister_input(stale.registered);
            }
            None => (),
        }

        let registered = self.api.register_resource(&resource)?;
        tracing::debug!(slot, "Encoder input registered");
        self.registrations[slot] = Some(SlotRegistration {
            resource,
            registered,
        });
        Ok(registered)
    }

    /// Return a slot whose picture never reached the encoder. It is handed out again first.
    fn abandon_slot(&mut self, slot: usize) {
        self.free_slots.push_front(slot);
        self.released.push(slot);
    }

    fn unmap_input(&mut self, mapped: MappedInput) {
        if let Err(err) = self.api.unmap_input_resource(mapped) {
            tracing::warn!(%err, "Failed to unmap encoder input");
        }
    }

    fn unregister_input(&mut self, registered: RegisteredInput) {
        if let Err(err) = self.api.unregister_resource(registered) {
            tracing::warn!(%err, "Failed to unregister encoder input");
        }
    }
}

impl<E: EncodeApi, F> Drop for EncoderSession<E, F> {
    fn drop(&mut self) {
        match self.flush() {
            Ok(packets) if !packets.is_empty() => {
                tracing::warn!(
                    count = packets.len(),
                    "Discarding packets of an encoder session that was not flushed"
                );
            }
            Ok(_) => (),
            Err(err) => tracing::error!(%err, "Flushing the encoder session on drop failed"),
        }
    }
}
