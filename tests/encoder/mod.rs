use super::device::{encode_failure, surface_of, Shared};
use nvenc::{
    BitstreamBuffer, EncodeApi, InputResource, LockedBitstream, MappedInput, NvEncError,
    NvEncStatus, PictureParams, RegisteredInput, Result, SessionConfig,
};
use std::{collections::HashMap, os::raw::c_void};

struct Output {
    data: Vec<u8>,
    frame_index: u64,
    timestamp: u64,
    surface: usize,
}

/// Encoder that turns every picture into one packet: a start code and the frame index.
///
/// The first `Counters::hold_first` pictures are buffered until a later one is encoded.
pub struct MockEncoder {
    counters: Shared,
    next_handle: usize,
    registered: HashMap<RegisteredInput, usize>,
    mapped: HashMap<MappedInput, usize>,
    outputs: HashMap<BitstreamBuffer, Output>,
}

impl MockEncoder {
    pub fn new(counters: Shared) -> Self {
        MockEncoder {
            counters,
            next_handle: 0x1000,
            registered: HashMap::new(),
            mapped: HashMap::new(),
            outputs: HashMap::new(),
        }
    }

    fn handle(&mut self) -> *mut c_void {
        self.next_handle += 0x10;
        self.next_handle as *mut c_void
    }
}

unsafe impl EncodeApi for MockEncoder {
    fn initialize(&mut self, _config: &SessionConfig) -> Result<()> {
        Ok(())
    }

    fn create_bitstream_buffer(&mut self) -> Result<BitstreamBuffer> {
        let handle = self.handle();
        BitstreamBuffer::new(handle).ok_or(NvEncError::default())
    }

    fn destroy_bitstream_buffer(&mut self, _buffer: BitstreamBuffer) -> Result<()> {
        Ok(())
    }

    fn register_resource(&mut self, input: &InputResource) -> Result<RegisteredInput> {
        self.counters.borrow_mut().input_registrations += 1;
        let handle = self.handle();
        let registered = RegisteredInput::new(handle).ok_or(NvEncError::default())?;
        self.registered.insert(registered, surface_of(input.memory));
        Ok(registered)
    }

    fn unregister_resource(&mut self, registered: RegisteredInput) -> Result<()> {
        self.registered.remove(&registered);
        Ok(())
    }

    fn map_input_resource(&mut self, registered: RegisteredInput) -> Result<MappedInput> {
        let surface = *self
            .registered
            .get(&registered)
            .ok_or(NvEncError::Status(NvEncStatus::ResourceNotRegistered))?;
        let handle = self.handle();
        let mapped = MappedInput::new(handle).ok_or(NvEncError::default())?;
        self.mapped.insert(mapped, surface);
        Ok(mapped)
    }

    fn unmap_input_resource(&mut self, mapped: MappedInput) -> Result<()> {
        self.mapped.remove(&mapped);
        Ok(())
    }

    fn encode_picture(&mut self, params: &PictureParams) -> Result<()> {
        let encoded = {
            let mut counters = self.counters.borrow_mut();
            match counters.fail_encode_after {
                Some(0) => {
                    counters.fail_encode_after = None;
                    return Err(encode_failure());
                }
                Some(left) => counters.fail_encode_after = Some(left - 1),
                None => (),
            }
            counters.encoded += 1;
            counters.encoded
        };

        let surface = *self
            .mapped
            .get(&params.input)
            .ok_or(NvEncError::Status(NvEncStatus::ResourceNotMapped))?;
        self.outputs.insert(
            params.output,
            Output {
                data: vec![0, 0, 0, 1, params.frame_index as u8],
                frame_index: params.frame_index,
                timestamp: params.timestamp,
                surface,
            },
        );

        if encoded <= self.counters.borrow().hold_first {
            Err(NvEncError::Status(NvEncStatus::NeedMoreInput))
        } else {
            Ok(())
        }
    }

    fn end_of_stream(&mut self) -> Result<()> {
        self.counters.borrow_mut().end_of_stream += 1;
        Ok(())
    }

    fn lock_bitstream(&mut self, buffer: BitstreamBuffer) -> Result<LockedBitstream> {
        let output = self
            .outputs
            .get(&buffer)
            .ok_or(NvEncError::Status(NvEncStatus::InvalidParam))?;

        let mut counters = self.counters.borrow_mut();
        if counters.unreadable == Some(output.frame_index) {
            return Err(NvEncError::Status(NvEncStatus::LockBusy));
        }
        if !counters.live.contains(&output.surface) {
            counters.locked_while_unmapped += 1;
        }

        Ok(LockedBitstream {
            data: output.data.as_ptr(),
            len: output.data.len(),
            frame_index: output.frame_index,
            timestamp: output.timestamp,
            keyframe: output.frame_index == 0,
        })
    }

    fn unlock_bitstream(&mut self, buffer: BitstreamBuffer) -> Result<()> {
        self.outputs.remove(&buffer);
        Ok(())
    }

    fn sequence_params(&mut self) -> Result<Vec<u8>> {
        Ok(vec![0, 0, 0, 1, 0x67])
    }
}
