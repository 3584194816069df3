use nvenc::Packet;
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

/// Destination of the encoded elementary stream.
pub trait PacketSink {
    fn write_packet(&mut self, packet: &Packet) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

/// Writes packets back to back into any `Write`. The output is a raw Annex B stream.
pub struct StreamSink<W: Write> {
    writer: W,
    bytes_written: u64,
}

pub type FileSink = StreamSink<BufWriter<File>>;

impl FileSink {
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::create(path.as_ref())?;
        tracing::info!(path = %path.as_ref().display(), "Writing bitstream");
        Ok(StreamSink::new(BufWriter::new(file)))
    }
}

impl<W: Write> StreamSink<W> {
    pub fn new(writer: W) -> Self {
        StreamSink {
            writer,
            bytes_written: 0,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> PacketSink for StreamSink<W> {
    fn write_packet(&mut self, packet: &Packet) -> io::Result<()> {
        self.writer.write_all(&packet.data)?;
        self.bytes_written += packet.data.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl<T: PacketSink + ?Sized> PacketSink for &mut T {
    fn write_packet(&mut self, packet: &Packet) -> io::Result<()> {
        (**self).write_packet(packet)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(bytes: &[u8], frame_index: u64) -> Packet {
        Packet {
            data: bytes.to_vec(),
            frame_index,
            timestamp: frame_index,
            keyframe: frame_index == 0,
        }
    }

    #[test]
    fn packets_are_concatenated_in_order() {
        let mut sink = StreamSink::new(Vec::new());
        sink.write_packet(&packet(&[0, 0, 0, 1, 0x65], 0)).unwrap();
        sink.write_packet(&packet(&[0, 0, 0, 1, 0x41], 1)).unwrap();
        sink.flush().unwrap();

        assert_eq!(sink.bytes_written(), 10);
        assert_eq!(
            sink.into_inner(),
            vec![0, 0, 0, 1, 0x65, 0, 0, 0, 1, 0x41]
        );
    }
}
