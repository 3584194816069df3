use super::BufferFormat;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PlaneLayout {
    /// Single plane, 32 bits per pixel.
    Packed,
    /// Luma plane followed by one interleaved chroma plane.
    SemiPlanar,
    /// Luma plane followed by two separate chroma planes.
    Planar,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Plane {
    pub pitch: u32,
    pub height: u32,
    /// Byte offset of the plane from the start of the frame.
    pub offset: usize,
}

/// Copy geometry of a frame in a given buffer format.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FormatDescriptor {
    format: BufferFormat,
    width: u32,
    height: u32,
    planes: [Plane; 3],
    plane_count: usize,
}

impl FormatDescriptor {
    /// Describe a `width` x `height` frame. `pitch` is the luma pitch in bytes; tightly packed
    /// rows are assumed when it is `None`.
    pub fn new(format: BufferFormat, width: u32, height: u32, pitch: Option<u32>) -> Self {
        let luma_pitch = pitch.unwrap_or_else(|| width_in_bytes(format, width));
        let luma = Plane {
            pitch: luma_pitch,
            height,
            offset: 0,
        };

        let chroma_pitch = chroma_pitch(format, luma_pitch);
        let chroma_height = chroma_height(format, height);
        let luma_size = luma_pitch as usize * height as usize;
        let chroma_size = chroma_pitch as usize * chroma_height as usize;

        let mut planes = [luma, Plane::default(), Plane::default()];
        let plane_count = 1 + num_chroma_planes(format);
        for (i, plane) in planes.iter_mut().enumerate().take(plane_count).skip(1) {
            *plane = Plane {
                pitch: chroma_pitch,
                height: chroma_height,
                offset: luma_size + (i - 1) * chroma_size,
            };
        }

        FormatDescriptor {
            format,
            width,
            height,
            planes,
            plane_count,
        }
    }

    pub fn format(&self) -> BufferFormat {
        self.format
    }

    pub fn layout(&self) -> PlaneLayout {
        match num_chroma_planes(self.format) {
            0 => PlaneLayout::Packed,
            1 => PlaneLayout::SemiPlanar,
            _ => PlaneLayout::Planar,
        }
    }

    pub fn plane_count(&self) -> usize {
        self.plane_count
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes[..self.plane_count]
    }

    pub fn luma_pitch(&self) -> u32 {
        self.planes[0].pitch
    }

    /// Bytes of pixel data in one luma row, excluding padding.
    pub fn width_in_bytes(&self) -> u32 {
        width_in_bytes(self.format, self.width)
    }

    pub fn chroma_offsets(&self) -> impl Iterator<Item = usize> + '_ {
        self.planes().iter().skip(1).map(|plane| plane.offset)
    }

    /// Total bytes spanned by every plane.
    pub fn frame_size(&self) -> usize {
        self.planes()
            .iter()
            .map(|plane| plane.pitch as usize * plane.height as usize)
            .sum()
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

fn width_in_bytes(format: BufferFormat, width: u32) -> u32 {
    match format {
        BufferFormat::Nv12 | BufferFormat::Yv12 | BufferFormat::Iyuv | BufferFormat::Yuv444 => {
            width
        }
        BufferFormat::Yuv420_10Bit | BufferFormat::Yuv444_10Bit => width * 2,
        BufferFormat::Argb
        | BufferFormat::Argb10
        | BufferFormat::Ayuv
        | BufferFormat::Abgr
        | BufferFormat::Abgr10 => width * 4,
    }
}

fn num_chroma_planes(format: BufferFormat) -> usize {
    match format {
        BufferFormat::Nv12 | BufferFormat::Yuv420_10Bit => 1,
        BufferFormat::Yv12
        | BufferFormat::Iyuv
        | BufferFormat::Yuv444
        | BufferFormat::Yuv444_10Bit => 2,
        _ => 0,
    }
}

fn chroma_pitch(format: BufferFormat, luma_pitch: u32) -> u32 {
    match format {
        BufferFormat::Nv12
        | BufferFormat::Yuv420_10Bit
        | BufferFormat::Yuv444
        | BufferFormat::Yuv444_10Bit => luma_pitch,
        BufferFormat::Yv12 | BufferFormat::Iyuv => (luma_pitch + 1) / 2,
        _ => 0,
    }
}

fn chroma_height(format: BufferFormat, luma_height: u32) -> u32 {
    match format {
        BufferFormat::Yv12 | BufferFormat::Iyuv | BufferFormat::Nv12 | BufferFormat::Yuv420_10Bit => {
            (luma_height + 1) / 2
        }
        BufferFormat::Yuv444 | BufferFormat::Yuv444_10Bit => luma_height,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_bgra_is_single_plane() {
        let desc = FormatDescriptor::new(BufferFormat::Argb, 1920, 1080, None);
        assert_eq!(desc.layout(), PlaneLayout::Packed);
        assert_eq!(desc.plane_count(), 1);
        assert_eq!(desc.luma_pitch(), 1920 * 4);
        assert_eq!(desc.chroma_offsets().count(), 0);
        assert_eq!(desc.frame_size(), 1920 * 4 * 1080);
    }

    #[test]
    fn nv12_chroma_follows_luma() {
        let desc = FormatDescriptor::new(BufferFormat::Nv12, 1920, 1080, Some(2048));
        assert_eq!(desc.layout(), PlaneLayout::SemiPlanar);
        assert_eq!(desc.plane_count(), 2);
        assert_eq!(desc.planes()[1].pitch, 2048);
        assert_eq!(desc.planes()[1].height, 540);
        assert_eq!(desc.chroma_offsets().collect::<Vec<_>>(), vec![2048 * 1080]);
        assert_eq!(desc.frame_size(), 2048 * 1080 + 2048 * 540);
        assert_eq!(desc.width_in_bytes(), 1920);
    }

    #[test]
    fn yv12_has_two_half_pitch_chroma_planes() {
        let desc = FormatDescriptor::new(BufferFormat::Yv12, 641, 481, None);
        assert_eq!(desc.layout(), PlaneLayout::Planar);
        assert_eq!(desc.plane_count(), 3);

        let chroma_pitch = (641 + 1) / 2;
        let chroma_height = (481 + 1) / 2;
        assert_eq!(desc.planes()[1].pitch, chroma_pitch);
        assert_eq!(desc.planes()[2].height, chroma_height);

        let offsets: Vec<_> = desc.chroma_offsets().collect();
        assert_eq!(offsets[0], 641 * 481);
        assert_eq!(
            offsets[1],
            641 * 481 + chroma_pitch as usize * chroma_height as usize
        );
    }

    #[test]
    fn yuv444_10bit_uses_full_size_chroma() {
        let desc = FormatDescriptor::new(BufferFormat::Yuv444_10Bit, 1280, 720, None);
        assert_eq!(desc.luma_pitch(), 2560);
        assert_eq!(desc.frame_size(), 2560 * 720 * 3);
    }
}
