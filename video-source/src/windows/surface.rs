use crate::{Surface, SurfaceDesc, SurfaceId};
use windows::{core::Interface, Win32::Graphics::Direct3D11::ID3D11Texture2D};

impl Surface for ID3D11Texture2D {
    fn id(&self) -> SurfaceId {
        SurfaceId(self.as_raw() as usize)
    }

    fn desc(&self) -> SurfaceDesc {
        let mut desc = Default::default();
        unsafe { self.GetDesc(&mut desc) };
        SurfaceDesc {
            width: desc.Width,
            height: desc.Height,
            format: (desc.Format.0 as u32).into(),
        }
    }
}
