#[cfg(windows)]
mod windows;

#[cfg(windows)]
pub use self::windows::CudaD3D11Interop;

use crate::error::InteropError;
use nvenc::DeviceMemory;
use std::collections::HashMap;
use video_source::{Surface, SurfaceId};

/// How a mapped surface is exposed to the compute context.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum ViewKind {
    /// Opaque array handle. Works for every texture.
    #[default]
    Array,
    /// Linear pointer with pitch. Only buffers can be viewed this way.
    Linear,
}

/// Compute API calls needed to share a graphics surface.
pub trait GraphicsInterop {
    type Surface: Surface;
    type Resource;

    fn register(&mut self, surface: &Self::Surface) -> Result<Self::Resource, InteropError>;

    /// Make the resource accessible to the compute context. Waits for pending graphics work.
    fn map(&mut self, resource: &Self::Resource) -> Result<(), InteropError>;

    fn resolve(
        &mut self,
        resource: &Self::Resource,
        kind: ViewKind,
    ) -> Result<DeviceMemory, InteropError>;

    fn unmap(&mut self, resource: &Self::Resource) -> Result<(), InteropError>;

    fn unregister(&mut self, resource: Self::Resource) -> Result<(), InteropError>;
}

struct RegisteredResource<R> {
    resource: R,
    mapped: bool,
}

/// Zero-copy bridge from graphics surfaces to compute memory.
///
/// Each surface is registered on first use and stays registered until `forget`,
/// `unregister_all` or drop.
pub struct InteropBridge<I: GraphicsInterop> {
    interop: I,
    view_kind: ViewKind,
    registered: HashMap<SurfaceId, RegisteredResource<I::Resource>>,
    registrations: u64,
}

impl<I: GraphicsInterop> InteropBridge<I> {
    pub fn new(interop: I, view_kind: ViewKind) -> Self {
        InteropBridge {
            interop,
            view_kind,
            registered: HashMap::new(),
            registrations: 0,
        }
    }

    /// Map `surface` and return a view of its memory. The view must be released (or dropped)
    /// before the surface can be acquired again.
    pub fn acquire_view(&mut self, surface: &I::Surface) -> Result<MappedView<'_, I>, InteropError> {
        let id = surface.id();
        let newly_registered = !self.registered.contains_key(&id);

        if newly_registered {
            let resource = self.interop.register(surface)?;
            tracing::debug!(surface = id.0, "Surface registered with compute context");
            self.registered.insert(
                id,
                RegisteredResource {
                    resource,
                    mapped: false,
                },
            );
            self.registrations += 1;
        }

        let Some(entry) = self.registered.get_mut(&id) else {
            return Err(InteropError::Registration("registration missing".to_owned()));
        };
        if entry.mapped {
            return Err(InteropError::AlreadyMapped);
        }

        if let Err(err) = self.interop.map(&entry.resource) {
            if newly_registered {
                self.forget(id);
            }
            return Err(err);
        }
        entry.mapped = true;

        let memory = match self.interop.resolve(&entry.resource, self.view_kind) {
            Ok(memory) => memory,
            Err(err) => {
                if let Err(unmap_err) = self.interop.unmap(&entry.resource) {
                    tracing::warn!(%unmap_err, "Unmapping after a failed resolve failed");
                }
                entry.mapped = false;
                if newly_registered {
                    self.forget(id);
                }
                return Err(err);
            }
        };

        Ok(MappedView {
            bridge: self,
            id,
            memory,
            released: false,
        })
    }

    /// Unregister one surface. Does nothing if it was never registered.
    pub fn forget(&mut self, id: SurfaceId) {
        if let Some(entry) = self.registered.remove(&id) {
            self.unregister_entry(id, entry);
        }
    }

    /// Unregister every surface. Safe to call more than once.
    pub fn unregister_all(&mut self) {
        let entries: Vec<_> = self.registered.drain().collect();
        for (id, entry) in entries {
            self.unregister_entry(id, entry);
        }
    }

    pub fn is_registered(&self, id: SurfaceId) -> bool {
        self.registered.contains_key(&id)
    }

    pub fn is_mapped(&self, id: SurfaceId) -> bool {
        self.registered.get(&id).is_some_and(|entry| entry.mapped)
    }

    pub fn registered_count(&self) -> usize {
        self.registered.len()
    }

    /// Total registrations performed, including ones since unregistered.
    pub fn registrations(&self) -> u64 {
        self.registrations
    }

    pub fn interop(&self) -> &I {
        &self.interop
    }

    /// Unmap a surface left mapped by `MappedView::hold`. Does nothing if it is not mapped.
    pub fn release(&mut self, id: SurfaceId) -> Result<(), InteropError> {
        match self.registered.get_mut(&id) {
            Some(entry) if entry.mapped => {
                entry.mapped = false;
                self.interop.unmap(&entry.resource)
            }
            _ => Ok(()),
        }
    }

    fn unregister_entry(&mut self, id: SurfaceId, entry: RegisteredResource<I::Resource>) {
        if entry.mapped {
            if let Err(err) = self.interop.unmap(&entry.resource) {
                tracing::warn!(surface = id.0, %err, "Unmap before unregistering failed");
            }
        }
        match self.interop.unregister(entry.resource) {
            Ok(()) => tracing::debug!(surface = id.0, "Surface unregistered"),
            Err(err) => tracing::warn!(surface = id.0, %err, "Unregistering surface failed"),
        }
    }
}

impl<I: GraphicsInterop> Drop for InteropBridge<I> {
    fn drop(&mut self) {
        self.unregister_all();
    }
}

/// Compute-addressable memory of a mapped surface. Valid until released.
pub struct MappedView<'a, I: GraphicsInterop> {
    bridge: &'a mut InteropBridge<I>,
    id: SurfaceId,
    memory: DeviceMemory,
    released: bool,
}

impl<'a, I: GraphicsInterop> MappedView<'a, I> {
    pub fn memory(&self) -> DeviceMemory {
        self.memory
    }

    pub fn surface_id(&self) -> SurfaceId {
        self.id
    }

    /// Unmap the surface so the graphics queue can use it again.
    pub fn release(mut self) -> Result<(), InteropError> {
        self.released = true;
        self.bridge.release(self.id)
    }

    /// Keep the surface mapped after the view goes away, for readers that outlive the borrow.
    /// It stays mapped until `InteropBridge::release`, `forget` or `unregister_all`.
    pub fn hold(mut self) -> DeviceMemory {
        self.released = true;
        self.memory
    }
}

impl<'a, I: GraphicsInterop> Drop for MappedView<'a, I> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.bridge.release(self.id) {
            tracing::warn!(surface = self.id.0, %err, "Unmapping dropped view failed");
        }
    }
}
