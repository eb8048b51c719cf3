// Copyright 2025 the jfa_sdf Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
pub struct ShaderId(pub usize);

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ResourceId(pub NonZeroU64);

impl ResourceId {
    pub fn next() -> Self {
        static ID_COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(NonZeroU64::MIN.saturating_add(ID_COUNTER.fetch_add(1, Ordering::Relaxed)))
    }
}

/// List of [`Command`]s for an engine to execute in order.
#[derive(Default)]
pub struct Recording {
    pub commands: Vec<Command>,
}

/// Proxy used as a handle to a uniform buffer.
#[derive(Clone, Copy, Debug)]
pub struct BufferProxy {
    pub size: u64,
    pub id: ResourceId,
    pub name: &'static str,
}

/// Proxy used as a handle to an 8-bit RGBA source texture.
#[derive(Clone, Copy, Debug)]
pub struct ImageProxy {
    pub width: u32,
    pub height: u32,
    pub id: ResourceId,
}

/// Proxy used as a handle to a 32-bit float RGBA texture, which passes both
/// render into and sample from.
#[derive(Clone, Copy, Debug)]
pub struct TargetProxy {
    pub width: u32,
    pub height: u32,
    pub id: ResourceId,
}

#[derive(Clone, Copy, Debug)]
pub enum ResourceProxy {
    Buffer(BufferProxy),
    Image(ImageProxy),
    Target(TargetProxy),
}

/// Where a draw writes to.
#[derive(Clone, Copy, Debug)]
pub enum DrawTarget {
    Target(TargetProxy),
    /// The engine's 8-bit presentation surface.
    Surface,
}

#[derive(Debug)]
pub struct DrawParams {
    pub shader_id: ShaderId,
    /// Bound in order, starting at binding 0.
    pub resources: Vec<ResourceProxy>,
    pub target: DrawTarget,
    pub clear_color: [f32; 4],
}

/// Single command inside a [`Recording`] to get executed by an engine.
#[derive(Debug)]
pub enum Command {
    /// Commands a render target to be allocated.
    AllocTarget(TargetProxy),
    /// Commands the data to be uploaded to a new source texture.
    UploadImage(ImageProxy, Vec<u8>),
    /// Commands the data, four floats per texel, to be uploaded to a new float texture.
    UploadField(TargetProxy, Vec<f32>),
    /// Commands the data to be written to a uniform buffer, creating it on first use.
    WriteBuffer(BufferProxy, Vec<u8>),
    /// Commands a full-screen draw, clearing the target first.
    Draw(DrawParams),
    FreeTarget(TargetProxy),
    FreeImage(ImageProxy),
    FreeBuffer(BufferProxy),
}

impl Recording {
    /// Appends a [`Command`] to the back of the [`Recording`].
    pub fn push(&mut self, cmd: Command) {
        self.commands.push(cmd);
    }

    /// Commands a new render target of the given size.
    pub fn alloc_target(&mut self, width: u32, height: u32) -> TargetProxy {
        let proxy = TargetProxy::new(width, height);
        self.push(Command::AllocTarget(proxy));
        proxy
    }

    /// Commands to upload RGBA8 data to a new source texture.
    pub fn upload_image(
        &mut self,
        width: u32,
        height: u32,
        data: impl Into<Vec<u8>>,
    ) -> ImageProxy {
        let data = data.into();
        debug_assert_eq!(data.len(), width as usize * height as usize * 4);
        let proxy = ImageProxy::new(width, height);
        self.push(Command::UploadImage(proxy, data));
        proxy
    }

    /// Commands to upload a field, four floats per texel, to a new float texture.
    pub fn upload_field(
        &mut self,
        width: u32,
        height: u32,
        data: impl Into<Vec<f32>>,
    ) -> TargetProxy {
        let data = data.into();
        debug_assert_eq!(data.len(), width as usize * height as usize * 4);
        let proxy = TargetProxy::new(width, height);
        self.push(Command::UploadField(proxy, data));
        proxy
    }

    pub fn write_buffer(&mut self, buf: BufferProxy, data: impl Into<Vec<u8>>) {
        self.push(Command::WriteBuffer(buf, data.into()));
    }

    /// Issue a draw call
    pub fn draw(&mut self, params: DrawParams) {
        self.push(Command::Draw(params));
    }

    pub fn free_target(&mut self, target: TargetProxy) {
        self.push(Command::FreeTarget(target));
    }

    pub fn free_image(&mut self, image: ImageProxy) {
        self.push(Command::FreeImage(image));
    }

    pub fn free_buffer(&mut self, buf: BufferProxy) {
        self.push(Command::FreeBuffer(buf));
    }

    /// Commands to free the given resource.
    pub fn free_resource(&mut self, resource: ResourceProxy) {
        match resource {
            ResourceProxy::Buffer(buf) => self.free_buffer(buf),
            ResourceProxy::Image(image) => self.free_image(image),
            ResourceProxy::Target(target) => self.free_target(target),
        }
    }

    /// Number of draws in this recording.
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|cmd| matches!(cmd, Command::Draw(_)))
            .count()
    }
}

impl BufferProxy {
    pub fn new(size: u64, name: &'static str) -> Self {
        let id = ResourceId::next();
        debug_assert!(size > 0);
        Self { size, id, name }
    }
}

impl ImageProxy {
    pub fn new(width: u32, height: u32) -> Self {
        let id = ResourceId::next();
        Self { width, height, id }
    }
}

impl TargetProxy {
    pub fn new(width: u32, height: u32) -> Self {
        let id = ResourceId::next();
        Self { width, height, id }
    }
}

impl ResourceProxy {
    pub fn id(&self) -> ResourceId {
        match self {
            Self::Buffer(proxy) => proxy.id,
            Self::Image(proxy) => proxy.id,
            Self::Target(proxy) => proxy.id,
        }
    }
}

impl From<BufferProxy> for ResourceProxy {
    fn from(value: BufferProxy) -> Self {
        Self::Buffer(value)
    }
}

impl From<ImageProxy> for ResourceProxy {
    fn from(value: ImageProxy) -> Self {
        Self::Image(value)
    }
}

impl From<TargetProxy> for ResourceProxy {
    fn from(value: TargetProxy) -> Self {
        Self::Target(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{Recording, ResourceId};

    #[test]
    fn ids_are_unique() {
        let a = ResourceId::next();
        let b = ResourceId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn frees_follow_allocations() {
        let mut recording = Recording::default();
        let target = recording.alloc_target(4, 4);
        recording.free_resource(target.into());
        assert_eq!(recording.commands.len(), 2);
        assert_eq!(recording.draw_count(), 0);
    }
}
