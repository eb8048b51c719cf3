// Copyright 2025 the jfa_sdf Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::collections::HashMap;

use jfa_sdf_shaders::cpu::{CpuBinding, CpuTexels, CpuTexture};

use crate::engine::{Engine, EngineStats, Program};
use crate::recording::{
    Command, DrawParams, DrawTarget, Recording, ResourceId, ResourceProxy, ShaderId, TargetProxy,
};
use crate::{Error, Result};

/// Same as the default `max_texture_dimension_2d` of wgpu.
const DEFAULT_MAX_TARGET_SIZE: u32 = 8192;

struct CpuImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

struct CpuTarget {
    width: u32,
    height: u32,
    texels: Vec<[f32; 4]>,
}

/// An [`Engine`] which runs the CPU ports of the shaders, one call per pixel.
///
/// It produces the same results as [`WgpuEngine`](crate::WgpuEngine) up to
/// floating point differences, and needs no adapter.
pub struct CpuEngine {
    programs: Vec<Program>,
    buffers: HashMap<ResourceId, Vec<u8>>,
    images: HashMap<ResourceId, CpuImage>,
    targets: HashMap<ResourceId, CpuTarget>,
    surface: Option<CpuImage>,
    max_target_size: u32,
    stats: EngineStats,
}

impl Default for CpuEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuEngine {
    pub fn new() -> Self {
        Self::with_max_target_size(DEFAULT_MAX_TARGET_SIZE)
    }

    /// Creates an engine which refuses textures larger than `max` on either side.
    pub fn with_max_target_size(max: u32) -> Self {
        Self {
            programs: Vec::new(),
            buffers: HashMap::new(),
            images: HashMap::new(),
            targets: HashMap::new(),
            surface: None,
            max_target_size: max,
            stats: EngineStats::default(),
        }
    }

    fn check_size(&self, width: u32, height: u32) -> Result<()> {
        let max = self.max_target_size;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(Error::Allocation { width, height, max });
        }
        Ok(())
    }

    fn draw(&mut self, params: &DrawParams) -> Result<()> {
        let program = *self
            .programs
            .get(params.shader_id.0)
            .ok_or(Error::UnavailableResource("shader", "draw"))?;
        let (width, height) = match params.target {
            DrawTarget::Target(proxy) => {
                let target = self
                    .targets
                    .get(&proxy.id)
                    .ok_or(Error::UnavailableResource("render target", "draw"))?;
                (target.width, target.height)
            }
            DrawTarget::Surface => self
                .surface
                .as_ref()
                .map(|surface| (surface.width, surface.height))
                .ok_or(Error::UnavailableResource("surface", "draw"))?,
        };
        let bindings = params
            .resources
            .iter()
            .map(|resource| self.binding(resource))
            .collect::<Result<Vec<_>>>()?;
        let shader = program.cpu();
        let mut output = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                output.push(shader([x as f32 + 0.5, y as f32 + 0.5], &bindings));
            }
        }
        drop(bindings);
        match params.target {
            DrawTarget::Target(proxy) => {
                if let Some(target) = self.targets.get_mut(&proxy.id) {
                    target.texels = output;
                }
            }
            DrawTarget::Surface => {
                if let Some(surface) = self.surface.as_mut() {
                    surface.data = output.iter().flatten().map(|c| unorm8(*c)).collect();
                }
            }
        }
        self.stats.draws += 1;
        Ok(())
    }

    fn binding(&self, resource: &ResourceProxy) -> Result<CpuBinding<'_>> {
        Ok(match resource {
            ResourceProxy::Buffer(proxy) => CpuBinding::Uniform(
                self.buffers
                    .get(&proxy.id)
                    .ok_or(Error::UnavailableResource(proxy.name, "draw"))?,
            ),
            ResourceProxy::Image(proxy) => {
                let image = self
                    .images
                    .get(&proxy.id)
                    .ok_or(Error::UnavailableResource("source image", "draw"))?;
                CpuBinding::Texture(CpuTexture {
                    width: image.width,
                    height: image.height,
                    texels: CpuTexels::Rgba8(&image.data),
                })
            }
            ResourceProxy::Target(proxy) => {
                let target = self
                    .targets
                    .get(&proxy.id)
                    .ok_or(Error::UnavailableResource("render target", "draw"))?;
                CpuBinding::Texture(CpuTexture {
                    width: target.width,
                    height: target.height,
                    texels: CpuTexels::Rgba32Float(&target.texels),
                })
            }
        })
    }
}

/// Conversion to `Rgba8Unorm`, as done on store.
fn unorm8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl Engine for CpuEngine {
    async fn add_shader(&mut self, program: Program) -> Result<ShaderId> {
        let id = ShaderId(self.programs.len());
        self.programs.push(program);
        Ok(id)
    }

    fn run_recording(&mut self, recording: &Recording, label: &'static str) -> Result<()> {
        log::debug!(
            "running {label} on the CPU, {} commands",
            recording.commands.len()
        );
        for command in &recording.commands {
            match command {
                Command::AllocTarget(proxy) => {
                    self.check_size(proxy.width, proxy.height)?;
                    let len = proxy.width as usize * proxy.height as usize;
                    self.targets.insert(
                        proxy.id,
                        CpuTarget {
                            width: proxy.width,
                            height: proxy.height,
                            texels: vec![[0.0; 4]; len],
                        },
                    );
                    self.stats.targets_allocated += 1;
                }
                Command::UploadImage(proxy, bytes) => {
                    self.check_size(proxy.width, proxy.height)?;
                    self.images.insert(
                        proxy.id,
                        CpuImage {
                            width: proxy.width,
                            height: proxy.height,
                            data: bytes.clone(),
                        },
                    );
                    self.stats.textures_uploaded += 1;
                }
                Command::UploadField(proxy, data) => {
                    self.check_size(proxy.width, proxy.height)?;
                    self.targets.insert(
                        proxy.id,
                        CpuTarget {
                            width: proxy.width,
                            height: proxy.height,
                            texels: bytemuck::cast_slice(data.as_slice()).to_vec(),
                        },
                    );
                    self.stats.textures_uploaded += 1;
                }
                Command::WriteBuffer(proxy, bytes) => {
                    let buffer = self.buffers.entry(proxy.id).or_insert_with(|| {
                        self.stats.buffers_allocated += 1;
                        vec![0; proxy.size as usize]
                    });
                    buffer[..bytes.len()].copy_from_slice(bytes);
                }
                Command::Draw(params) => self.draw(params)?,
                Command::FreeTarget(proxy) => {
                    if self.targets.remove(&proxy.id).is_some() {
                        self.stats.targets_released += 1;
                    } else {
                        log::warn!("freeing a render target that doesn't exist: {:?}", proxy.id);
                    }
                }
                Command::FreeImage(proxy) => {
                    if self.images.remove(&proxy.id).is_some() {
                        self.stats.textures_released += 1;
                    } else {
                        log::warn!("freeing an image that doesn't exist: {:?}", proxy.id);
                    }
                }
                Command::FreeBuffer(proxy) => {
                    if self.buffers.remove(&proxy.id).is_none() {
                        log::warn!("freeing buffer `{}` that was never written", proxy.name);
                    }
                }
            }
        }
        Ok(())
    }

    async fn read_target(&mut self, target: TargetProxy) -> Result<Vec<f32>> {
        let target = self
            .targets
            .get(&target.id)
            .ok_or(Error::UnavailableResource("render target", "read back"))?;
        Ok(bytemuck::cast_slice(target.texels.as_slice()).to_vec())
    }

    async fn read_surface(&mut self) -> Result<Vec<u8>> {
        self.surface
            .as_ref()
            .map(|surface| surface.data.clone())
            .ok_or(Error::UnavailableResource("surface", "read back"))
    }

    fn resize_surface(&mut self, width: u32, height: u32) -> Result<()> {
        if self.surface_size() == (width, height) {
            return Ok(());
        }
        self.check_size(width, height)?;
        self.surface = Some(CpuImage {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        });
        self.stats.surface_resizes += 1;
        Ok(())
    }

    fn surface_size(&self) -> (u32, u32) {
        self.surface
            .as_ref()
            .map_or((0, 0), |surface| (surface.width, surface.height))
    }

    fn stats(&self) -> EngineStats {
        self.stats
    }
}
