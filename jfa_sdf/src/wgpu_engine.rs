// Copyright 2025 the jfa_sdf Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use jfa_sdf_shaders::{BindType, FRAGMENT_MAIN, VERTEX_MAIN};
use wgpu::util::DeviceExt;
use wgpu::{
    BindGroupLayout, Buffer, BufferUsages, CommandEncoder, CommandEncoderDescriptor, Device,
    PipelineCompilationOptions, Queue, RenderPipeline, Texture, TextureFormat, TextureUsages,
    TextureView,
};

use crate::engine::{Engine, EngineStats, Program};
use crate::recording::{
    Command, DrawParams, DrawTarget, Recording, ResourceId, ResourceProxy, ShaderId, TargetProxy,
};
use crate::{Error, Result};

const TARGET_FORMAT: TextureFormat = TextureFormat::Rgba32Float;
const SURFACE_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;
const SOURCE_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

/// Two triangles covering clip space, as (position, uv) with uv (0, 0) at the top left.
const QUAD: [[f32; 4]; 6] = [
    [-1.0, -1.0, 0.0, 1.0],
    [1.0, -1.0, 1.0, 1.0],
    [1.0, 1.0, 1.0, 0.0],
    [-1.0, -1.0, 0.0, 1.0],
    [1.0, 1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0, 0.0],
];

struct WgpuShader {
    label: &'static str,
    /// Renders into float targets.
    target_pipeline: RenderPipeline,
    /// Renders into the surface.
    surface_pipeline: RenderPipeline,
    bind_group_layout: BindGroupLayout,
}

struct GpuTexture {
    texture: Texture,
    view: TextureView,
}

#[derive(Default)]
struct BindMap {
    buf_map: HashMap<ResourceId, BindMapBuffer>,
    /// Source images and render targets alike.
    image_map: HashMap<ResourceId, GpuTexture>,
}

struct BindMapBuffer {
    buffer: Buffer,
    label: &'static str,
}

#[derive(Hash, PartialEq, Eq)]
struct BufferProperties {
    size: u64,
    usages: BufferUsages,
    name: &'static str,
}

#[derive(Default)]
struct ResourcePool {
    bufs: HashMap<BufferProperties, Vec<Buffer>>,
}

/// An [`Engine`] running on a wgpu device.
pub struct WgpuEngine {
    device: Device,
    queue: Queue,
    quad: Buffer,
    shaders: Vec<WgpuShader>,
    pool: ResourcePool,
    bind_map: BindMap,
    surface: Option<GpuTexture>,
    stats: EngineStats,
}

impl WgpuEngine {
    pub fn new(device: &Device, queue: &Queue) -> Self {
        let quad = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("jfa_sdf.quad"),
            contents: bytemuck::cast_slice(&QUAD),
            usage: BufferUsages::VERTEX,
        });
        Self {
            device: device.clone(),
            queue: queue.clone(),
            quad,
            shaders: Vec::new(),
            pool: ResourcePool::default(),
            bind_map: BindMap::default(),
            surface: None,
            stats: EngineStats::default(),
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    fn max_texture_size(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    fn check_size(&self, width: u32, height: u32) -> Result<()> {
        let max = self.max_texture_size();
        if width == 0 || height == 0 || width > max || height > max {
            return Err(Error::Allocation { width, height, max });
        }
        Ok(())
    }

    fn create_texture(
        &self,
        width: u32,
        height: u32,
        format: TextureFormat,
        usage: TextureUsages,
    ) -> GpuTexture {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: None,
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            usage,
            format,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        GpuTexture { texture, view }
    }

    fn upload(&self, proxy_size: (u32, u32), format: TextureFormat, bytes: &[u8]) -> GpuTexture {
        let (width, height) = proxy_size;
        let mut usage = TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST;
        if format == TARGET_FORMAT {
            usage |= TextureUsages::RENDER_ATTACHMENT | TextureUsages::COPY_SRC;
        }
        let gpu = self.create_texture(width, height, format, usage);
        let block_size = format.block_copy_size(None).unwrap_or(4);
        self.queue.write_texture(
            gpu.texture.as_image_copy(),
            bytes,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * block_size),
                rows_per_image: None,
            },
            gpu.texture.size(),
        );
        gpu
    }

    fn create_bind_group_layout_entries(
        bindings: impl Iterator<Item = BindType>,
    ) -> Vec<wgpu::BindGroupLayoutEntry> {
        bindings
            .enumerate()
            .map(|(i, bind_type)| wgpu::BindGroupLayoutEntry {
                binding: i as u32,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: match bind_type {
                    BindType::Uniform => wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    BindType::Texture => wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                },
                count: None,
            })
            .collect()
    }

    fn create_render_pipeline(
        &self,
        label: &'static str,
        module: &wgpu::ShaderModule,
        layout: &wgpu::PipelineLayout,
        format: TextureFormat,
    ) -> RenderPipeline {
        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module,
                    entry_point: Some(VERTEX_MAIN),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: size_of::<[f32; 4]>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2],
                    }],
                    compilation_options: PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module,
                    entry_point: Some(FRAGMENT_MAIN),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
    }

    fn encode_draw(&self, encoder: &mut CommandEncoder, params: &DrawParams) -> Result<()> {
        let shader = self
            .shaders
            .get(params.shader_id.0)
            .ok_or(Error::UnavailableResource("shader", "draw"))?;
        let entries = params
            .resources
            .iter()
            .enumerate()
            .map(|(i, resource)| {
                let resource = match resource {
                    ResourceProxy::Buffer(proxy) => self
                        .bind_map
                        .buf_map
                        .get(&proxy.id)
                        .ok_or(Error::UnavailableResource(proxy.name, "draw"))?
                        .buffer
                        .as_entire_binding(),
                    ResourceProxy::Image(_) | ResourceProxy::Target(_) => {
                        let texture = self
                            .bind_map
                            .image_map
                            .get(&resource.id())
                            .ok_or(Error::UnavailableResource("texture", "draw"))?;
                        wgpu::BindingResource::TextureView(&texture.view)
                    }
                };
                Ok(wgpu::BindGroupEntry {
                    binding: i as u32,
                    resource,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(shader.label),
            layout: &shader.bind_group_layout,
            entries: &entries,
        });
        let (view, pipeline) = match params.target {
            DrawTarget::Target(proxy) => {
                let target = self
                    .bind_map
                    .image_map
                    .get(&proxy.id)
                    .ok_or(Error::UnavailableResource("render target", "draw"))?;
                (&target.view, &shader.target_pipeline)
            }
            DrawTarget::Surface => {
                let surface = self
                    .surface
                    .as_ref()
                    .ok_or(Error::UnavailableResource("surface", "draw"))?;
                (&surface.view, &shader.surface_pipeline)
            }
        };
        let [r, g, b, a] = params.clear_color.map(f64::from);
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(shader.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, &bind_group, &[]);
        rpass.set_vertex_buffer(0, self.quad.slice(..));
        rpass.draw(0..QUAD.len() as u32, 0..1);
        Ok(())
    }

    /// Copies a whole texture into a mappable buffer and waits for it.
    async fn read_texture(&self, texture: &Texture) -> Result<Vec<u8>> {
        let block_size = texture.format().block_copy_size(None).unwrap_or(4);
        let row_bytes = texture.width() * block_size;
        let padded_row_bytes = row_bytes.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("jfa_sdf.read_back"),
            size: u64::from(padded_row_bytes) * u64::from(texture.height()),
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("jfa_sdf.read_back"),
            });
        encoder.copy_texture_to_buffer(
            texture.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row_bytes),
                    rows_per_image: None,
                },
            },
            texture.size(),
        );
        self.queue.submit([encoder.finish()]);
        let buf_slice = buffer.slice(..);
        let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
        buf_slice.map_async(wgpu::MapMode::Read, move |v| {
            let _ = sender.send(v);
        });
        #[cfg(not(target_arch = "wasm32"))]
        self.device.poll(wgpu::PollType::wait_indefinitely())?;
        receiver
            .receive()
            .await
            .ok_or(Error::DownloadChannelClosed)??;
        let mapped = buf_slice.get_mapped_range();
        let mut result = Vec::with_capacity(row_bytes as usize * texture.height() as usize);
        for row in mapped.chunks(padded_row_bytes as usize) {
            result.extend_from_slice(&row[..row_bytes as usize]);
        }
        drop(mapped);
        buffer.unmap();
        Ok(result)
    }
}

impl Engine for WgpuEngine {
    async fn add_shader(&mut self, program: Program) -> Result<ShaderId> {
        let info = program.info();
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(info.name),
                source: wgpu::ShaderSource::Wgsl(info.source().into()),
            });
        let entries = Self::create_bind_group_layout_entries(
            std::iter::once(BindType::Uniform).chain(info.bindings.iter().map(|b| b.ty)),
        );
        let bind_group_layout =
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(info.name),
                    entries: &entries,
                });
        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(info.name),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });
        let target_pipeline =
            self.create_render_pipeline(info.name, &module, &layout, TARGET_FORMAT);
        let surface_pipeline =
            self.create_render_pipeline(info.name, &module, &layout, SURFACE_FORMAT);
        if let Some(err) = self.device.pop_error_scope().await {
            return Err(Error::ShaderCompilation {
                name: info.name,
                message: err.to_string(),
            });
        }
        let id = ShaderId(self.shaders.len());
        self.shaders.push(WgpuShader {
            label: info.name,
            target_pipeline,
            surface_pipeline,
            bind_group_layout,
        });
        Ok(id)
    }

    fn run_recording(&mut self, recording: &Recording, label: &'static str) -> Result<()> {
        log::debug!("running {label}, {} commands", recording.commands.len());
        let mut free_bufs: HashSet<ResourceId> = HashSet::default();
        let mut free_images: HashSet<ResourceId> = HashSet::default();
        // Buffers read by a draw already encoded in this recording.
        let mut bound_bufs: HashSet<ResourceId> = HashSet::default();

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor { label: Some(label) });
        for command in &recording.commands {
            match command {
                Command::AllocTarget(proxy) => {
                    self.check_size(proxy.width, proxy.height)?;
                    let usage = TextureUsages::RENDER_ATTACHMENT
                        | TextureUsages::TEXTURE_BINDING
                        | TextureUsages::COPY_SRC;
                    let target =
                        self.create_texture(proxy.width, proxy.height, TARGET_FORMAT, usage);
                    self.bind_map.image_map.insert(proxy.id, target);
                    self.stats.targets_allocated += 1;
                }
                Command::UploadImage(proxy, bytes) => {
                    self.check_size(proxy.width, proxy.height)?;
                    let image = self.upload((proxy.width, proxy.height), SOURCE_FORMAT, bytes);
                    self.bind_map.image_map.insert(proxy.id, image);
                    self.stats.textures_uploaded += 1;
                }
                Command::UploadField(proxy, data) => {
                    self.check_size(proxy.width, proxy.height)?;
                    let field = self.upload(
                        (proxy.width, proxy.height),
                        TARGET_FORMAT,
                        bytemuck::cast_slice(data),
                    );
                    self.bind_map.image_map.insert(proxy.id, field);
                    self.stats.textures_uploaded += 1;
                }
                Command::WriteBuffer(proxy, bytes) => {
                    let buf = match self.bind_map.buf_map.entry(proxy.id) {
                        Entry::Occupied(occupied) => &occupied.into_mut().buffer,
                        Entry::Vacant(vacant) => {
                            let usage = BufferUsages::UNIFORM | BufferUsages::COPY_DST;
                            let buffer =
                                self.pool
                                    .get_buf(proxy.size, proxy.name, usage, &self.device);
                            self.stats.buffers_allocated += 1;
                            &vacant
                                .insert(BindMapBuffer {
                                    buffer,
                                    label: proxy.name,
                                })
                                .buffer
                        }
                    };
                    if bound_bufs.contains(&proxy.id) {
                        // Queue writes land before the whole submission, so
                        // stage through the encoder to keep earlier draws intact.
                        let staging =
                            self.device
                                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                                    label: Some(proxy.name),
                                    contents: bytes,
                                    usage: BufferUsages::COPY_SRC,
                                });
                        encoder.copy_buffer_to_buffer(&staging, 0, buf, 0, bytes.len() as u64);
                    } else {
                        self.queue.write_buffer(buf, 0, bytes);
                    }
                }
                Command::Draw(params) => {
                    self.encode_draw(&mut encoder, params)?;
                    bound_bufs.extend(params.resources.iter().filter_map(|r| match r {
                        ResourceProxy::Buffer(proxy) => Some(proxy.id),
                        _ => None,
                    }));
                    self.stats.draws += 1;
                }
                Command::FreeTarget(proxy) => {
                    free_images.insert(proxy.id);
                }
                Command::FreeImage(proxy) => {
                    free_images.insert(proxy.id);
                }
                Command::FreeBuffer(proxy) => {
                    free_bufs.insert(proxy.id);
                }
            }
        }
        self.queue.submit(Some(encoder.finish()));
        for id in free_bufs {
            if let Some(buf) = self.bind_map.buf_map.remove(&id) {
                let props = BufferProperties {
                    size: buf.buffer.size(),
                    usages: buf.buffer.usage(),
                    name: buf.label,
                };
                self.pool.bufs.entry(props).or_default().push(buf.buffer);
            } else {
                log::warn!("freeing a buffer that was never written");
            }
        }
        for id in free_images {
            if let Some(gpu) = self.bind_map.image_map.remove(&id) {
                if gpu.texture.format() == TARGET_FORMAT {
                    self.stats.targets_released += 1;
                } else {
                    self.stats.textures_released += 1;
                }
                gpu.texture.destroy();
            } else {
                log::warn!("freeing a texture that doesn't exist: {id:?}");
            }
        }
        Ok(())
    }

    async fn read_target(&mut self, target: TargetProxy) -> Result<Vec<f32>> {
        let texture = &self
            .bind_map
            .image_map
            .get(&target.id)
            .ok_or(Error::UnavailableResource("render target", "read back"))?
            .texture;
        let bytes = self.read_texture(texture).await?;
        Ok(bytemuck::pod_collect_to_vec(&bytes))
    }

    async fn read_surface(&mut self) -> Result<Vec<u8>> {
        let surface = self
            .surface
            .as_ref()
            .ok_or(Error::UnavailableResource("surface", "read back"))?;
        self.read_texture(&surface.texture).await
    }

    fn resize_surface(&mut self, width: u32, height: u32) -> Result<()> {
        if self.surface_size() == (width, height) {
            return Ok(());
        }
        self.check_size(width, height)?;
        let usage = TextureUsages::RENDER_ATTACHMENT | TextureUsages::COPY_SRC;
        let surface = self.create_texture(width, height, SURFACE_FORMAT, usage);
        if let Some(old) = self.surface.replace(surface) {
            old.texture.destroy();
        }
        self.stats.surface_resizes += 1;
        Ok(())
    }

    fn surface_size(&self) -> (u32, u32) {
        self.surface
            .as_ref()
            .map_or((0, 0), |s| (s.texture.width(), s.texture.height()))
    }

    fn stats(&self) -> EngineStats {
        self.stats
    }
}

const SIZE_CLASS_BITS: u32 = 1;

impl ResourcePool {
    /// Get a buffer from the pool or create one.
    fn get_buf(
        &mut self,
        size: u64,
        name: &'static str,
        usage: BufferUsages,
        device: &Device,
    ) -> Buffer {
        let rounded_size = Self::size_class(size, SIZE_CLASS_BITS);
        let props = BufferProperties {
            size: rounded_size,
            usages: usage,
            name,
        };
        if let Some(buf_vec) = self.bufs.get_mut(&props)
            && let Some(buf) = buf_vec.pop()
        {
            return buf;
        }
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(name),
            size: rounded_size,
            usage,
            mapped_at_creation: false,
        })
    }

    /// Quantize a size up to the nearest size class.
    fn size_class(x: u64, bits: u32) -> u64 {
        if x > 1 << bits {
            let a = (x - 1).leading_zeros();
            let b = (x - 1) | (((u64::MAX / 2) >> bits) >> a);
            b + 1
        } else {
            1 << bits
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ResourcePool;

    #[test]
    fn uniform_sizes_round_to_size_classes() {
        assert_eq!(ResourcePool::size_class(16, 1), 16);
        assert_eq!(ResourcePool::size_class(48, 1), 48);
        assert_eq!(ResourcePool::size_class(49, 1), 64);
        assert_eq!(ResourcePool::size_class(1, 1), 2);
    }
}
