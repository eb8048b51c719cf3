// Copyright 2025 the jfa_sdf Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::collections::HashMap;

use jfa_sdf_shaders::{BindType, ParamType, ShaderInfo};

use crate::engine::{Engine, Program};
use crate::options::Viewport;
use crate::recording::{
    BufferProxy, DrawParams, DrawTarget, ImageProxy, Recording, ResourceProxy, ShaderId,
    TargetProxy,
};
use crate::{Error, Result};

/// A value bound to a named slot of a [`DrawCall`].
#[derive(Clone, Copy, Debug)]
pub enum ParamValue {
    F32(f32),
    Bool(bool),
    Vec2([f32; 2]),
    Vec4([f32; 4]),
    Texture(ResourceProxy),
    Uniform(BufferProxy),
}

impl ParamValue {
    fn kind(&self) -> &'static str {
        match self {
            Self::F32(_) => "f32",
            Self::Bool(_) => "bool",
            Self::Vec2(_) => "vec2",
            Self::Vec4(_) => "vec4",
            Self::Texture(_) => "texture",
            Self::Uniform(_) => "uniform",
        }
    }
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        Self::F32(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<[f32; 2]> for ParamValue {
    fn from(value: [f32; 2]) -> Self {
        Self::Vec2(value)
    }
}

impl From<[f32; 4]> for ParamValue {
    fn from(value: [f32; 4]) -> Self {
        Self::Vec4(value)
    }
}

impl From<ImageProxy> for ParamValue {
    fn from(value: ImageProxy) -> Self {
        Self::Texture(value.into())
    }
}

impl From<TargetProxy> for ParamValue {
    fn from(value: TargetProxy) -> Self {
        Self::Texture(value.into())
    }
}

impl From<BufferProxy> for ParamValue {
    fn from(value: BufferProxy) -> Self {
        Self::Uniform(value)
    }
}

/// A compiled program together with the state bound to it.
///
/// Scalar and vector parameters are staged on the CPU and only written to
/// the params buffer when they changed since the last draw, so that a
/// draw call can be rebound and redrawn cheaply.
#[derive(Debug)]
pub struct DrawCall {
    shader_id: ShaderId,
    shader: &'static ShaderInfo,
    params: BufferProxy,
    staging: Vec<u8>,
    dirty: bool,
    slots: Vec<Option<ResourceProxy>>,
}

impl DrawCall {
    pub fn new(shader_id: ShaderId, shader: &'static ShaderInfo) -> Self {
        Self {
            shader_id,
            shader,
            params: BufferProxy::new(shader.params_size.into(), shader.name),
            staging: vec![0; shader.params_size as usize],
            dirty: true,
            slots: vec![None; shader.bindings.len()],
        }
    }

    /// Binds `value` to the parameter or resource slot called `name`.
    ///
    /// # Panics
    ///
    /// If the program has no slot of that name, or the slot has a different type.
    pub fn set(&mut self, name: &str, value: impl Into<ParamValue>) -> &mut Self {
        let value = value.into();
        let shader = self.shader;
        match value {
            ParamValue::Texture(proxy) => self.bind(name, BindType::Texture, proxy, &value),
            ParamValue::Uniform(proxy) => {
                self.bind(name, BindType::Uniform, proxy.into(), &value);
            }
            _ => {
                let Some(param) = shader.param(name) else {
                    panic!("`{}` has no parameter `{name}`", shader.name);
                };
                let bytes: Vec<u8> = match (param.ty, value) {
                    (ParamType::F32, ParamValue::F32(v)) => bytemuck::bytes_of(&v).to_vec(),
                    (ParamType::Bool, ParamValue::Bool(v)) => {
                        bytemuck::bytes_of(&u32::from(v)).to_vec()
                    }
                    (ParamType::Vec2, ParamValue::Vec2(v)) => bytemuck::bytes_of(&v).to_vec(),
                    (ParamType::Vec4, ParamValue::Vec4(v)) => bytemuck::bytes_of(&v).to_vec(),
                    _ => panic!(
                        "`{}.{name}` is {:?}, got a {}",
                        shader.name,
                        param.ty,
                        value.kind()
                    ),
                };
                let offset = param.offset as usize;
                let dst = &mut self.staging[offset..offset + bytes.len()];
                if dst != bytes.as_slice() {
                    dst.copy_from_slice(&bytes);
                    self.dirty = true;
                }
            }
        }
        self
    }

    fn bind(&mut self, name: &str, ty: BindType, proxy: ResourceProxy, value: &ParamValue) {
        let Some((slot, info)) = self.shader.binding(name) else {
            panic!("`{}` has no binding `{name}`", self.shader.name);
        };
        if info.ty != ty {
            panic!(
                "`{}.{name}` is a {:?} binding, got a {}",
                self.shader.name,
                info.ty,
                value.kind()
            );
        }
        self.slots[slot as usize - 1] = Some(proxy);
    }

    /// Records a draw covering the whole of `target`.
    ///
    /// # Panics
    ///
    /// If a resource slot has never been bound.
    pub fn draw(&mut self, recording: &mut Recording, target: DrawTarget) {
        if self.dirty {
            recording.write_buffer(self.params, self.staging.clone());
            self.dirty = false;
        }
        let mut resources = Vec::with_capacity(self.slots.len() + 1);
        resources.push(ResourceProxy::Buffer(self.params));
        for (slot, binding) in self.slots.iter().zip(self.shader.bindings) {
            let Some(proxy) = slot else {
                panic!("`{}.{}` was never bound", self.shader.name, binding.name);
            };
            resources.push(*proxy);
        }
        recording.draw(DrawParams {
            shader_id: self.shader_id,
            resources,
            target,
            clear_color: [0.0; 4],
        });
    }

    /// Forces the params block to be written again on the next draw.
    ///
    /// Needed when a recording carrying the last write was never executed.
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    /// Records the release of the params buffer.
    pub fn free(self, recording: &mut Recording) {
        recording.free_buffer(self.params);
    }
}

/// Compiled programs and their draw calls, one per program and viewport.
#[derive(Debug, Default)]
pub(crate) struct DrawCallCache {
    shaders: HashMap<Program, ShaderId>,
    draw_calls: HashMap<(Program, Viewport), DrawCall>,
}

impl DrawCallCache {
    /// Compiles `program` unless it already is.
    pub(crate) async fn compile<E: Engine>(
        &mut self,
        engine: &mut E,
        program: Program,
    ) -> Result<()> {
        if !self.shaders.contains_key(&program) {
            let id = engine.add_shader(program).await?;
            log::debug!("compiled {}", program.info().name);
            self.shaders.insert(program, id);
        }
        Ok(())
    }

    pub(crate) fn get(&mut self, program: Program, viewport: Viewport) -> Result<&mut DrawCall> {
        let info = program.info();
        let shader_id = *self
            .shaders
            .get(&program)
            .ok_or(Error::UnavailableResource(info.name, "draw"))?;
        Ok(self
            .draw_calls
            .entry((program, viewport))
            .or_insert_with(|| DrawCall::new(shader_id, info)))
    }

    /// Marks every params block stale, after a recording failed part way.
    pub(crate) fn invalidate(&mut self) {
        for draw in self.draw_calls.values_mut() {
            draw.invalidate();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.draw_calls.len()
    }

    /// Records the release of every params buffer.
    pub(crate) fn free(self, recording: &mut Recording) {
        for draw in self.draw_calls.into_values() {
            draw.free(recording);
        }
    }
}

#[cfg(test)]
mod tests {
    use jfa_sdf_shaders::{JumpFloodParams, SHADERS};

    use super::DrawCall;
    use crate::recording::{Command, DrawTarget, Recording, ResourceProxy, ShaderId, TargetProxy};

    fn written_params(recording: &Recording) -> Vec<JumpFloodParams> {
        recording
            .commands
            .iter()
            .filter_map(|cmd| match cmd {
                Command::WriteBuffer(_, bytes) => Some(bytemuck::pod_read_unaligned(bytes)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn params_are_staged_at_their_offsets() {
        let mut draw = DrawCall::new(ShaderId(0), &SHADERS.jump_flood);
        draw.set("resolution", [16.0, 8.0])
            .set("jump", 4.0)
            .set("is_positive", true)
            .set("tex", TargetProxy::new(16, 8));
        let mut recording = Recording::default();
        draw.draw(&mut recording, DrawTarget::Surface);
        let params = written_params(&recording);
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].resolution, [16.0, 8.0]);
        assert_eq!(params[0].jump, 4.0);
        assert_eq!(params[0].is_positive, 1);
        assert_eq!(params[0].phase, 0);
        assert_eq!(recording.draw_count(), 1);
    }

    #[test]
    fn params_buffer_is_bound_first() {
        let mut draw = DrawCall::new(ShaderId(2), &SHADERS.jump_flood);
        draw.set("tex", TargetProxy::new(4, 4));
        let mut recording = Recording::default();
        draw.draw(&mut recording, DrawTarget::Surface);
        let [Command::WriteBuffer(written, _), Command::Draw(params)] = &recording.commands[..]
        else {
            panic!("expected a write then a draw");
        };
        assert_eq!(params.shader_id, ShaderId(2));
        assert_eq!(params.resources.len(), 2);
        let ResourceProxy::Buffer(bound) = params.resources[0] else {
            panic!("binding 0 is not the params buffer");
        };
        assert_eq!(bound.id, written.id);
        assert!(matches!(params.resources[1], ResourceProxy::Target(_)));
    }

    #[test]
    fn unchanged_params_are_not_rewritten() {
        let mut draw = DrawCall::new(ShaderId(0), &SHADERS.jump_flood);
        draw.set("spread", 8.0).set("tex", TargetProxy::new(1, 1));
        let mut recording = Recording::default();
        draw.draw(&mut recording, DrawTarget::Surface);
        draw.set("spread", 8.0).set("tex", TargetProxy::new(1, 1));
        draw.draw(&mut recording, DrawTarget::Surface);
        assert_eq!(written_params(&recording).len(), 1);

        draw.set("spread", 9.0);
        draw.draw(&mut recording, DrawTarget::Surface);
        assert_eq!(written_params(&recording).len(), 2);

        draw.invalidate();
        draw.draw(&mut recording, DrawTarget::Surface);
        assert_eq!(written_params(&recording).len(), 3);
        assert_eq!(recording.draw_count(), 4);
    }

    #[test]
    #[should_panic(expected = "has no parameter `radius`")]
    fn unknown_name_panics() {
        DrawCall::new(ShaderId(0), &SHADERS.jump_flood).set("radius", 1.0);
    }

    #[test]
    #[should_panic(expected = "got a bool")]
    fn mismatched_type_panics() {
        DrawCall::new(ShaderId(0), &SHADERS.merge).set("spread", true);
    }

    #[test]
    #[should_panic(expected = "was never bound")]
    fn unbound_texture_panics() {
        let mut draw = DrawCall::new(ShaderId(0), &SHADERS.merge);
        draw.set("tex_positive", TargetProxy::new(1, 1));
        draw.draw(&mut Recording::default(), DrawTarget::Surface);
    }
}
