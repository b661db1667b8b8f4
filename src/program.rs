//! Shader program management.
//!
//! Owns compilation and linking of the vertex + fragment WGSL pair, the
//! uniform buffer backing the block described in [`crate::uniforms`], and
//! the bind group layout the renderer binds textures against. A program is
//! either fully built (pipeline + resolved uniform table + buffer) or it
//! does not exist; a failed build returns a [`ShaderError`] naming the stage
//! and carrying the backend diagnostic, and leaves no GPU state behind.

use std::fmt;

use crate::uniforms::{UniformKind, UniformLayout, UniformTable, UniformValues};

pub const VERTEX_WGSL: &str = include_str!("../shaders/wgsl/ascii_vertex.wgsl");
pub const FRAGMENT_WGSL: &str = include_str!("../shaders/wgsl/ascii_fragment.wgsl");

// Logical uniform names. The table resolves these against the block layout;
// effects look them up by name and tolerate absence.
pub const U_GRID_SIZE: &str = "u_grid_size";
pub const U_CURSOR_POS: &str = "u_cursor_pos";
pub const U_GLYPH_COUNT: &str = "u_glyph_count";
pub const U_BRIGHTNESS: &str = "u_brightness";
pub const U_COLOR_MODE: &str = "u_color_mode";
pub const U_BLEND: &str = "u_blend";
pub const U_HIGHLIGHT: &str = "u_highlight";
pub const U_AUDIO_LEVEL: &str = "u_audio_level";
pub const U_AUDIO_REACTIVITY: &str = "u_audio_reactivity";
pub const U_CURSOR_STRENGTH: &str = "u_cursor_strength";
pub const U_RIPPLE_COUNT: &str = "u_ripple_count";
pub const U_TIME: &str = "u_time";
pub const U_RIPPLES: &str = "u_ripples";

/// Capacity of the ripple uniform array; must match the WGSL declaration.
pub const RIPPLE_CAPACITY: u32 = 8;

/// Block layout for the ASCII conversion shader. Field order mirrors the
/// `AsciiUniforms` struct in `ascii_fragment.wgsl`.
pub fn ascii_uniform_layout() -> UniformLayout {
    UniformLayout::builder()
        .field(U_GRID_SIZE, UniformKind::Vec2)
        .field(U_CURSOR_POS, UniformKind::Vec2)
        .field(U_GLYPH_COUNT, UniformKind::F32)
        .field(U_BRIGHTNESS, UniformKind::F32)
        .field(U_COLOR_MODE, UniformKind::U32)
        .field(U_BLEND, UniformKind::F32)
        .field(U_HIGHLIGHT, UniformKind::F32)
        .field(U_AUDIO_LEVEL, UniformKind::F32)
        .field(U_AUDIO_REACTIVITY, UniformKind::F32)
        .field(U_CURSOR_STRENGTH, UniformKind::F32)
        .field(U_RIPPLE_COUNT, UniformKind::U32)
        .field(U_TIME, UniformKind::F32)
        .field(U_RIPPLES, UniformKind::Vec4Array(RIPPLE_CAPACITY))
        .finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Link,
}

impl ShaderStage {
    pub fn label(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Link => "link",
        }
    }
}

/// Fatal shader build failure: which stage broke and what the backend said.
#[derive(Debug, Clone)]
pub struct ShaderError {
    pub stage: ShaderStage,
    pub diagnostic: String,
}

impl ShaderError {
    pub fn new(stage: ShaderStage, diagnostic: impl Into<String>) -> Self {
        Self {
            stage,
            diagnostic: diagnostic.into(),
        }
    }
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "shader {} stage failed: {}",
            self.stage.label(),
            self.diagnostic
        )
    }
}

impl std::error::Error for ShaderError {}

/// Compiled + linked program with its resolved uniform table and staging.
pub struct ShaderProgram {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    table: UniformTable,
    values: UniformValues,
}

impl ShaderProgram {
    /// Compile both stages and link them into a render pipeline targeting
    /// `target_format`. Each step runs inside a wgpu validation error scope
    /// so a broken source surfaces as a stage-tagged [`ShaderError`] instead
    /// of a device-lost panic later.
    pub fn build(
        device: &wgpu::Device,
        vertex_source: &str,
        fragment_source: &str,
        layout: UniformLayout,
        target_format: wgpu::TextureFormat,
    ) -> Result<Self, ShaderError> {
        let vertex_module = compile_stage(device, ShaderStage::Vertex, vertex_source)?;
        let fragment_module = compile_stage(device, ShaderStage::Fragment, fragment_source)?;

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ascii-convert-bgl"),
            entries: &[
                // Source video frame (mipmapped).
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                // Glyph atlas strip.
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                // Uniform block.
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(u64::from(layout.size())),
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ascii-convert-pipeline-layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("ascii-convert-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: "vs_main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: "fs_main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(ShaderError::new(ShaderStage::Link, error.to_string()));
        }

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ascii-convert-uniforms"),
            size: u64::from(layout.size()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let table = UniformTable::resolve(&layout);
        let values = UniformValues::new(&layout);

        Ok(Self {
            pipeline,
            bind_group_layout,
            uniform_buffer,
            table,
            values,
        })
    }

    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }

    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    pub fn uniform_buffer(&self) -> &wgpu::Buffer {
        &self.uniform_buffer
    }

    /// Table + staging split borrow for effect invocation.
    pub fn uniform_frame(&mut self) -> (&UniformTable, &mut UniformValues) {
        (&self.table, &mut self.values)
    }

    /// Push the staged block to the GPU. One buffer write per frame.
    pub fn upload_uniforms(&self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.uniform_buffer, 0, self.values.as_bytes());
    }

    /// Release GPU-side resources. The program must not be used afterwards;
    /// callers drop it right after (`Option::take` in the renderer).
    pub fn destroy(&self) {
        self.uniform_buffer.destroy();
    }
}

fn compile_stage(
    device: &wgpu::Device,
    stage: ShaderStage,
    source: &str,
) -> Result<wgpu::ShaderModule, ShaderError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(match stage {
            ShaderStage::Vertex => "ascii-vertex",
            ShaderStage::Fragment => "ascii-fragment",
            ShaderStage::Link => "ascii-link",
        }),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => Err(ShaderError::new(stage, error.to_string())),
        None => Ok(module),
    }
}
