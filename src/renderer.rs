//! GPU resources and the per-frame draw path.
//!
//! One renderer owns everything GPU-side for one initialization cycle: the
//! device/queue pair, the mipmapped video texture, the glyph atlas texture,
//! the compiled shader program with its uniform block, and the offscreen
//! output target with its readback buffer. All of it is created in
//! [`Renderer::new`] and released as a unit by [`Renderer::destroy`];
//! changing columns, charset or glyph size means building a new renderer.

use std::num::NonZeroU32;
use std::sync::mpsc;

use anyhow::{anyhow, bail, Context, Result};

use crate::atlas::{build_atlas, AtlasImage};
use crate::grid::GridDimensions;
use crate::mipgen::{mip_level_count, MipChain, MipChainGenerator};
use crate::player::TickPipeline;
use crate::program::{
    ascii_uniform_layout, ShaderProgram, FRAGMENT_WGSL, U_BLEND, U_BRIGHTNESS, U_COLOR_MODE,
    U_GLYPH_COUNT, U_GRID_SIZE, U_HIGHLIGHT, VERTEX_WGSL,
};
use crate::schema::RendererConfig;
use crate::uniforms::{UniformTable, UniformValues};

const RENDER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const VIDEO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const ATLAS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

pub struct Renderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    grid: GridDimensions,
    source_size: (u32, u32),
    output_size: (u32, u32),

    video_texture: wgpu::Texture,
    atlas_texture: wgpu::Texture,
    mipgen: MipChainGenerator,
    mip_chain: MipChain,

    program: Option<ShaderProgram>,
    bind_group: Option<wgpu::BindGroup>,

    output_texture: wgpu::Texture,
    output_view: wgpu::TextureView,
    readback_buffer: wgpu::Buffer,
    unpadded_bytes_per_row: u32,
    padded_bytes_per_row: u32,

    destroyed: bool,
}

impl Renderer {
    /// Build the full pipeline for one initialization cycle: acquire a
    /// device, rasterize and upload the atlas, create the video texture and
    /// mip chain, compile the program and write the static uniforms.
    pub fn new(
        config: &RendererConfig,
        source_size: (u32, u32),
        font: &fontdue::Font,
    ) -> Result<Self> {
        config.validate()?;
        let (source_width, source_height) = source_size;
        let grid = GridDimensions::derive(source_width, source_height, config.columns)?;
        let output_size = derive_output_size(grid, config.glyph_px, config.max_width);

        let glyphs = config.charset.glyphs();
        let atlas = build_atlas(font, glyphs, config.glyph_px).with_context(|| {
            format!("failed to rasterize atlas for charset '{}'", config.charset)
        })?;

        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            compatible_surface: None,
        }))
        .ok_or_else(|| anyhow!("no suitable GPU adapter found"))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("glyphstream-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
            },
            None,
        ))
        .context("failed to request wgpu device")?;

        let video_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("glyphstream-video"),
            size: wgpu::Extent3d {
                width: source_width,
                height: source_height,
                depth_or_array_layers: 1,
            },
            mip_level_count: mip_level_count(source_width, source_height),
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: VIDEO_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        let atlas_texture = upload_atlas(&device, &queue, &atlas);

        let mipgen = MipChainGenerator::new(&device, VIDEO_FORMAT);
        let mip_chain = mipgen.prepare(&device, &video_texture);

        let program = ShaderProgram::build(
            &device,
            VERTEX_WGSL,
            FRAGMENT_WGSL,
            ascii_uniform_layout(),
            RENDER_FORMAT,
        )
        .map_err(anyhow::Error::new)
        .context("failed to build ASCII conversion program")?;

        let video_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("glyphstream-video-sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });
        let atlas_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("glyphstream-atlas-sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        let video_view = video_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let atlas_view = atlas_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("glyphstream-convert-bg"),
            layout: program.bind_group_layout(),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&video_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&video_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&atlas_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&atlas_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: program.uniform_buffer().as_entire_binding(),
                },
            ],
        });

        let (output_width, output_height) = output_size;
        let output_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("glyphstream-output"),
            size: wgpu::Extent3d {
                width: output_width,
                height: output_height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: RENDER_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let output_view = output_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let unpadded_bytes_per_row = output_width
            .checked_mul(4)
            .ok_or_else(|| anyhow!("output width overflow when computing row bytes"))?;
        let padded_bytes_per_row =
            align_to(unpadded_bytes_per_row, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let readback_size = u64::from(padded_bytes_per_row) * u64::from(output_height);
        let readback_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("glyphstream-readback"),
            size: readback_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut renderer = Self {
            device,
            queue,
            grid,
            source_size,
            output_size,
            video_texture,
            atlas_texture,
            mipgen,
            mip_chain,
            program: Some(program),
            bind_group: Some(bind_group),
            output_texture,
            output_view,
            readback_buffer,
            unpadded_bytes_per_row,
            padded_bytes_per_row,
            destroyed: false,
        };
        renderer.write_static_uniforms(config, atlas.glyph_count);

        log::info!(
            "renderer initialized: grid {}x{}, charset '{}', output {}x{}",
            grid.cols,
            grid.rows,
            config.charset,
            output_width,
            output_height
        );
        Ok(renderer)
    }

    /// Uniforms that only change on re-initialization, written once.
    fn write_static_uniforms(&mut self, config: &RendererConfig, glyph_count: u32) {
        let grid = self.grid;
        let Some(program) = self.program.as_mut() else {
            return;
        };
        let (table, values) = program.uniform_frame();
        values.set_vec2(
            table.get(U_GRID_SIZE),
            [grid.cols as f32, grid.rows as f32],
        );
        values.set_f32(table.get(U_GLYPH_COUNT), glyph_count as f32);
        values.set_f32(table.get(U_BRIGHTNESS), config.brightness);
        values.set_u32(table.get(U_COLOR_MODE), u32::from(config.color_mode));
        values.set_f32(table.get(U_BLEND), config.blend_factor());
        values.set_f32(table.get(U_HIGHLIGHT), config.highlight_factor());
    }

    pub fn output_size(&self) -> (u32, u32) {
        self.output_size
    }

    pub fn source_size(&self) -> (u32, u32) {
        self.source_size
    }

    /// Map the readback buffer and return the last drawn frame as tightly
    /// packed RGBA rows.
    pub fn read_frame_rgba(&mut self) -> Result<Vec<u8>> {
        if self.destroyed {
            bail!("renderer already destroyed");
        }
        let (_, output_height) = self.output_size;
        let buffer_slice = self.readback_buffer.slice(..);
        let (sender, receiver) = mpsc::channel();

        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        receiver
            .recv()
            .map_err(|_| anyhow!("failed receiving GPU map callback"))?
            .context("GPU buffer mapping failed")?;

        let mapped = buffer_slice.get_mapped_range();
        let mut frame = vec![0_u8; (self.unpadded_bytes_per_row * output_height) as usize];

        for (row_index, chunk) in mapped
            .chunks(self.padded_bytes_per_row as usize)
            .take(output_height as usize)
            .enumerate()
        {
            let dst_start = row_index * self.unpadded_bytes_per_row as usize;
            let dst_end = dst_start + self.unpadded_bytes_per_row as usize;
            frame[dst_start..dst_end]
                .copy_from_slice(&chunk[..self.unpadded_bytes_per_row as usize]);
        }

        drop(mapped);
        self.readback_buffer.unmap();
        Ok(frame)
    }
}

impl TickPipeline for Renderer {
    fn grid(&self) -> GridDimensions {
        self.grid
    }

    fn is_valid(&self) -> bool {
        !self.destroyed && self.program.is_some() && self.bind_group.is_some()
    }

    fn upload_frame(&mut self, pixels: &[u8]) -> Result<()> {
        if self.destroyed {
            bail!("renderer already destroyed");
        }
        let (width, height) = self.source_size;
        let expected = (width * height * 4) as usize;
        if pixels.len() != expected {
            bail!(
                "frame length mismatch: expected {} bytes for {}x{}, got {}",
                expected,
                width,
                height,
                pixels.len()
            );
        }

        let bytes_per_row = NonZeroU32::new(width * 4)
            .ok_or_else(|| anyhow!("video texture has invalid width {width}"))?;
        let rows_per_image = NonZeroU32::new(height)
            .ok_or_else(|| anyhow!("video texture has invalid height {height}"))?;

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.video_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row.get()),
                rows_per_image: Some(rows_per_image.get()),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("glyphstream-mip-encoder"),
            });
        self.mipgen.encode(&mut encoder, &self.mip_chain);
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn uniform_frame(&mut self) -> Option<(&UniformTable, &mut UniformValues)> {
        self.program.as_mut().map(|program| program.uniform_frame())
    }

    fn draw(&mut self) -> Result<()> {
        if self.destroyed {
            bail!("renderer already destroyed");
        }
        let (program, bind_group) = match (self.program.as_ref(), self.bind_group.as_ref()) {
            (Some(program), Some(bind_group)) => (program, bind_group),
            _ => bail!("draw without a valid program"),
        };

        program.upload_uniforms(&self.queue);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("glyphstream-draw-encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("glyphstream-convert-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.output_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(program.pipeline());
            pass.set_bind_group(0, bind_group, &[]);
            pass.draw(0..3, 0..1);
        }

        let (output_width, output_height) = self.output_size;
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.output_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &self.readback_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_bytes_per_row),
                    rows_per_image: Some(output_height),
                },
            },
            wgpu::Extent3d {
                width: output_width,
                height: output_height,
                depth_or_array_layers: 1,
            },
        );

        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    /// Release GPU resources. Idempotent; safe from any state.
    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        if let Some(program) = self.program.take() {
            program.destroy();
        }
        self.bind_group = None;
        self.video_texture.destroy();
        self.atlas_texture.destroy();
        self.output_texture.destroy();
        self.readback_buffer.destroy();
        self.destroyed = true;
        log::info!("renderer destroyed");
    }
}

fn upload_atlas(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    atlas: &AtlasImage,
) -> wgpu::Texture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("glyphstream-atlas"),
        size: wgpu::Extent3d {
            width: atlas.width,
            height: atlas.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: ATLAS_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &atlas.pixels,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(atlas.width),
            rows_per_image: Some(atlas.height),
        },
        wgpu::Extent3d {
            width: atlas.width,
            height: atlas.height,
            depth_or_array_layers: 1,
        },
    );

    texture
}

/// Output pixel size: cells are twice as tall as wide (matching the grid's
/// character aspect correction), capped by `max_width`.
fn derive_output_size(grid: GridDimensions, glyph_px: u32, max_width: u32) -> (u32, u32) {
    let natural_width = grid.cols * glyph_px;
    let width = natural_width.min(max_width).max(grid.cols);
    let cell_width = (width / grid.cols).max(1);
    let width = cell_width * grid.cols;
    let height = grid.rows * cell_width * 2;
    (width, height)
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}
