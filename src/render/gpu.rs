//! wgpu backend: texture storage, per-frame command batching and the two
//! pipelines (textured quads, solid tessellated shapes).

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use lyon::math::{Box2D, Point, Size};
use lyon::path::Path;
use lyon::tessellation::{
    BuffersBuilder, FillOptions, FillTessellator, FillVertex, StrokeOptions, StrokeTessellator,
    StrokeVertex, TessellationError, VertexBuffers,
};
use tracing::{info, warn};
use wgpu::util::DeviceExt;
use winit::window::Window;

use super::{Color, DrawCmd, PointerState, RegionStack, RenderingProvider, TextureData, TextureId};

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct TexVertex {
    pos: [f32; 2],
    uv: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct SolidVertex {
    pos: [f32; 2],
    color: [f32; 4],
}

struct GpuTexture {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchKind {
    Textured(TextureId),
    Solid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Batch {
    kind: BatchKind,
    scissor: [u32; 4],
    indices: Range<u32>,
}

pub(crate) struct Gpu {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    textured: wgpu::RenderPipeline,
    solid: wgpu::RenderPipeline,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    textures: HashMap<TextureId, GpuTexture>,
    next_texture: u64,
}

impl Gpu {
    pub(crate) fn new(window: Arc<Window>) -> Result<Self> {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create surface")?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to acquire GPU adapter")?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(wgpu::TextureFormat::is_srgb)
            .or_else(|| caps.formats.first().copied())
            .context("surface reports no texture formats")?;

        let limits = adapter.limits();
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("live-view-device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits,
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
        }))
        .context("failed to acquire GPU device")?;

        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        info!(
            width = config.width,
            height = config.height,
            format = ?config.format,
            "surface configured",
        );

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("quad"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/quad.wgsl").into()),
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("image-layout"),
            entries: &[
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
            ],
        });

        // Pixels stay crisp when zoomed in.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("image-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let blend_target = [Some(wgpu::ColorTargetState {
            format,
            blend: Some(wgpu::BlendState::ALPHA_BLENDING),
            write_mask: wgpu::ColorWrites::ALL,
        })];

        let textured_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("textured-layout"),
            bind_group_layouts: &[&texture_layout],
            push_constant_ranges: &[],
        });
        let textured = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("textured"),
            layout: Some(&textured_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_tex"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<TexVertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_tex"),
                targets: &blend_target,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let solid_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("solid-layout"),
            bind_group_layouts: &[],
            push_constant_ranges: &[],
        });
        let solid = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("solid"),
            layout: Some(&solid_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_solid"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<SolidVertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x4],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_solid"),
                targets: &blend_target,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            surface,
            device,
            queue,
            config,
            textured,
            solid,
            texture_layout,
            sampler,
            textures: HashMap::new(),
            next_texture: 1,
        })
    }

    pub(crate) fn size(&self) -> Size {
        Size::new(self.config.width as f32, self.config.height as f32)
    }

    pub(crate) fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface.configure(&self.device, &self.config);
    }

    /// Reapplies the current surface configuration after a lost surface.
    pub(crate) fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    fn upload(&mut self, data: &TextureData) -> TextureId {
        let extent = wgpu::Extent3d {
            width: data.width.max(1),
            height: data.height.max(1),
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("image"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            texture.as_image_copy(),
            &data.rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * extent.width),
                rows_per_image: Some(extent.height),
            },
            extent,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("image-bind"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        self.textures.insert(
            id,
            GpuTexture {
                _texture: texture,
                bind_group,
            },
        );
        id
    }

    fn remove(&mut self, id: TextureId) {
        if self.textures.remove(&id).is_none() {
            warn!(texture = id.0, "removing unknown texture");
        }
    }

    /// Draws one frame's commands over `background` and presents it.
    pub(crate) fn render(
        &mut self,
        cmds: &[(DrawCmd, Box2D)],
        background: Color,
    ) -> Result<(), wgpu::SurfaceError> {
        let frame = self.surface.get_current_texture()?;
        let target = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let geometry = Geometry::build(cmds, self.size());

        let tex_buffers = (!geometry.tex.indices.is_empty()).then(|| {
            self.index_pair("textured", &geometry.tex.vertices, &geometry.tex.indices)
        });
        let solid_buffers = (!geometry.solid.indices.is_empty()).then(|| {
            self.index_pair("solid", &geometry.solid.vertices, &geometry.solid.indices)
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });
        {
            let [r, g, b, a] = background.to_array().map(f64::from);
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("frame"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for batch in &geometry.batches {
                let [x, y, w, h] = batch.scissor;
                rpass.set_scissor_rect(x, y, w, h);
                match batch.kind {
                    BatchKind::Textured(id) => {
                        let (Some((vbuf, ibuf)), Some(texture)) =
                            (tex_buffers.as_ref(), self.textures.get(&id))
                        else {
                            continue;
                        };
                        rpass.set_pipeline(&self.textured);
                        rpass.set_bind_group(0, &texture.bind_group, &[]);
                        rpass.set_vertex_buffer(0, vbuf.slice(..));
                        rpass.set_index_buffer(ibuf.slice(..), wgpu::IndexFormat::Uint32);
                        rpass.draw_indexed(batch.indices.clone(), 0, 0..1);
                    }
                    BatchKind::Solid => {
                        let Some((vbuf, ibuf)) = solid_buffers.as_ref() else {
                            continue;
                        };
                        rpass.set_pipeline(&self.solid);
                        rpass.set_vertex_buffer(0, vbuf.slice(..));
                        rpass.set_index_buffer(ibuf.slice(..), wgpu::IndexFormat::Uint32);
                        rpass.draw_indexed(batch.indices.clone(), 0, 0..1);
                    }
                }
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn index_pair<V: Pod>(
        &self,
        label: &str,
        vertices: &[V],
        indices: &[u32],
    ) -> (wgpu::Buffer, wgpu::Buffer) {
        let vbuf = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let ibuf = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        (vbuf, ibuf)
    }
}

/// CPU-side geometry for one frame.
struct Geometry {
    tex: VertexBuffers<TexVertex, u32>,
    solid: VertexBuffers<SolidVertex, u32>,
    batches: Vec<Batch>,
}

impl Geometry {
    fn build(cmds: &[(DrawCmd, Box2D)], screen: Size) -> Self {
        let mut geometry = Self {
            tex: VertexBuffers::new(),
            solid: VertexBuffers::new(),
            batches: Vec::new(),
        };
        let mut fill = FillTessellator::new();
        let mut stroke = StrokeTessellator::new();
        let ndc = |p: Point| [p.x / screen.width * 2.0 - 1.0, 1.0 - p.y / screen.height * 2.0];

        for (cmd, clip) in cmds {
            let Some(scissor) = scissor_rect(clip, screen) else {
                continue;
            };
            if let DrawCmd::Image { texture, dest, uv } = cmd {
                let start = geometry.tex.indices.len() as u32;
                let base = geometry.tex.vertices.len() as u32;
                for (p, t) in [
                    (dest.min, uv.min),
                    (Point::new(dest.max.x, dest.min.y), Point::new(uv.max.x, uv.min.y)),
                    (Point::new(dest.min.x, dest.max.y), Point::new(uv.min.x, uv.max.y)),
                    (dest.max, uv.max),
                ] {
                    geometry.tex.vertices.push(TexVertex {
                        pos: ndc(p),
                        uv: t.to_array(),
                    });
                }
                geometry
                    .tex
                    .indices
                    .extend([0, 1, 2, 2, 1, 3].map(|i| base + i));
                geometry.batches.push(Batch {
                    kind: BatchKind::Textured(*texture),
                    scissor,
                    indices: start..start + 6,
                });
                continue;
            }

            let start = geometry.solid.indices.len() as u32;
            if let Err(err) = tessellate(cmd, &mut fill, &mut stroke, &mut geometry.solid, &ndc) {
                warn!(error = ?err, "failed to tessellate draw command");
                continue;
            }
            let end = geometry.solid.indices.len() as u32;
            match geometry.batches.last_mut() {
                Some(last)
                    if last.kind == BatchKind::Solid
                        && last.scissor == scissor
                        && last.indices.end == start =>
                {
                    last.indices.end = end;
                }
                _ => geometry.batches.push(Batch {
                    kind: BatchKind::Solid,
                    scissor,
                    indices: start..end,
                }),
            }
        }
        geometry
    }
}

fn tessellate(
    cmd: &DrawCmd,
    fill: &mut FillTessellator,
    stroke: &mut StrokeTessellator,
    out: &mut VertexBuffers<SolidVertex, u32>,
    ndc: &dyn Fn(Point) -> [f32; 2],
) -> Result<(), TessellationError> {
    let stroked = |color: Color| {
        let color = color.to_array();
        move |v: StrokeVertex| SolidVertex {
            pos: ndc(v.position()),
            color,
        }
    };
    let filled = |color: Color| {
        let color = color.to_array();
        move |v: FillVertex| SolidVertex {
            pos: ndc(v.position()),
            color,
        }
    };

    match cmd {
        DrawCmd::Image { .. } => {}
        DrawCmd::Line {
            from,
            to,
            color,
            width,
        } => {
            let path = polyline_path(&[*from, *to]);
            stroke.tessellate_path(
                &path,
                &StrokeOptions::default().with_line_width(*width),
                &mut BuffersBuilder::new(out, stroked(*color)),
            )?;
        }
        DrawCmd::Polyline {
            points,
            color,
            width,
        } => {
            let path = polyline_path(points);
            stroke.tessellate_path(
                &path,
                &StrokeOptions::default().with_line_width(*width),
                &mut BuffersBuilder::new(out, stroked(*color)),
            )?;
        }
        DrawCmd::Rect {
            rect,
            color,
            stroke: None,
        } => {
            fill.tessellate_rectangle(
                rect,
                &FillOptions::default(),
                &mut BuffersBuilder::new(out, filled(*color)),
            )?;
        }
        DrawCmd::Rect {
            rect,
            color,
            stroke: Some(width),
        } => {
            stroke.tessellate_rectangle(
                rect,
                &StrokeOptions::default().with_line_width(*width),
                &mut BuffersBuilder::new(out, stroked(*color)),
            )?;
        }
        DrawCmd::Circle {
            center,
            radius,
            color,
            stroke: None,
        } => {
            fill.tessellate_circle(
                *center,
                *radius,
                &FillOptions::default(),
                &mut BuffersBuilder::new(out, filled(*color)),
            )?;
        }
        DrawCmd::Circle {
            center,
            radius,
            color,
            stroke: Some(width),
        } => {
            stroke.tessellate_circle(
                *center,
                *radius,
                &StrokeOptions::default().with_line_width(*width),
                &mut BuffersBuilder::new(out, stroked(*color)),
            )?;
        }
    }
    Ok(())
}

fn polyline_path(points: &[Point]) -> Path {
    let mut builder = Path::builder();
    if let Some((first, rest)) = points.split_first() {
        builder.begin(*first);
        for p in rest {
            builder.line_to(*p);
        }
        builder.end(false);
    }
    builder.build()
}

/// Integer scissor rectangle `[x, y, w, h]` of `clip` inside the screen, or
/// `None` when nothing of it is visible.
fn scissor_rect(clip: &Box2D, screen: Size) -> Option<[u32; 4]> {
    let x0 = clip.min.x.max(0.0).floor();
    let y0 = clip.min.y.max(0.0).floor();
    let x1 = clip.max.x.min(screen.width).ceil();
    let y1 = clip.max.y.min(screen.height).ceil();
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some([x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32])
}

/// [`RenderingProvider`] for one window frame. Draw commands are recorded
/// with the clip of the region they were issued in and rendered afterwards.
pub(crate) struct FrameProvider<'g> {
    gpu: &'g mut Gpu,
    frame: u64,
    regions: RegionStack,
    pointer: PointerState,
    cmds: Vec<(DrawCmd, Box2D)>,
}

impl<'g> FrameProvider<'g> {
    pub(crate) fn new(gpu: &'g mut Gpu, frame: u64, pointer: PointerState) -> Self {
        let regions = RegionStack::new(gpu.size());
        Self {
            gpu,
            frame,
            regions,
            pointer,
            cmds: Vec::new(),
        }
    }

    /// Renders the recorded commands.
    pub(crate) fn finish(self, background: Color) -> Result<(), wgpu::SurfaceError> {
        debug_assert_eq!(self.regions.depth(), 0, "frame ended with open child regions");
        self.gpu.render(&self.cmds, background)
    }
}

impl RenderingProvider for FrameProvider<'_> {
    fn frame_index(&self) -> u64 {
        self.frame
    }

    fn region(&self) -> Box2D {
        self.regions.current()
    }

    fn begin_child(&mut self, _name: &str, size: Option<Size>) -> Box2D {
        self.regions.push_child(size)
    }

    fn end_child(&mut self) {
        self.regions.pop();
    }

    fn pointer(&self) -> PointerState {
        self.pointer
    }

    fn upload_texture(&mut self, data: TextureData) -> TextureId {
        self.gpu.upload(&data)
    }

    fn remove_texture(&mut self, id: TextureId) {
        self.gpu.remove(id);
    }

    fn draw(&mut self, cmd: DrawCmd) {
        let clip = self.regions.current();
        self.cmds.push((cmd, clip));
    }
}
