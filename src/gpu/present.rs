//! Presentation targets: a window surface, or an offscreen texture that is
//! read back into an image after every frame.

use image::RgbaImage;
use std::sync::Arc;
use tracing::{debug, info};
use wgpu::*;
use winit::window::Window;

use super::buffers::{create_buffer, map_read_blocking};
use super::context::GpuContext;
use crate::frame::{Acquire, FrameError, PresentStatus, Presenter};

/// Anything the blit pass can draw into.
pub trait RenderTarget {
    fn view(&self) -> &TextureView;
    fn format(&self) -> TextureFormat;
}

pub struct SurfaceImage {
    texture: SurfaceTexture,
    view: TextureView,
    format: TextureFormat,
}

impl RenderTarget for SurfaceImage {
    fn view(&self) -> &TextureView {
        &self.view
    }

    fn format(&self) -> TextureFormat {
        self.format
    }
}

/// Swapchain of a winit window.
pub struct SurfacePresenter {
    ctx: Arc<GpuContext>,
    window: Arc<Window>,
    surface: Surface<'static>,
    config: SurfaceConfiguration,
}

impl SurfacePresenter {
    pub fn new(
        ctx: Arc<GpuContext>,
        window: Arc<Window>,
        surface: Surface<'static>,
        immediate: bool,
    ) -> Result<Self, FrameError> {
        let caps = surface.get_capabilities(&ctx.adapter);
        // The compositor writes display-ready values; an sRGB target would
        // encode them twice.
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| FrameError::Device("surface reports no formats".into()))?;

        let present_mode = if immediate && caps.present_modes.contains(&PresentMode::Immediate) {
            PresentMode::Immediate
        } else {
            PresentMode::Fifo
        };
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(CompositeAlphaMode::Auto);

        let size = window.inner_size();
        let config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        if size.width > 0 && size.height > 0 {
            surface.configure(&ctx.device, &config);
        }
        info!(?format, ?present_mode, "configured surface");

        Ok(Self {
            ctx,
            window,
            surface,
            config,
        })
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }
}

impl Presenter for SurfacePresenter {
    type Image = SurfaceImage;

    fn acquire(&mut self) -> Result<Acquire<SurfaceImage>, FrameError> {
        if (self.config.width, self.config.height) != self.size() {
            return Ok(Acquire::OutOfDate);
        }

        let texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(SurfaceError::Lost | SurfaceError::Outdated) => return Ok(Acquire::OutOfDate),
            Err(e) => return Err(FrameError::Acquire(e.to_string())),
        };
        let suboptimal = texture.suboptimal;
        let view = texture
            .texture
            .create_view(&TextureViewDescriptor::default());
        let image = SurfaceImage {
            texture,
            view,
            format: self.config.format,
        };

        Ok(if suboptimal {
            Acquire::Suboptimal(image)
        } else {
            Acquire::Ready(image)
        })
    }

    fn present(&mut self, image: SurfaceImage) -> Result<PresentStatus, FrameError> {
        self.window.pre_present_notify();
        image.texture.present();
        Ok(PresentStatus::Presented)
    }

    fn recreate(&mut self) -> Result<(), FrameError> {
        let (width, height) = self.size();
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.ctx.device, &self.config);
        debug!(width, height, "reconfigured surface");
        Ok(())
    }

    fn size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }
}

pub struct OffscreenImage {
    view: TextureView,
}

impl RenderTarget for OffscreenImage {
    fn view(&self) -> &TextureView {
        &self.view
    }

    fn format(&self) -> TextureFormat {
        OffscreenPresenter::FORMAT
    }
}

/// Renders into a texture and reads every presented frame back.
pub struct OffscreenPresenter {
    ctx: Arc<GpuContext>,
    width: u32,
    height: u32,
    pending_size: Option<(u32, u32)>,
    texture: Texture,
    readback: Buffer,
    padded_row: u32,
    last_frame: Option<RgbaImage>,
}

impl OffscreenPresenter {
    pub const FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

    pub fn new(ctx: Arc<GpuContext>, width: u32, height: u32) -> Self {
        let (texture, readback, padded_row) = Self::allocate(&ctx.device, width, height);
        Self {
            ctx,
            width,
            height,
            pending_size: None,
            texture,
            readback,
            padded_row,
            last_frame: None,
        }
    }

    fn allocate(device: &Device, width: u32, height: u32) -> (Texture, Buffer, u32) {
        let texture = device.create_texture(&TextureDescriptor {
            label: Some("Offscreen Target"),
            size: Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: Self::FORMAT,
            usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        // Buffer rows must be 256-byte aligned.
        let padded_row = (width.max(1) * 4).next_multiple_of(COPY_BYTES_PER_ROW_ALIGNMENT);
        let readback = create_buffer(
            device,
            "Offscreen Readback",
            padded_row as u64 * height.max(1) as u64,
            BufferUsages::MAP_READ | BufferUsages::COPY_DST,
        );
        (texture, readback, padded_row)
    }

    /// Request a new size. The next acquire reports the target out of date
    /// so the frame loop recreates it.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.pending_size = Some((width, height));
    }

    pub fn last_frame(&self) -> Option<&RgbaImage> {
        self.last_frame.as_ref()
    }

    pub fn take_frame(&mut self) -> Option<RgbaImage> {
        self.last_frame.take()
    }

    fn read_back(&self) -> Result<RgbaImage, FrameError> {
        let device = &self.ctx.device;
        let mut encoder = device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("Offscreen Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: Origin3d::ZERO,
                aspect: TextureAspect::All,
            },
            ImageCopyBuffer {
                buffer: &self.readback,
                layout: ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_row),
                    rows_per_image: Some(self.height),
                },
            },
            Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        self.ctx.queue.submit(Some(encoder.finish()));

        let padded: Vec<u8> = map_read_blocking(
            device,
            &self.readback,
            (self.padded_row * self.height) as usize,
        )
        .map_err(FrameError::Readback)?;

        let row = (self.width * 4) as usize;
        let mut pixels = Vec::with_capacity(row * self.height as usize);
        for chunk in padded.chunks(self.padded_row as usize) {
            pixels.extend_from_slice(&chunk[..row]);
        }
        RgbaImage::from_raw(self.width, self.height, pixels)
            .ok_or_else(|| FrameError::Readback("readback size mismatch".into()))
    }
}

impl Presenter for OffscreenPresenter {
    type Image = OffscreenImage;

    fn acquire(&mut self) -> Result<Acquire<OffscreenImage>, FrameError> {
        if self.pending_size.is_some() {
            return Ok(Acquire::OutOfDate);
        }
        let view = self.texture.create_view(&TextureViewDescriptor::default());
        Ok(Acquire::Ready(OffscreenImage { view }))
    }

    fn present(&mut self, _image: OffscreenImage) -> Result<PresentStatus, FrameError> {
        self.last_frame = Some(self.read_back()?);
        Ok(PresentStatus::Presented)
    }

    fn recreate(&mut self) -> Result<(), FrameError> {
        if let Some((width, height)) = self.pending_size.take() {
            let (texture, readback, padded_row) =
                Self::allocate(&self.ctx.device, width, height);
            self.texture = texture;
            self.readback = readback;
            self.padded_row = padded_row;
            self.width = width;
            self.height = height;
        }
        Ok(())
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
