use anyhow::Result;
use winit::dpi::PhysicalSize;

use super::programs::{Pass, PassUniforms, ProgramCache};

/// An off-screen color buffer plus the sampler used to read it back.
pub struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl RenderTarget {
    pub(crate) fn new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        linear_filtering: bool,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let filter = if linear_filtering {
            wgpu::FilterMode::Linear
        } else {
            wgpu::FilterMode::Nearest
        };
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            width: width.max(1),
            height: height.max(1),
            format,
        }
    }

    /// Reciprocal of the grid dimensions, used to convert neighbor offsets
    /// into normalized sampling coordinates.
    pub fn texel_size(&self) -> [f32; 2] {
        [1.0 / self.width as f32, 1.0 / self.height as f32]
    }

    pub(crate) fn binding(&self) -> (&wgpu::TextureView, &wgpu::Sampler) {
        (&self.view, &self.sampler)
    }
}

/// Same-sized read/write pair. `swap` exchanges the designations in O(1)
/// without touching pixel data; read and write are always distinct targets.
pub struct DoubleBuffer<T = RenderTarget> {
    read: T,
    write: T,
}

impl<T> DoubleBuffer<T> {
    pub fn from_pair(read: T, write: T) -> Self {
        Self { read, write }
    }

    pub fn read(&self) -> &T {
        &self.read
    }

    pub fn write(&self) -> &T {
        &self.write
    }

    pub fn swap(&mut self) {
        std::mem::swap(&mut self.read, &mut self.write);
    }
}

impl DoubleBuffer<RenderTarget> {
    pub(crate) fn new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        linear_filtering: bool,
    ) -> Self {
        Self::from_pair(
            RenderTarget::new(device, label, width, height, format, linear_filtering),
            RenderTarget::new(device, label, width, height, format, linear_filtering),
        )
    }

    /// Reallocates both halves at a new size. The read buffer's visual content
    /// is preserved by rendering it through the copy program into the new
    /// target; the write buffer starts fresh. Never resizes in place.
    pub(crate) fn resize(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        programs: &mut ProgramCache,
        label: &str,
        width: u32,
        height: u32,
        linear_filtering: bool,
    ) -> Result<()> {
        let new_read =
            RenderTarget::new(device, label, width, height, self.read.format, linear_filtering);

        let mut uniforms = PassUniforms::new();
        uniforms.set_target_texel(new_read.texel_size());
        programs.encode_pass(
            encoder,
            Pass::Copy,
            &[],
            &uniforms,
            &[self.read.binding()],
            &new_read.view,
            new_read.format,
            Some(wgpu::Color::TRANSPARENT),
        )?;

        self.read = new_read;
        self.write =
            RenderTarget::new(device, label, width, height, self.read.format, linear_filtering);
        Ok(())
    }
}

/// Maps a nominal resolution onto the surface's aspect ratio: the long axis
/// gets `round(resolution * aspect)` texels, the short axis
/// `round(resolution)`, keeping grid cells close to square.
pub fn grid_size(resolution: u32, surface: PhysicalSize<u32>) -> (u32, u32) {
    let width = surface.width.max(1) as f32;
    let height = surface.height.max(1) as f32;
    let mut aspect = width / height;
    if aspect < 1.0 {
        aspect = 1.0 / aspect;
    }

    let short = (resolution as f32).round().max(1.0) as u32;
    let long = (resolution as f32 * aspect).round().max(1.0) as u32;

    if surface.width > surface.height {
        (long, short)
    } else {
        (short, long)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_is_involutive() {
        let mut buffer = DoubleBuffer::from_pair('a', 'b');
        assert_eq!(*buffer.read(), 'a');
        buffer.swap();
        assert_eq!(*buffer.read(), 'b');
        assert_eq!(*buffer.write(), 'a');
        buffer.swap();
        assert_eq!(*buffer.read(), 'a');
        assert_eq!(*buffer.write(), 'b');
    }

    #[test]
    fn grid_follows_longer_axis() {
        let landscape = grid_size(128, PhysicalSize::new(1920, 1080));
        assert_eq!(landscape.1, 128);
        assert!(landscape.0 > landscape.1);

        let portrait = grid_size(128, PhysicalSize::new(1080, 1920));
        assert_eq!(portrait.0, 128);
        assert!(portrait.1 > portrait.0);
    }

    #[test]
    fn grid_preserves_aspect() {
        let (w, h) = grid_size(128, PhysicalSize::new(800, 600));
        let aspect: f32 = 800.0 / 600.0;
        assert_eq!(h, 128);
        assert_eq!(w, (128.0 * aspect).round() as u32);
    }

    #[test]
    fn square_surface_yields_square_grid() {
        assert_eq!(grid_size(128, PhysicalSize::new(512, 512)), (128, 128));
    }

    #[test]
    fn degenerate_surface_is_clamped() {
        let (w, h) = grid_size(128, PhysicalSize::new(0, 0));
        assert!(w >= 1 && h >= 1);
    }
}
