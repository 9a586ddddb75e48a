/// Textures sampled from fragment shaders.
///
/// Texels live in Morton-ordered `Buffer`s, one per mip level, because
/// neighbouring pixels of a triangle read neighbouring texels in both axes.
/// Sampling is nearest-texel with wrap addressing; the mip level is the
/// rounded `lod` supplied by the shader from quad derivatives.
use super::buffer::{Buffer, BufferLayout};
use super::framebuffer::{unpack_rgba, Rgba};
use crate::error::{RenderError, Result};
use glam::{Vec2, Vec4};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Anything a fragment shader can sample a resolved color from.
pub trait Sampler2D {
    fn sample(&self, uv: Vec2, lod: f32) -> Vec4;
}

#[derive(Clone, Debug)]
pub struct Texture {
    levels: Vec<Buffer<Rgba>>,
}

impl Texture {
    /// Texture with a single level from raster-order texels.
    pub fn new(width: usize, height: usize, texels: &[Rgba]) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidTexture(format!(
                "zero-sized texture {width}x{height}"
            )));
        }
        if texels.len() != width * height {
            return Err(RenderError::InvalidTexture(format!(
                "{} texels supplied for a {width}x{height} texture",
                texels.len()
            )));
        }

        let mut base = Buffer::new(width, height, BufferLayout::Morton);
        for (i, &texel) in texels.iter().enumerate() {
            base.set(i % width, i / width, texel);
        }
        Ok(Self { levels: vec![base] })
    }

    /// Two-color checkerboard with `cell`-texel squares.
    pub fn checkerboard(size: usize, cell: usize, a: Rgba, b: Rgba) -> Result<Self> {
        let cell = cell.max(1);
        let texels: Vec<Rgba> = (0..size * size)
            .map(|i| {
                let (x, y) = (i % size, i / size);
                if ((x / cell) + (y / cell)) % 2 == 0 {
                    a
                } else {
                    b
                }
            })
            .collect();
        Self::new(size, size, &texels)
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.levels[0].width()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.levels[0].height()
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width() as f32, self.height() as f32)
    }

    #[inline]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, level: usize) -> Option<&Buffer<Rgba>> {
        self.levels.get(level)
    }

    /// Build the full mip chain down to 1×1 with a 2×2 box filter.
    pub fn generate_mipmaps(&mut self) {
        self.levels.truncate(1);
        loop {
            let Some(prev) = self.levels.last() else {
                return;
            };
            let (w, h) = (prev.width(), prev.height());
            if w == 1 && h == 1 {
                return;
            }

            let (nw, nh) = ((w / 2).max(1), (h / 2).max(1));
            let mut next = Buffer::new(nw, nh, BufferLayout::Morton);
            for y in 0..nh {
                for x in 0..nw {
                    let mut sum = [0u32; 4];
                    for (sx, sy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                        let texel = prev
                            .get((x * 2 + sx).min(w - 1), (y * 2 + sy).min(h - 1))
                            .unwrap_or_default();
                        for (acc, c) in sum.iter_mut().zip(texel) {
                            *acc += c as u32;
                        }
                    }
                    next.set(x, y, sum.map(|c| ((c + 2) / 4) as u8));
                }
            }
            self.levels.push(next);
        }
    }

    /// Nearest texel of `level` with wrap addressing.
    pub fn fetch(&self, uv: Vec2, level: usize) -> Rgba {
        let buffer = &self.levels[level.min(self.levels.len() - 1)];
        let (w, h) = (buffer.width(), buffer.height());
        let u = uv.x - uv.x.floor();
        let v = uv.y - uv.y.floor();
        let x = ((u * w as f32) as usize).min(w - 1);
        let y = ((v * h as f32) as usize).min(h - 1);
        buffer.get(x, y).unwrap_or_default()
    }
}

impl Sampler2D for Texture {
    #[inline]
    fn sample(&self, uv: Vec2, lod: f32) -> Vec4 {
        let level = lod.max(0.0).round() as usize;
        unpack_rgba(self.fetch(uv, level))
    }
}

/// Mip chain generation running on its own thread.
pub struct MipmapTask {
    handle: JoinHandle<Texture>,
}

impl MipmapTask {
    pub fn spawn(mut texture: Texture) -> Self {
        let handle = std::thread::spawn(move || {
            texture.generate_mipmaps();
            log::debug!(
                "generated {} mip levels for {}x{} texture",
                texture.level_count(),
                texture.width(),
                texture.height()
            );
            texture
        });
        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the chain is built.
    pub fn wait(self) -> Result<Texture> {
        self.handle
            .join()
            .map_err(|_| RenderError::TaskPanicked("mipmap generation".into()))
    }
}

/// Shared textures keyed by name, e.g. asset path.
#[derive(Default)]
pub struct TextureCache {
    entries: Mutex<HashMap<String, Arc<Texture>>>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<Texture>> {
        self.lock().get(key).cloned()
    }

    /// Return the cached texture for `key`, creating it with `create` on a
    /// miss. A failed creation caches nothing.
    pub fn get_or_insert_with<F>(&self, key: &str, create: F) -> Result<Arc<Texture>>
    where
        F: FnOnce() -> Result<Texture>,
    {
        let mut entries = self.lock();
        if let Some(texture) = entries.get(key) {
            return Ok(Arc::clone(texture));
        }
        let texture = Arc::new(create()?);
        entries.insert(key.to_owned(), Arc::clone(&texture));
        Ok(texture)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Texture>>> {
        // A poisoned map is still structurally valid.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba = [255, 255, 255, 255];
    const BLACK: Rgba = [0, 0, 0, 255];

    #[test]
    fn rejects_mismatched_texels() {
        assert!(Texture::new(2, 2, &[WHITE; 3]).is_err());
        assert!(Texture::new(0, 2, &[]).is_err());
    }

    #[test]
    fn nearest_sampling_with_wrap() {
        let tex = Texture::new(2, 1, &[WHITE, BLACK]).unwrap();
        assert_eq!(tex.fetch(Vec2::new(0.25, 0.5), 0), WHITE);
        assert_eq!(tex.fetch(Vec2::new(0.75, 0.5), 0), BLACK);
        assert_eq!(tex.fetch(Vec2::new(1.25, 0.5), 0), WHITE);
        assert_eq!(tex.fetch(Vec2::new(-0.25, 0.5), 0), BLACK);
    }

    #[test]
    fn mip_chain_averages_down_to_one_texel() {
        let mut tex = Texture::checkerboard(8, 1, WHITE, BLACK).unwrap();
        tex.generate_mipmaps();
        assert_eq!(tex.level_count(), 4);
        assert_eq!(tex.level(3).map(|l| (l.width(), l.height())), Some((1, 1)));

        // A 1-texel checkerboard averages to mid grey at level 1.
        let grey = tex.sample(Vec2::new(0.5, 0.5), 1.0);
        assert!((grey.x - 0.5).abs() < 0.01, "{grey:?}");
        // Level 0 keeps the pattern.
        assert_eq!(tex.sample(Vec2::new(0.01, 0.01), 0.2), Vec4::ONE);
    }

    #[test]
    fn mipmap_task_runs_in_background() {
        let tex = Texture::checkerboard(16, 2, WHITE, BLACK).unwrap();
        let task = MipmapTask::spawn(tex);
        let done = task.wait().unwrap();
        assert_eq!(done.level_count(), 5);
    }

    #[test]
    fn cache_creates_once() {
        let cache = TextureCache::new();
        let mut created = 0;
        for _ in 0..3 {
            let tex = cache
                .get_or_insert_with("checker", || {
                    created += 1;
                    Texture::checkerboard(4, 1, WHITE, BLACK)
                })
                .unwrap();
            assert_eq!(tex.width(), 4);
        }
        assert_eq!(created, 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("checker").is_some());
        assert!(cache.get("missing").is_none());

        assert!(cache
            .get_or_insert_with("bad", || Texture::new(1, 1, &[]))
            .is_err());
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
