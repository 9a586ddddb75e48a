/// Framebuffer for software rendering
/// Stores color and depth information in layout-aware `Buffer`s.
///
/// Parallel rasterization never shares the framebuffer directly. It is split
/// into fixed `FrameTile`s, each an exclusive view of one rectangle of both
/// buffers, and a tile is handed to exactly one task at a time.
use super::buffer::{Buffer, BufferIndexer, BufferLayout};
use crate::count_call;
use crate::error::{RenderError, Result};
use glam::Vec4;
use std::marker::PhantomData;

/// 8-bit RGBA color, straight (non-premultiplied) alpha.
pub type Rgba = [u8; 4];

/// Convert a [0, 1] color to 8 bits per channel. Truncates, so 0.5 maps to 127.
#[inline]
pub fn pack_rgba(color: Vec4) -> Rgba {
    let c = color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0;
    [c.x as u8, c.y as u8, c.z as u8, c.w as u8]
}

#[inline]
pub fn unpack_rgba(color: Rgba) -> Vec4 {
    Vec4::new(
        color[0] as f32,
        color[1] as f32,
        color[2] as f32,
        color[3] as f32,
    ) / 255.0
}

pub struct FrameBuffer {
    // Hot data: used for every bounds check
    width: usize,
    height: usize,
    color: Buffer<Rgba>,
    depth: Buffer<f32>,
}

impl FrameBuffer {
    pub fn new(
        width: usize,
        height: usize,
        color_layout: BufferLayout,
        depth_layout: BufferLayout,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            color: Buffer::new(width, height, color_layout),
            depth: Buffer::new(width, height, depth_layout),
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Clear color and depth buffers
    pub fn clear(&mut self, color: Rgba, depth: f32) {
        count_call!(crate::perf::FUNCTION_COUNTERS.framebuffer_clears);
        self.color.fill(color);
        self.depth.fill(depth);
    }

    #[inline]
    pub fn color(&self) -> &Buffer<Rgba> {
        &self.color
    }

    #[inline]
    pub fn depth(&self) -> &Buffer<f32> {
        &self.depth
    }

    #[inline]
    pub fn color_at(&self, x: usize, y: usize) -> Option<Rgba> {
        self.color.get(x, y)
    }

    #[inline]
    pub fn depth_at(&self, x: usize, y: usize) -> Option<f32> {
        self.depth.get(x, y)
    }

    /// Number of tiles along each axis for a given tile edge length.
    pub fn tile_grid(&self, tile_size: usize) -> (usize, usize) {
        let tile_size = tile_size.max(1);
        (
            self.width.div_ceil(tile_size),
            self.height.div_ceil(tile_size),
        )
    }

    /// Split the framebuffer into square tiles, row-major, so that tile
    /// `(tx, ty)` is at index `ty * tiles_x + tx`. Edge tiles are cropped.
    /// The tiles borrow the framebuffer mutably, so no other access can
    /// happen while any of them is alive.
    pub fn tiles_mut(&mut self, tile_size: usize) -> Vec<FrameTile<'_>> {
        let tile_size = tile_size.max(1);
        let (tiles_x, tiles_y) = self.tile_grid(tile_size);
        let (width, height) = (self.width, self.height);
        let template = self.full_tile_mut();
        let mut tiles = Vec::with_capacity(tiles_x * tiles_y);

        for ty in 0..tiles_y {
            for tx in 0..tiles_x {
                let x0 = tx * tile_size;
                let y0 = ty * tile_size;
                tiles.push(FrameTile {
                    x0,
                    y0,
                    x1: (x0 + tile_size).min(width),
                    y1: (y0 + tile_size).min(height),
                    ..template
                });
            }
        }

        tiles
    }

    /// A single tile covering the whole framebuffer, for the serial line and
    /// point paths.
    pub fn full_tile_mut(&mut self) -> FrameTile<'_> {
        FrameTile {
            x0: 0,
            y0: 0,
            x1: self.width,
            y1: self.height,
            color_ptr: self.color.as_mut_ptr(),
            depth_ptr: self.depth.as_mut_ptr(),
            color_index: self.color.indexer(),
            depth_index: self.depth.indexer(),
            _frame: PhantomData,
        }
    }
}

/// Exclusive view into a rectangular tile of the framebuffer.
///
/// Internally it holds raw pointers into both backing buffers. Every access
/// is checked against the tile rectangle, and `FrameBuffer::tiles_mut` only
/// hands out disjoint rectangles, so no two live tiles ever alias a pixel.
pub struct FrameTile<'a> {
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,
    color_ptr: *mut Rgba,
    depth_ptr: *mut f32,
    color_index: BufferIndexer,
    depth_index: BufferIndexer,
    _frame: PhantomData<&'a mut FrameBuffer>,
}

// Safety: a FrameTile only carries pointers into its own rectangle, and the
// rectangles of tiles created together never overlap, so moving a tile to
// another thread cannot create a data race.
unsafe impl Send for FrameTile<'_> {}

impl FrameTile<'_> {
    /// Tile bounds: (x0, y0, x1, y1), half-open, in framebuffer coordinates.
    #[inline(always)]
    pub fn bounds(&self) -> (usize, usize, usize, usize) {
        (self.x0, self.y0, self.x1, self.y1)
    }

    #[inline(always)]
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }

    #[inline]
    pub fn depth(&self, x: usize, y: usize) -> Option<f32> {
        if !self.contains(x, y) {
            return None;
        }
        // Safety: (x, y) lies inside this tile, which lies inside the buffer.
        Some(unsafe { *self.depth_ptr.add(self.depth_index.index(x, y)) })
    }

    #[inline]
    pub fn set_depth(&mut self, x: usize, y: usize, depth: f32) {
        if self.contains(x, y) {
            // Safety: see `depth`; `&mut self` makes this the only writer.
            unsafe { *self.depth_ptr.add(self.depth_index.index(x, y)) = depth };
        }
    }

    #[inline]
    pub fn color(&self, x: usize, y: usize) -> Option<Rgba> {
        if !self.contains(x, y) {
            return None;
        }
        // Safety: see `depth`.
        Some(unsafe { *self.color_ptr.add(self.color_index.index(x, y)) })
    }

    #[inline]
    pub fn set_color(&mut self, x: usize, y: usize, color: Rgba) {
        if self.contains(x, y) {
            // Safety: see `set_depth`.
            unsafe { *self.color_ptr.add(self.color_index.index(x, y)) = color };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fb(w: usize, h: usize) -> FrameBuffer {
        FrameBuffer::new(w, h, BufferLayout::Morton, BufferLayout::Tiled).unwrap()
    }

    #[test]
    fn rejects_zero_dimensions() {
        assert!(FrameBuffer::new(0, 10, BufferLayout::Linear, BufferLayout::Linear).is_err());
        assert!(FrameBuffer::new(10, 0, BufferLayout::Linear, BufferLayout::Linear).is_err());
    }

    #[test]
    fn pack_truncates_and_clamps() {
        assert_eq!(pack_rgba(Vec4::new(0.5, 0.0, 1.0, 2.0)), [127, 0, 255, 255]);
        assert_eq!(pack_rgba(Vec4::new(-1.0, 1.0, 0.0, 1.0)), [0, 255, 0, 255]);
        assert_eq!(unpack_rgba([255, 0, 0, 255]), Vec4::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn clear_fills_both_buffers() {
        let mut fb = fb(40, 30);
        fb.clear([1, 2, 3, 4], 0.25);
        assert_eq!(fb.color_at(39, 29), Some([1, 2, 3, 4]));
        assert_eq!(fb.depth_at(0, 0), Some(0.25));
        assert_eq!(fb.color_at(40, 0), None);
    }

    #[test]
    fn tiles_partition_the_framebuffer() {
        let mut fb = fb(70, 40);
        let tiles = fb.tiles_mut(32);
        // 3 columns (32, 32, 6) by 2 rows (32, 8)
        assert_eq!(tiles.len(), 6);
        assert_eq!(tiles[2].bounds(), (64, 0, 70, 32));
        assert_eq!(tiles[5].bounds(), (64, 32, 70, 40));

        let mut covered = vec![0u8; 70 * 40];
        for tile in &tiles {
            let (x0, y0, x1, y1) = tile.bounds();
            for y in y0..y1 {
                for x in x0..x1 {
                    covered[y * 70 + x] += 1;
                }
            }
        }
        assert!(covered.iter().all(|&c| c == 1));
    }

    #[test]
    fn tile_writes_land_in_framebuffer() {
        let mut fb = fb(64, 64);
        {
            let mut tiles = fb.tiles_mut(32);
            let tile = &mut tiles[3];
            tile.set_color(40, 40, [9, 9, 9, 9]);
            tile.set_depth(40, 40, 0.75);
            // Outside this tile: ignored.
            tile.set_color(0, 0, [1, 1, 1, 1]);
            assert_eq!(tile.color(0, 0), None);
        }
        assert_eq!(fb.color_at(40, 40), Some([9, 9, 9, 9]));
        assert_eq!(fb.depth_at(40, 40), Some(0.75));
        assert_eq!(fb.color_at(0, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn tiles_can_be_filled_in_parallel() {
        use rayon::prelude::*;
        let mut fb = fb(100, 70);
        fb.tiles_mut(16).into_par_iter().for_each(|mut tile| {
            let (x0, y0, x1, y1) = tile.bounds();
            for y in y0..y1 {
                for x in x0..x1 {
                    tile.set_color(x, y, [x as u8, y as u8, 0, 255]);
                }
            }
        });
        for y in 0..70 {
            for x in 0..100 {
                assert_eq!(fb.color_at(x, y), Some([x as u8, y as u8, 0, 255]));
            }
        }
    }
}
