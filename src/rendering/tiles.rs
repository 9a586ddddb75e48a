/// Screen-space binning of faces into fixed framebuffer tiles
///
/// Key Design Principles:
/// 1. Tiles are a fixed grid over the framebuffer (default 32×32)
/// 2. Each face is appended to the bin of every tile its bounding box touches
/// 3. Bins keep submission order, so a tile replays its faces in draw order
/// 4. One task owns one tile, so no pixel is ever written by two tasks
use super::rasterizer::PixelRect;

/// Per-tile face lists for one draw call.
pub struct TileBins {
    pub tile_size: usize,
    /// Number of tiles horizontally
    pub tiles_x: usize,
    /// Number of tiles vertically
    pub tiles_y: usize,
    /// Per-tile face lists (tile_index -> face indices)
    bins: Vec<Vec<u32>>,
}

impl TileBins {
    pub fn new(width: usize, height: usize, tile_size: usize) -> Self {
        let tile_size = tile_size.max(1);
        let tiles_x = width.div_ceil(tile_size);
        let tiles_y = height.div_ceil(tile_size);

        Self {
            tile_size,
            tiles_x,
            tiles_y,
            bins: vec![Vec::new(); tiles_x * tiles_y],
        }
    }

    #[inline]
    pub fn tile_count(&self) -> usize {
        self.bins.len()
    }

    /// Clear all bins (reuse allocations)
    pub fn clear(&mut self) {
        for bin in &mut self.bins {
            bin.clear();
        }
    }

    /// Add a face to every tile overlapped by `rect`.
    pub fn add(&mut self, face: u32, rect: &PixelRect) {
        let start_x = rect.min_x / self.tile_size;
        let start_y = rect.min_y / self.tile_size;
        let end_x = (rect.max_x / self.tile_size).min(self.tiles_x.saturating_sub(1));
        let end_y = (rect.max_y / self.tile_size).min(self.tiles_y.saturating_sub(1));

        for ty in start_y..=end_y {
            for tx in start_x..=end_x {
                self.bins[ty * self.tiles_x + tx].push(face);
            }
        }
    }

    /// Face list for tile `(tile_x, tile_y)`.
    #[inline]
    pub fn bin(&self, tile_x: usize, tile_y: usize) -> &[u32] {
        &self.bins[tile_y * self.tiles_x + tile_x]
    }

    /// Face list by row-major tile index.
    #[inline]
    pub fn bin_at(&self, index: usize) -> &[u32] {
        &self.bins[index]
    }

    pub fn non_empty_count(&self) -> usize {
        self.bins.iter().filter(|b| !b.is_empty()).count()
    }
}
