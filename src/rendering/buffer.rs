/// Generic 2D pixel storage with selectable memory layout
///
/// Key Design Principles:
/// 1. Linear: plain row-major storage, index = x + y * width
/// 2. Tiled: 4×4 blocks stored contiguously (16 pixels per block)
/// 3. Morton: 32×32 blocks, Z-order curve inside each block
///
/// The layout is picked once at construction; index computation is a single
/// `match` on a `Copy` indexer so the hot per-pixel path never goes through
/// dynamic dispatch. None of the layouts change behaviour, only locality.
/// Anything that needs raster-order pixels must go through `copy_to`.

/// Edge length of a block in the `Tiled` layout.
pub const TILED_BLOCK_SIZE: usize = 4;

/// Edge length of a block in the `Morton` layout.
pub const MORTON_BLOCK_SIZE: usize = 32;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum BufferLayout {
    #[default]
    Linear,
    Tiled,
    Morton,
}

impl BufferLayout {
    /// Edge length of one storage block (1 for linear).
    #[inline]
    pub const fn block_size(self) -> usize {
        match self {
            BufferLayout::Linear => 1,
            BufferLayout::Tiled => TILED_BLOCK_SIZE,
            BufferLayout::Morton => MORTON_BLOCK_SIZE,
        }
    }

    #[inline]
    const fn block_bits(self) -> u32 {
        self.block_size().trailing_zeros()
    }
}

/// Spread the low 5 bits of a coordinate so they occupy the even bit positions.
/// In-block Morton coordinates never exceed 31, so a table covers every case.
const MORTON_SPREAD: [u16; MORTON_BLOCK_SIZE] = build_morton_spread();

const fn build_morton_spread() -> [u16; MORTON_BLOCK_SIZE] {
    let mut table = [0u16; MORTON_BLOCK_SIZE];
    let mut i = 0;
    while i < MORTON_BLOCK_SIZE {
        let mut spread = 0u16;
        let mut bit = 0;
        while bit < 5 {
            if (i >> bit) & 1 == 1 {
                spread |= 1 << (bit * 2);
            }
            bit += 1;
        }
        table[i] = spread;
        i += 1;
    }
    table
}

/// Layout-specific index math, detached from the storage so that tile views
/// can compute offsets without borrowing the owning buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BufferIndexer {
    layout: BufferLayout,
    inner_width: usize,
    blocks_x: usize,
}

impl BufferIndexer {
    #[inline(always)]
    pub fn index(&self, x: usize, y: usize) -> usize {
        match self.layout {
            BufferLayout::Linear => y * self.inner_width + x,
            BufferLayout::Tiled => {
                const BITS: u32 = BufferLayout::Tiled.block_bits();
                const MASK: usize = TILED_BLOCK_SIZE - 1;
                let block = (y >> BITS) * self.blocks_x + (x >> BITS);
                (block << (2 * BITS)) + ((y & MASK) << BITS) + (x & MASK)
            }
            BufferLayout::Morton => {
                const BITS: u32 = BufferLayout::Morton.block_bits();
                const MASK: usize = MORTON_BLOCK_SIZE - 1;
                let block = (y >> BITS) * self.blocks_x + (x >> BITS);
                let local = MORTON_SPREAD[x & MASK] as usize
                    | ((MORTON_SPREAD[y & MASK] as usize) << 1);
                (block << (2 * BITS)) + local
            }
        }
    }

    #[inline]
    pub fn layout(&self) -> BufferLayout {
        self.layout
    }
}

/// 2D buffer of `T` stored in one of the `BufferLayout` orders.
#[derive(Clone, Debug)]
pub struct Buffer<T> {
    width: usize,
    height: usize,
    inner_width: usize,
    inner_height: usize,
    indexer: BufferIndexer,
    data: Vec<T>,
}

impl<T: Copy + Default> Buffer<T> {
    pub fn new(width: usize, height: usize, layout: BufferLayout) -> Self {
        Self::filled(width, height, layout, T::default())
    }

    /// Allocate storage for `width × height` rounded up to whole blocks.
    pub fn filled(width: usize, height: usize, layout: BufferLayout, value: T) -> Self {
        let block = layout.block_size();
        let inner_width = width.div_ceil(block) * block;
        let inner_height = height.div_ceil(block) * block;

        Self {
            width,
            height,
            inner_width,
            inner_height,
            indexer: BufferIndexer {
                layout,
                inner_width,
                blocks_x: inner_width / block,
            },
            data: vec![value; inner_width * inner_height],
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn inner_width(&self) -> usize {
        self.inner_width
    }

    #[inline]
    pub fn inner_height(&self) -> usize {
        self.inner_height
    }

    #[inline]
    pub fn layout(&self) -> BufferLayout {
        self.indexer.layout
    }

    #[inline]
    pub fn indexer(&self) -> BufferIndexer {
        self.indexer
    }

    #[inline]
    pub fn in_bounds(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    /// Read a pixel. Out-of-range coordinates return `None`.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<T> {
        if !self.in_bounds(x, y) {
            return None;
        }
        Some(self.data[self.indexer.index(x, y)])
    }

    /// Write a pixel. Out-of-range coordinates assert in debug builds and
    /// are ignored in release builds.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        debug_assert!(
            self.in_bounds(x, y),
            "write at ({x}, {y}) outside {}x{} buffer",
            self.width,
            self.height
        );
        if !self.in_bounds(x, y) {
            return;
        }
        let idx = self.indexer.index(x, y);
        self.data[idx] = value;
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Raw storage in layout order.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub(crate) fn as_mut_ptr(&mut self) -> *mut T {
        self.data.as_mut_ptr()
    }

    /// Linearize into `dest` in raster order (`width × height` elements).
    /// With `flip_y` the last row is written first.
    pub fn copy_to(&self, dest: &mut [T], flip_y: bool) {
        debug_assert!(
            dest.len() >= self.width * self.height,
            "destination too small for {}x{} buffer",
            self.width,
            self.height
        );
        let rows = self.height.min(dest.len() / self.width.max(1));

        for y in 0..rows {
            let src_y = if flip_y { self.height - 1 - y } else { y };
            let dst_row = &mut dest[y * self.width..(y + 1) * self.width];

            if self.indexer.layout == BufferLayout::Linear {
                let start = src_y * self.inner_width;
                dst_row.copy_from_slice(&self.data[start..start + self.width]);
            } else {
                for (x, dst) in dst_row.iter_mut().enumerate() {
                    *dst = self.data[self.indexer.index(x, src_y)];
                }
            }
        }
    }

    /// Convenience wrapper around `copy_to` that allocates the destination.
    pub fn to_linear(&self, flip_y: bool) -> Vec<T> {
        let mut out = vec![T::default(); self.width * self.height];
        self.copy_to(&mut out, flip_y);
        out
    }
}
