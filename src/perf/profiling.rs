/// Instrumentation for pipeline microoptimization
/// Provides call and event counting behind the `profiling` feature
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe performance counters for pipeline stage tracking
pub struct FunctionCounters {
    // Draw counters
    pub draw_calls: AtomicU64,
    pub vertices_shaded: AtomicU64,

    // Geometry counters
    pub triangles_submitted: AtomicU64,
    pub triangles_clipped: AtomicU64,
    pub triangles_culled: AtomicU64,
    pub vertices_synthesized: AtomicU64,

    // Rasterization counters
    pub tiles_dispatched: AtomicU64,
    pub quads_tested: AtomicU64,
    pub quads_covered: AtomicU64,

    // Pixel counters
    pub depth_tests: AtomicU64,
    pub depth_passed: AtomicU64,
    pub depth_failed: AtomicU64,
    pub fragments_shaded: AtomicU64,
    pub fragments_discarded: AtomicU64,

    // Primitive counters
    pub line_pixels: AtomicU64,
    pub point_pixels: AtomicU64,

    // Framebuffer counters
    pub framebuffer_clears: AtomicU64,
}

impl FunctionCounters {
    pub const fn new() -> Self {
        Self {
            draw_calls: AtomicU64::new(0),
            vertices_shaded: AtomicU64::new(0),
            triangles_submitted: AtomicU64::new(0),
            triangles_clipped: AtomicU64::new(0),
            triangles_culled: AtomicU64::new(0),
            vertices_synthesized: AtomicU64::new(0),
            tiles_dispatched: AtomicU64::new(0),
            quads_tested: AtomicU64::new(0),
            quads_covered: AtomicU64::new(0),
            depth_tests: AtomicU64::new(0),
            depth_passed: AtomicU64::new(0),
            depth_failed: AtomicU64::new(0),
            fragments_shaded: AtomicU64::new(0),
            fragments_discarded: AtomicU64::new(0),
            line_pixels: AtomicU64::new(0),
            point_pixels: AtomicU64::new(0),
            framebuffer_clears: AtomicU64::new(0),
        }
    }

    fn all(&self) -> [&AtomicU64; 17] {
        [
            &self.draw_calls,
            &self.vertices_shaded,
            &self.triangles_submitted,
            &self.triangles_clipped,
            &self.triangles_culled,
            &self.vertices_synthesized,
            &self.tiles_dispatched,
            &self.quads_tested,
            &self.quads_covered,
            &self.depth_tests,
            &self.depth_passed,
            &self.depth_failed,
            &self.fragments_shaded,
            &self.fragments_discarded,
            &self.line_pixels,
            &self.point_pixels,
            &self.framebuffer_clears,
        ]
    }

    /// Reset all counters to zero
    pub fn reset(&self) {
        for counter in self.all() {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> CounterSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CounterSnapshot {
            draw_calls: load(&self.draw_calls),
            vertices_shaded: load(&self.vertices_shaded),
            triangles_submitted: load(&self.triangles_submitted),
            triangles_clipped: load(&self.triangles_clipped),
            triangles_culled: load(&self.triangles_culled),
            vertices_synthesized: load(&self.vertices_synthesized),
            tiles_dispatched: load(&self.tiles_dispatched),
            quads_tested: load(&self.quads_tested),
            quads_covered: load(&self.quads_covered),
            depth_tests: load(&self.depth_tests),
            depth_passed: load(&self.depth_passed),
            depth_failed: load(&self.depth_failed),
            fragments_shaded: load(&self.fragments_shaded),
            fragments_discarded: load(&self.fragments_discarded),
            line_pixels: load(&self.line_pixels),
            point_pixels: load(&self.point_pixels),
            framebuffer_clears: load(&self.framebuffer_clears),
        }
    }
}

impl Default for FunctionCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of counter values at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub draw_calls: u64,
    pub vertices_shaded: u64,
    pub triangles_submitted: u64,
    pub triangles_clipped: u64,
    pub triangles_culled: u64,
    pub vertices_synthesized: u64,
    pub tiles_dispatched: u64,
    pub quads_tested: u64,
    pub quads_covered: u64,
    pub depth_tests: u64,
    pub depth_passed: u64,
    pub depth_failed: u64,
    pub fragments_shaded: u64,
    pub fragments_discarded: u64,
    pub line_pixels: u64,
    pub point_pixels: u64,
    pub framebuffer_clears: u64,
}

impl CounterSnapshot {
    /// Print formatted report
    pub fn print_report(&self) {
        println!("\n=== Performance Counters Report ===");
        println!("\nDraw Operations:");
        println!("  draw calls:                 {:12}", self.draw_calls);
        println!("  vertices shaded:            {:12}", self.vertices_shaded);

        println!("\nGeometry Operations:");
        println!("  triangles submitted:        {:12}", self.triangles_submitted);
        println!("  triangles clipped:          {:12}", self.triangles_clipped);
        println!("  triangles culled:           {:12}", self.triangles_culled);
        println!("  vertices synthesized:       {:12}", self.vertices_synthesized);

        println!("\nRasterization Operations:");
        println!("  tiles dispatched:           {:12}", self.tiles_dispatched);
        println!("  quads tested:               {:12}", self.quads_tested);
        println!("  quads covered:              {:12}", self.quads_covered);
        if self.quads_tested > 0 {
            let coverage = (self.quads_covered as f64 / self.quads_tested as f64) * 100.0;
            println!("  quad coverage rate:         {:11.2}%", coverage);
        }

        println!("\nPixel Operations:");
        println!("  depth tests:                {:12}", self.depth_tests);
        println!("  depth test passed:          {:12}", self.depth_passed);
        println!("  depth test failed:          {:12}", self.depth_failed);
        if self.depth_tests > 0 {
            let pass_rate = (self.depth_passed as f64 / self.depth_tests as f64) * 100.0;
            println!("  depth test pass rate:       {:11.2}%", pass_rate);
        }
        println!("  fragments shaded:           {:12}", self.fragments_shaded);
        println!("  fragments discarded:        {:12}", self.fragments_discarded);

        println!("\nPrimitive Operations:");
        println!("  line pixels:                {:12}", self.line_pixels);
        println!("  point pixels:               {:12}", self.point_pixels);

        println!("\nFramebuffer Operations:");
        println!("  framebuffer clears:         {:12}", self.framebuffer_clears);

        println!();
    }
}

/// Global function counters instance
pub static FUNCTION_COUNTERS: FunctionCounters = FunctionCounters::new();

/// Macro for incrementing a counter (only when profiling feature is enabled)
#[macro_export]
macro_rules! count_call {
    ($counter:expr) => {
        #[cfg(feature = "profiling")]
        {
            $counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    };
}

/// Macro for adding to a counter (only when profiling feature is enabled)
#[macro_export]
macro_rules! count_add {
    ($counter:expr, $value:expr) => {
        #[cfg(feature = "profiling")]
        {
            $counter.fetch_add($value as u64, std::sync::atomic::Ordering::Relaxed);
        }
    };
}
