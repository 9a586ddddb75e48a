/// Performance measurement utilities
/// Each pipeline stage can be timed and logged for optimization analysis
pub mod profiling;

pub use profiling::{CounterSnapshot, FunctionCounters, FUNCTION_COUNTERS};

use std::time::{Duration, Instant};

/// Scope timer that logs its lifetime at debug level when dropped.
pub struct PerfTimer {
    name: &'static str,
    start: Instant,
}

impl PerfTimer {
    #[inline]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for PerfTimer {
    fn drop(&mut self) {
        log::debug!("[PERF] {}: {}μs", self.name, self.elapsed().as_micros());
    }
}

/// Per-frame stage timings accumulated by the renderer
#[derive(Debug, Clone, Copy, Default)]
pub struct PerfStats {
    pub vertex_us: f64,
    pub clip_us: f64,
    pub raster_us: f64,
    pub total_us: f64,
}

impl PerfStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn print_summary(&self) {
        let pct = |v: f64| {
            if self.total_us > 0.0 {
                v / self.total_us * 100.0
            } else {
                0.0
            }
        };
        println!("\n========== PERFORMANCE SUMMARY ==========");
        println!("Vertex Shading:  {:8.2}μs ({:5.1}%)", self.vertex_us, pct(self.vertex_us));
        println!("Clip & Cull:     {:8.2}μs ({:5.1}%)", self.clip_us, pct(self.clip_us));
        println!("Rasterization:   {:8.2}μs ({:5.1}%)", self.raster_us, pct(self.raster_us));
        println!("─────────────────────────────────────────");
        println!("Total:           {:8.2}μs", self.total_us);
        println!("=========================================\n");
    }
}

/// Macro for easy performance measurement
#[macro_export]
macro_rules! perf_scope {
    ($name:expr) => {
        let _timer = $crate::perf::PerfTimer::new($name);
    };
}
