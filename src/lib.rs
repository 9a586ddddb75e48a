/// soft_raster - CPU implementation of the programmable rasterization pipeline
/// Built from small, separately benchmarkable stages
pub mod config;
pub mod error;
pub mod perf;
pub mod rendering;

pub use config::RenderConfig;
pub use error::{RenderError, Result};
pub use perf::{CounterSnapshot, FunctionCounters, FUNCTION_COUNTERS};
pub use rendering::{
    Buffer, BufferLayout, DepthFunc, FlatColorShader, FragmentInput, FragmentOutput, Line, Mesh, Point, Renderer,
    Rgba, Shader, SoftRenderer, TexturedShader, Texture, Varyings, Vertex, VertexColorShader,
};
