/// Software rasterization pipeline
///
/// Stages, in draw order: vertex shading, frustum clipping, screen mapping,
/// face culling, tile binning, quad rasterization and the per-pixel pipeline.
pub mod buffer;
pub mod clipper;
pub mod depth;
pub mod framebuffer;
pub mod interpolate;
pub mod memory;
pub mod pipeline;
pub mod primitives;
pub mod rasterizer;
pub mod renderer;
pub mod shader;
pub mod shaders;
pub mod texture;
pub mod thread_pool;
pub mod tiles;
pub mod vertex;
pub mod viewport;

pub use buffer::{Buffer, BufferLayout};
pub use clipper::Clipper;
pub use depth::DepthFunc;
pub use framebuffer::{pack_rgba, unpack_rgba, FrameBuffer, FrameTile, Rgba};
pub use primitives::{Line, Point};
pub use renderer::{FrameStats, Renderer, SoftRenderer};
pub use shader::{FragmentInput, FragmentOutput, Shader, Varyings};
pub use shaders::{FlatColorShader, TexturedShader, VertexColorShader};
pub use texture::{MipmapTask, Sampler2D, Texture, TextureCache};
pub use thread_pool::ThreadPool;
pub use vertex::{ClipMask, Mesh, Vertex};
pub use viewport::{DepthRange, Viewport};
