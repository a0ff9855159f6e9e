pub mod frame;
pub mod geometry;
pub mod tracer;

pub use frame::{FrameRenderer, RenderConfig, RenderError};
pub use geometry::ColumnGeometry;
pub use tracer::{trace_column, FrameContext};
