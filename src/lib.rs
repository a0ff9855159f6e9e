//! 体素空间地形渲染引擎
//!
//! 地形是一张高度场加颜色场的环面网格，渲染器对每个屏幕列从摄像机出发
//! 步进一条光线，把采样到的地形高度透视投影成该列的像素条，并按距离做
//! 粗粒度的暗化。每帧由固定大小的线程池并行追踪，汇合后合成为一张完整
//! 的行主序 RGB 图像。

pub mod camera;
pub mod rendering;
pub mod world;

pub use camera::Camera;
pub use rendering::{FrameRenderer, RenderConfig, RenderError};
pub use world::{BumpConfig, TerrainError, TerrainGenerator, TerrainGeneratorConfig, TerrainMap};
