use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::camera::Camera;
use crate::rendering::geometry::ColumnGeometry;
use crate::rendering::tracer::{trace_column, FrameContext};
use crate::world::terrain::TerrainMap;

/// 渲染错误
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid render configuration: {0}")]
    InvalidConfig(String),
    #[error("tracing worker failed: {0}")]
    WorkerFailure(String),
}

/// 渲染配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub screen_width: usize,
    pub screen_height: usize,
    /// 水平方向的投影拉伸程度
    pub field_of_view: f32,
    /// 光线最远步进距离（世界单位）
    pub view_depth: f32,
    /// 摄像机离地悬浮高度
    pub hover: f32,
    /// 列追踪工作线程数
    pub worker_count: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            screen_width: 800,
            screen_height: 450,
            field_of_view: 1.2,
            view_depth: 400.0,
            hover: 100.0,
            worker_count: 4,
        }
    }
}

/// 并行帧渲染器
///
/// 每帧三步：清屏为预计算的天空渐变，把屏幕列划分给固定大小的线程池追踪，
/// 最后把列主序的追踪缓冲合成为行主序的输出。整个调用是同步的，
/// 返回时所有工作线程都已汇合。
pub struct FrameRenderer {
    config: RenderConfig,
    geometry: ColumnGeometry,
    /// 单列的天空背景，清屏时复制进每一列
    sky_strip: Vec<u32>,
    pool: rayon::ThreadPool,
    /// 列主序追踪缓冲：每列（以及每个工作线程的列段）都是一段连续内存
    trace_buffer: Vec<u32>,
    /// 行主序输出缓冲
    image: Vec<u32>,
}

impl FrameRenderer {
    pub fn new(config: RenderConfig) -> Result<Self, RenderError> {
        if config.screen_width == 0 || config.screen_height == 0 {
            return Err(RenderError::InvalidConfig(format!(
                "screen is {}x{}",
                config.screen_width, config.screen_height
            )));
        }
        if config.view_depth < 1.0 {
            return Err(RenderError::InvalidConfig(format!(
                "view depth {} is too small",
                config.view_depth
            )));
        }
        if config.worker_count == 0 || config.worker_count > config.screen_width {
            return Err(RenderError::InvalidConfig(format!(
                "worker count {} does not fit {} columns",
                config.worker_count, config.screen_width
            )));
        }

        let geometry =
            ColumnGeometry::new(config.screen_width, config.field_of_view, config.view_depth);
        let sky_strip = sky_gradient(config.screen_height);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_count)
            .thread_name(|index| format!("column-trace-{index}"))
            .build()
            .map_err(|e| RenderError::InvalidConfig(e.to_string()))?;

        info!(
            "Created {}x{} frame renderer with {} tracing workers",
            config.screen_width, config.screen_height, config.worker_count
        );

        let pixels = config.screen_width * config.screen_height;
        Ok(Self {
            config,
            geometry,
            sky_strip,
            pool,
            trace_buffer: vec![0; pixels],
            image: vec![0; pixels],
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// 渲染一帧，返回行主序的 0xRRGGBB 像素缓冲
    ///
    /// 摄像机位姿在派发前拍快照，渲染期间的外部改动不会撕裂本帧。
    /// 任何一个工作线程失败都会使整帧失败，缓冲下一帧会被完整重写，
    /// 调用方直接丢弃这帧重来即可。
    pub fn render(
        &mut self,
        terrain: &TerrainMap,
        camera: &Camera,
    ) -> Result<&[u32], RenderError> {
        let width = self.config.screen_width;
        let rows = self.config.screen_height;

        // 清屏：把天空条复制进每一列
        for column in self.trace_buffer.chunks_mut(rows) {
            column.copy_from_slice(&self.sky_strip);
        }

        // 追踪：列段之间是互不相交的切片，工作线程之间无需任何锁
        let ctx = FrameContext::new(
            terrain,
            &self.geometry,
            camera,
            self.config.view_depth,
            rows,
        );
        let slabs = partition_columns(
            &mut self.trace_buffer,
            width,
            rows,
            self.config.worker_count,
        );
        let results: Vec<Result<(), RenderError>> = self.pool.install(|| {
            slabs
                .into_par_iter()
                .map(|(first_column, slab)| {
                    catch_unwind(AssertUnwindSafe(|| {
                        for (offset, strip) in slab.chunks_mut(rows).enumerate() {
                            trace_column(&ctx, first_column + offset, strip);
                        }
                    }))
                    .map_err(|payload| RenderError::WorkerFailure(panic_message(payload)))
                })
                .collect()
        });
        if let Some(error) = results.into_iter().find_map(|result| result.err()) {
            warn!("Dropping frame: {error}");
            return Err(error);
        }

        // 合成：列主序转置为行主序
        for row in 0..rows {
            for column in 0..width {
                self.image[row * width + column] = self.trace_buffer[column * rows + row];
            }
        }

        Ok(&self.image)
    }
}

/// 把追踪缓冲按列切成 worker_count 段连续切片，余数并入最后一段
///
/// 返回每段的起始列号和对应的缓冲区切片。
fn partition_columns(
    buffer: &mut [u32],
    width: usize,
    rows: usize,
    workers: usize,
) -> Vec<(usize, &mut [u32])> {
    let columns_per_worker = width / workers;
    let mut slabs = Vec::with_capacity(workers);
    let mut rest = buffer;
    let mut column = 0;

    for worker in 0..workers {
        let columns = if worker == workers - 1 {
            width - column
        } else {
            columns_per_worker
        };
        let (slab, tail) = rest.split_at_mut(columns * rows);
        slabs.push((column, slab));
        rest = tail;
        column += columns;
    }

    slabs
}

/// 天空背景：基础蓝色加上朝地平线方向增强的亮度渐变，地平线及以下保持不变
fn sky_gradient(rows: usize) -> Vec<u32> {
    let horizon = (rows as u32 / 2).max(1);
    let mut strip = Vec::with_capacity(rows);

    for row in 0..rows as u32 {
        let ramp = row.min(horizon);
        let white = 100 * ramp * ramp / (horizon * horizon);
        let red = 50 + white;
        let green = 50 + white;
        let blue = 150;
        strip.push((red << 16) | (green << 8) | blue);
    }

    strip
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::generator::{BumpConfig, TerrainGenerator, TerrainGeneratorConfig};

    fn small_config(workers: usize) -> RenderConfig {
        RenderConfig {
            screen_width: 64,
            screen_height: 32,
            view_depth: 200.0,
            hover: 40.0,
            worker_count: workers,
            ..Default::default()
        }
    }

    fn test_terrain() -> TerrainMap {
        let config = TerrainGeneratorConfig {
            seed: 11,
            bumps: vec![
                BumpConfig { height: 90, steepness: 16, x: 32, y: 40 },
                BumpConfig { height: 120, steepness: 10, x: 10, y: 20 },
            ],
            ..Default::default()
        };
        TerrainGenerator::new(config).generate(64, 64).unwrap()
    }

    #[test]
    fn render_is_deterministic() {
        let terrain = test_terrain();
        let mut renderer = FrameRenderer::new(small_config(4)).unwrap();
        let camera = Camera::new(&terrain, 32.0, 8.0, 0.1, 40.0);

        let first = renderer.render(&terrain, &camera).unwrap().to_vec();
        let second = renderer.render(&terrain, &camera).unwrap().to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn worker_count_does_not_change_the_frame() {
        let terrain = test_terrain();
        let camera = Camera::new(&terrain, 32.0, 8.0, 0.1, 40.0);

        let mut frames = Vec::new();
        for workers in [1, 3, 4] {
            let mut renderer = FrameRenderer::new(small_config(workers)).unwrap();
            frames.push(renderer.render(&terrain, &camera).unwrap().to_vec());
        }

        assert_eq!(frames[0], frames[1]);
        assert_eq!(frames[0], frames[2]);
    }

    #[test]
    fn every_column_is_traced() {
        // 宽度不能被线程数整除，余数列归最后一段；高地形保证每列底行都被画上
        let cells = 64 * 64;
        let terrain =
            TerrainMap::with_fields(64, 64, vec![200; cells], vec![0x00C800; cells]).unwrap();
        let config = RenderConfig {
            screen_width: 50,
            screen_height: 16,
            view_depth: 200.0,
            hover: 10.0,
            worker_count: 4,
            ..Default::default()
        };
        let mut renderer = FrameRenderer::new(config).unwrap();
        let camera = Camera::new(&terrain, 32.0, 32.0, 0.0, 10.0);

        let frame = renderer.render(&terrain, &camera).unwrap();
        let bottom_row = &frame[15 * 50..16 * 50];
        let sky_bottom = sky_gradient(16)[15];
        for (column, &pixel) in bottom_row.iter().enumerate() {
            assert_ne!(pixel, sky_bottom, "column {column} was never traced");
        }
    }

    #[test]
    fn sky_fills_rows_the_terrain_never_reaches() {
        // 水面地形贴着镜头，只有地平线以下会被画；顶行必然还是天空
        let cells = 64 * 64;
        let terrain =
            TerrainMap::with_fields(64, 64, vec![0; cells], vec![0x000064; cells]).unwrap();
        let mut renderer = FrameRenderer::new(small_config(2)).unwrap();
        let camera = Camera::new(&terrain, 32.0, 32.0, 0.0, 40.0);

        let frame = renderer.render(&terrain, &camera).unwrap();
        let sky = sky_gradient(32);
        for column in 0..64 {
            assert_eq!(frame[column], sky[0], "column {column} top row");
        }
    }

    #[test]
    fn sky_gradient_ramps_down_to_the_horizon_then_stays_flat() {
        let strip = sky_gradient(32);
        let horizon = 16;

        let mut last_red = 0;
        for (row, &pixel) in strip.iter().enumerate() {
            let red = (pixel >> 16) & 0xFF;
            let green = (pixel >> 8) & 0xFF;
            let blue = pixel & 0xFF;

            assert_eq!(red, green);
            assert_eq!(blue, 150);
            assert!(red <= 150);
            if row <= horizon {
                assert!(red >= last_red, "ramp should brighten towards the horizon");
                last_red = red;
            } else {
                assert_eq!(red, strip[horizon] >> 16 & 0xFF, "flat below the horizon");
            }
        }
        assert_eq!(strip[0], 0x323296);
    }

    #[test]
    fn rejects_bad_configuration() {
        let zero_workers = RenderConfig { worker_count: 0, ..Default::default() };
        assert!(matches!(
            FrameRenderer::new(zero_workers),
            Err(RenderError::InvalidConfig(_))
        ));

        let more_workers_than_columns = RenderConfig {
            screen_width: 2,
            worker_count: 8,
            ..Default::default()
        };
        assert!(matches!(
            FrameRenderer::new(more_workers_than_columns),
            Err(RenderError::InvalidConfig(_))
        ));

        let flat_depth = RenderConfig { view_depth: 0.0, ..Default::default() };
        assert!(matches!(
            FrameRenderer::new(flat_depth),
            Err(RenderError::InvalidConfig(_))
        ));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = small_config(3);
        let text = serde_json::to_string(&config).unwrap();
        let back: RenderConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back.screen_width, 64);
        assert_eq!(back.screen_height, 32);
        assert_eq!(back.worker_count, 3);
    }
}
