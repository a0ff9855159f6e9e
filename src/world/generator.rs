use std::f32::consts::PI;

use log::info;
use noise::{NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

use crate::world::terrain::{ensure_power_of_two, TerrainError, TerrainMap};

/// 单个山丘：以余弦衰减叠加到现有地形上
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BumpConfig {
    /// 山丘中心增加的高度
    pub height: i32,
    /// 山丘半径，值越小坡越陡
    pub steepness: i32,
    pub x: i32,
    pub y: i32,
}

/// 地形生成器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainGeneratorConfig {
    pub seed: u32,
    pub bumps: Vec<BumpConfig>,
    pub water_level: u8,
    pub beach_level: u8,
    /// 颜色通道的随机抖动幅度
    pub color_jitter: u8,
    /// 草地表面的额外起伏上限
    pub grass_detail: u8,
}

impl Default for TerrainGeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            bumps: vec![
                BumpConfig { height: 90, steepness: 400, x: 400, y: 400 },
                BumpConfig { height: 110, steepness: 70, x: 200, y: 200 },
                BumpConfig { height: 130, steepness: 40, x: 300, y: 300 },
                BumpConfig { height: 120, steepness: 80, x: 500, y: 500 },
                BumpConfig { height: 100, steepness: 30, x: 600, y: 600 },
                BumpConfig { height: 170, steepness: 80, x: 700, y: 700 },
                BumpConfig { height: 100, steepness: 20, x: 800, y: 800 },
                BumpConfig { height: 100, steepness: 80, x: 200, y: 800 },
                BumpConfig { height: 80, steepness: 200, x: 300, y: 700 },
                BumpConfig { height: 140, steepness: 150, x: 400, y: 900 },
            ],
            water_level: 0,
            beach_level: 5,
            color_jitter: 50,
            grass_detail: 30,
        }
    }
}

/// 程序化地形生成器
///
/// 在平坦的基底上叠加一组山丘，然后按海拔分带着色：
/// 高处是草地，中间是沙滩，最低处是水面。
pub struct TerrainGenerator {
    color_noise: Perlin,
    detail_noise: Perlin,
    config: TerrainGeneratorConfig,
}

// 颜色抖动逐格取样，草地起伏按更大的尺度成片出现
const COLOR_JITTER_FREQ: f64 = 0.73;
const GRASS_DETAIL_FREQ: f64 = 0.11;
const GRASS_DETAIL_THRESHOLD: f64 = 0.6;

impl TerrainGenerator {
    pub fn new(config: TerrainGeneratorConfig) -> Self {
        let color_noise = Perlin::new(config.seed);
        let detail_noise = Perlin::new(config.seed + 1);

        Self {
            color_noise,
            detail_noise,
            config,
        }
    }

    /// 生成 width x height 的地形，两个维度都必须是 2 的幂
    pub fn generate(&self, width: u32, height: u32) -> Result<TerrainMap, TerrainError> {
        ensure_power_of_two(width)?;
        ensure_power_of_two(height)?;

        let cells = width as usize * height as usize;
        let mut heights = vec![0u8; cells];

        for bump in &self.config.bumps {
            apply_bump(&mut heights, width, height, bump);
        }

        // 按海拔分带着色；草地同时获得一点额外起伏
        let mut colors = vec![0u32; cells];
        for y in 0..height {
            for x in 0..width {
                let idx = x as usize + y as usize * width as usize;
                let h = heights[idx];
                let jitter = self.color_jitter_at(x, y) as u32;

                colors[idx] = if h > self.config.beach_level {
                    if let Some(extra) = self.grass_detail_at(x, y) {
                        heights[idx] = heights[idx].saturating_add(extra);
                    }
                    (100 + jitter) << 8
                } else if h > self.config.water_level {
                    ((100 + jitter) << 16) | ((100 + jitter) << 8)
                } else {
                    100 + jitter
                };
            }
        }

        info!(
            "Generated {}x{} terrain with {} bumps (seed {})",
            width,
            height,
            self.config.bumps.len(),
            self.config.seed
        );
        TerrainMap::with_fields(width, height, heights, colors)
    }

    /// 0..=color_jitter 范围内的确定性抖动
    fn color_jitter_at(&self, x: u32, y: u32) -> u8 {
        let v = self.color_noise.get([
            x as f64 * COLOR_JITTER_FREQ + 0.5,
            y as f64 * COLOR_JITTER_FREQ + 0.5,
        ]);
        ((v + 1.0) * 0.5 * self.config.color_jitter as f64) as u8
    }

    /// 草地起伏：只有噪声超过阈值的成片区域才会加高
    fn grass_detail_at(&self, x: u32, y: u32) -> Option<u8> {
        if self.config.grass_detail == 0 {
            return None;
        }
        let v = self.detail_noise.get([
            x as f64 * GRASS_DETAIL_FREQ + 0.5,
            y as f64 * GRASS_DETAIL_FREQ + 0.5,
        ]);
        if v <= GRASS_DETAIL_THRESHOLD {
            return None;
        }
        let t = (v - GRASS_DETAIL_THRESHOLD) / (1.0 - GRASS_DETAIL_THRESHOLD);
        Some((t * self.config.grass_detail as f64) as u8)
    }
}

/// 把一个山丘叠加到高度场上
///
/// 半径内的每个格子增加 (cos(distance * PI / steepness) + 1) * height / 2，
/// 半径处衰减为零，中心处达到全量；越过地图边缘按掩码环绕，高度按 256 取模累加。
fn apply_bump(heights: &mut [u8], width: u32, height: u32, bump: &BumpConfig) {
    let x_mask = width as i32 - 1;
    let y_mask = height as i32 - 1;
    let radius = bump.steepness;

    for i in 0..radius * 2 {
        for j in 0..radius * 2 {
            let dx = (i - radius) as f32;
            let dy = (j - radius) as f32;
            let distance = (dx * dx + dy * dy).sqrt();
            if distance > radius as f32 {
                continue;
            }

            let delta =
                ((distance * PI / radius as f32).cos() + 1.0) * bump.height as f32 / 2.0;
            let xi = ((bump.x - radius + i) & x_mask) as usize;
            let yi = ((bump.y - radius + j) & y_mask) as usize;
            let idx = xi + yi * width as usize;
            heights[idx] = heights[idx].wrapping_add(delta as u16 as u8);
        }
    }
}
