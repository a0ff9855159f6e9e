use image::{GrayImage, RgbImage};
use log::info;
use thiserror::Error;

/// 地形数据错误
#[derive(Debug, Error)]
pub enum TerrainError {
    #[error("color map is {color_width}x{color_height} but height map is {height_width}x{height_height}")]
    DimensionMismatch {
        color_width: u32,
        color_height: u32,
        height_width: u32,
        height_height: u32,
    },
    #[error("terrain dimension {0} is not a power of two")]
    InvalidDimension(u32),
}

/// 体素空间地形：高度场 + 颜色场，行主序存储，两者共用同一套寻址
///
/// 采样坐标在两个轴上分别按位掩码环绕，因此地形是一个无限平铺的环面。
/// 掩码要求宽高都是 2 的幂，构造时统一校验。
#[derive(Debug)]
pub struct TerrainMap {
    width: usize,
    height: usize,
    x_mask: usize,
    y_mask: usize,
    heights: Vec<u8>,
    colors: Vec<u32>,
}

impl TerrainMap {
    /// 由已经填充好的两个场构造地形，生成器和光栅加载共用这个入口
    pub(crate) fn with_fields(
        width: u32,
        height: u32,
        heights: Vec<u8>,
        colors: Vec<u32>,
    ) -> Result<Self, TerrainError> {
        ensure_power_of_two(width)?;
        ensure_power_of_two(height)?;

        let cells = width as usize * height as usize;
        assert_eq!(heights.len(), cells);
        assert_eq!(colors.len(), cells);

        Ok(Self {
            width: width as usize,
            height: height as usize,
            x_mask: width as usize - 1,
            y_mask: height as usize - 1,
            heights,
            colors,
        })
    }

    /// 从一对解码好的光栅图构造地形：颜色图按 RGB 打包，高度图取单通道灰度
    pub fn from_images(color: &RgbImage, height_map: &GrayImage) -> Result<Self, TerrainError> {
        let (cw, ch) = color.dimensions();
        let (hw, hh) = height_map.dimensions();
        if (cw, ch) != (hw, hh) {
            return Err(TerrainError::DimensionMismatch {
                color_width: cw,
                color_height: ch,
                height_width: hw,
                height_height: hh,
            });
        }

        let heights = height_map.pixels().map(|p| p.0[0]).collect();
        let colors = color
            .pixels()
            .map(|p| ((p.0[0] as u32) << 16) | ((p.0[1] as u32) << 8) | p.0[2] as u32)
            .collect();

        let map = Self::with_fields(cw, ch, heights, colors)?;
        info!("Loaded {}x{} terrain from raster pair", cw, ch);
        Ok(map)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn index(&self, x: f32, y: f32) -> usize {
        // floor 后转整再按位环绕，负坐标经补码掩码落回地图内
        let xi = x.floor() as i64 as usize & self.x_mask;
        let yi = y.floor() as i64 as usize & self.y_mask;
        xi + yi * self.width
    }

    /// 采样地形高度，坐标在两个轴上独立环绕
    #[inline]
    pub fn sample_height(&self, x: f32, y: f32) -> u8 {
        self.heights[self.index(x, y)]
    }

    /// 采样地表颜色（打包的 0xRRGGBB），与高度场同一套寻址
    #[inline]
    pub fn sample_color(&self, x: f32, y: f32) -> u32 {
        self.colors[self.index(x, y)]
    }
}

pub(crate) fn ensure_power_of_two(extent: u32) -> Result<(), TerrainError> {
    if extent == 0 || !extent.is_power_of_two() {
        return Err(TerrainError::InvalidDimension(extent));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    fn gradient_map() -> TerrainMap {
        let heights: Vec<u8> = (0..16).map(|i| i as u8 * 3).collect();
        let colors: Vec<u32> = (0..16).map(|i| 0x010101 * i as u32).collect();
        TerrainMap::with_fields(4, 4, heights, colors).unwrap()
    }

    #[test]
    fn sampling_wraps_both_axes() {
        let map = gradient_map();
        for y in 0..4 {
            for x in 0..4 {
                let (fx, fy) = (x as f32, y as f32);
                assert_eq!(map.sample_height(fx, fy), map.sample_height(fx + 4.0, fy));
                assert_eq!(map.sample_height(fx, fy), map.sample_height(fx, fy + 4.0));
                assert_eq!(map.sample_color(fx, fy), map.sample_color(fx + 8.0, fy + 4.0));
            }
        }
    }

    #[test]
    fn negative_coordinates_wrap() {
        let map = gradient_map();
        assert_eq!(map.sample_height(-1.0, 0.0), map.sample_height(3.0, 0.0));
        assert_eq!(map.sample_height(0.0, -1.0), map.sample_height(0.0, 3.0));
        // floor(-0.5) == -1，落在最右一列
        assert_eq!(map.sample_height(-0.5, 0.0), map.sample_height(3.0, 0.0));
    }

    #[test]
    fn fractional_coordinates_floor() {
        let map = gradient_map();
        assert_eq!(map.sample_height(1.9, 2.9), map.sample_height(1.0, 2.0));
        assert_eq!(map.sample_color(1.9, 2.9), map.sample_color(1.0, 2.0));
    }

    #[test]
    fn rejects_non_power_of_two() {
        let err = TerrainMap::with_fields(3, 4, vec![0; 12], vec![0; 12]).unwrap_err();
        assert!(matches!(err, TerrainError::InvalidDimension(3)));

        let err = TerrainMap::with_fields(4, 6, vec![0; 24], vec![0; 24]).unwrap_err();
        assert!(matches!(err, TerrainError::InvalidDimension(6)));
    }

    #[test]
    fn rejects_mismatched_rasters() {
        let color = RgbImage::new(4, 4);
        let height = GrayImage::new(4, 8);
        assert!(matches!(
            TerrainMap::from_images(&color, &height),
            Err(TerrainError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn from_images_packs_color_and_height() {
        let mut color = RgbImage::new(2, 2);
        let mut height = GrayImage::new(2, 2);
        color.put_pixel(1, 0, Rgb([10, 20, 30]));
        height.put_pixel(1, 0, Luma([77]));

        let map = TerrainMap::from_images(&color, &height).unwrap();
        assert_eq!(map.sample_color(1.0, 0.0), 0x0A141E);
        assert_eq!(map.sample_height(1.0, 0.0), 77);
        assert_eq!(map.sample_height(0.0, 0.0), 0);
    }
}
