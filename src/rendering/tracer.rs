use crate::camera::Camera;
use crate::rendering::geometry::ColumnGeometry;
use crate::world::terrain::TerrainMap;

/// 一帧内所有追踪线程共享的只读上下文
///
/// 摄像机位姿在派发前拍成快照，派发之后外部对摄像机的任何改动都影响不到本帧；
/// 地形和几何表在整帧期间只读共享。
pub struct FrameContext<'a> {
    pub terrain: &'a TerrainMap,
    pub geometry: &'a ColumnGeometry,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub heading: f32,
    pub view_depth: f32,
    /// 固定地平线所在行（屏幕高度的一半）
    pub horizon: i32,
    /// 每列的像素行数
    pub rows: usize,
}

impl<'a> FrameContext<'a> {
    pub fn new(
        terrain: &'a TerrainMap,
        geometry: &'a ColumnGeometry,
        camera: &Camera,
        view_depth: f32,
        rows: usize,
    ) -> Self {
        Self {
            terrain,
            geometry,
            x: camera.x,
            y: camera.y,
            z: camera.z,
            heading: camera.heading,
            view_depth,
            horizon: (rows / 2) as i32,
            rows,
        }
    }
}

/// 对单个屏幕列做光线步进，把可见的地形剪影画进该列的像素条
///
/// strip 的长度等于行数，索引 0 是屏幕最上面一行；调用前应已填好天空背景。
/// 返回最终的水位线（自底向上已覆盖的行号），水位线以上未触及的行保持背景。
pub fn trace_column(ctx: &FrameContext, column: usize, strip: &mut [u32]) -> i32 {
    let ray_length = ctx.geometry.ray_lengths[column];
    let x_offset = ctx.geometry.x_offsets[column];
    let depth_step = ctx.geometry.depth_steps[column];

    let (sin_h, cos_h) = ctx.heading.sin_cos();
    let ray_x = sin_h * ctx.view_depth + cos_h * x_offset;
    let ray_y = cos_h * ctx.view_depth - sin_h * x_offset;
    let step_x = ray_x / ray_length;
    let step_y = ray_y / ray_length;

    let rows = ctx.rows as i32;
    let mut pixel_x = ctx.x;
    let mut pixel_y = ctx.y;
    let mut painted: i32 = 0;
    let mut shadow = 1.0f32;

    for i in 1..ray_length.ceil() as i32 {
        // 阴影系数每 20 步才刷新一次，粗粒度的距离衰减换速度
        if i % 20 == 0 {
            shadow = (ray_length - i as f32) / ray_length;
        }

        pixel_x += step_x;
        pixel_y += step_y;

        let voxel_color = filter_color(ctx.terrain.sample_color(pixel_x, pixel_y), shadow);
        let voxel_height = ctx.terrain.sample_height(pixel_x, pixel_y) as f32 - ctx.z;

        // 透视：同样的高度差，距离越远在屏幕上越矮
        let screen_height =
            (ctx.horizon as f32 + voxel_height / (depth_step * i as f32) * 100.0) as i32;

        // 自底向上补画，水位线以下的行已被更近的采样占据，不再回头
        for k in painted..screen_height.min(rows) {
            strip[(rows - k - 1) as usize] = voxel_color;
            painted = k;
        }
    }

    painted
}

/// 按距离衰减系数缩放颜色的三个通道（截断取整）
fn filter_color(color: u32, factor: f32) -> u32 {
    let r = (((color >> 16) & 0xFF) as f32 * factor) as u32;
    let g = (((color >> 8) & 0xFF) as f32 * factor) as u32;
    let b = ((color & 0xFF) as f32 * factor) as u32;

    (r << 16) | (g << 8) | b
}
