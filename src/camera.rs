use crate::world::terrain::TerrainMap;

/// 贴地飞行摄像机
///
/// 高度不是自由变量：每次移动后都重新取脚下的地形高度加上悬浮偏移，
/// 所以摄像机永远浮在地表上方固定的高度。世界经由地形的环绕寻址无限延伸，
/// 位置和朝向都不需要限幅。
pub struct Camera {
    pub x: f32,
    pub y: f32,
    /// 海拔，始终等于脚下地形高度 + hover
    pub z: f32,
    /// 绕竖直轴的朝向，弧度，不做归一化（三角函数消费端自带周期性）
    pub heading: f32,
    /// 离地悬浮高度，构造后不变
    pub hover: f32,
}

impl Camera {
    pub fn new(terrain: &TerrainMap, x: f32, y: f32, heading: f32, hover: f32) -> Self {
        let mut camera = Self {
            x,
            y,
            z: 0.0,
            heading,
            hover,
        };
        camera.settle(terrain);
        camera
    }

    /// 旋转视角
    pub fn rotate(&mut self, delta_radians: f32) {
        self.heading += delta_radians;
    }

    /// 沿当前朝向移动（负值后退），然后重新贴地
    pub fn advance(&mut self, terrain: &TerrainMap, distance: f32) {
        self.x += self.heading.sin() * distance;
        self.y += self.heading.cos() * distance;
        self.settle(terrain);
    }

    fn settle(&mut self, terrain: &TerrainMap) {
        self.z = terrain.sample_height(self.x, self.y) as f32 + self.hover;
    }
}
