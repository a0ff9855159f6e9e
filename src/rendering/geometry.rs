/// 每个屏幕列的预计算光线几何
///
/// 视场角和视距在渲染器的生命周期内不变，所以每列的横向偏移、
/// 光线长度和深度步长只在构造时算一次，逐帧追踪直接查表。
pub struct ColumnGeometry {
    /// (列号 - 宽度/2) * field_of_view
    pub x_offsets: Vec<f32>,
    /// sqrt(x_offset^2 + view_depth^2)
    pub ray_lengths: Vec<f32>,
    /// view_depth / ray_length
    pub depth_steps: Vec<f32>,
}

impl ColumnGeometry {
    pub fn new(width: usize, field_of_view: f32, view_depth: f32) -> Self {
        let mut x_offsets = Vec::with_capacity(width);
        let mut ray_lengths = Vec::with_capacity(width);
        let mut depth_steps = Vec::with_capacity(width);

        for column in 0..width {
            let x_offset = (column as i32 - (width / 2) as i32) as f32 * field_of_view;
            let ray_length = (x_offset * x_offset + view_depth * view_depth).sqrt();
            x_offsets.push(x_offset);
            ray_lengths.push(ray_length);
            depth_steps.push(view_depth / ray_length);
        }

        Self {
            x_offsets,
            ray_lengths,
            depth_steps,
        }
    }

    pub fn columns(&self) -> usize {
        self.x_offsets.len()
    }
}
