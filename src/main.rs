use std::env;
use std::error::Error;
use std::fs;
use std::time::Instant;

use log::{info, warn};
use voxelspace_rust::{
    Camera, FrameRenderer, RenderConfig, TerrainGenerator, TerrainGeneratorConfig, TerrainMap,
};

/// 命令行选项
struct Options {
    /// 渲染配置 JSON，缺省用内置默认值
    config_path: Option<String>,
    /// 颜色图和高度图成对提供，缺省走程序化生成
    color_path: Option<String>,
    height_path: Option<String>,
    frames: u32,
    output: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            config_path: None,
            color_path: None,
            height_path: None,
            frames: 120,
            output: "frame.png".to_string(),
        }
    }
}

fn parse_args() -> Result<Options, Box<dyn Error>> {
    let mut options = Options::default();
    let mut args = env::args().skip(1);

    while let Some(flag) = args.next() {
        let mut value = |name: &str| {
            args.next()
                .ok_or_else(|| format!("missing value for {name}"))
        };
        match flag.as_str() {
            "--config" => options.config_path = Some(value("--config")?),
            "--color" => options.color_path = Some(value("--color")?),
            "--height" => options.height_path = Some(value("--height")?),
            "--frames" => options.frames = value("--frames")?.parse()?,
            "--output" => options.output = value("--output")?,
            other => return Err(format!("unknown argument: {other}").into()),
        }
    }

    Ok(options)
}

fn load_render_config(options: &Options) -> Result<RenderConfig, Box<dyn Error>> {
    match &options.config_path {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            let config = serde_json::from_str(&text)?;
            info!("Loaded render config from {path}");
            Ok(config)
        }
        None => Ok(RenderConfig::default()),
    }
}

fn build_terrain(options: &Options) -> Result<TerrainMap, Box<dyn Error>> {
    match (&options.color_path, &options.height_path) {
        (Some(color_path), Some(height_path)) => {
            let color = image::open(color_path)?.to_rgb8();
            let height = image::open(height_path)?.to_luma8();
            Ok(TerrainMap::from_images(&color, &height)?)
        }
        (None, None) => {
            let generator = TerrainGenerator::new(TerrainGeneratorConfig::default());
            Ok(generator.generate(1024, 1024)?)
        }
        _ => Err("--color and --height must be supplied together".into()),
    }
}

/// 把行主序的打包像素写成 PNG
fn save_frame(pixels: &[u32], width: u32, height: u32, path: &str) -> Result<(), Box<dyn Error>> {
    let mut out = image::RgbImage::new(width, height);
    for (index, pixel) in out.pixels_mut().enumerate() {
        let packed = pixels[index];
        *pixel = image::Rgb([
            (packed >> 16) as u8,
            (packed >> 8) as u8,
            packed as u8,
        ]);
    }
    out.save(path)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let options = parse_args()?;
    let config = load_render_config(&options)?;
    let terrain = build_terrain(&options)?;
    let mut renderer = FrameRenderer::new(config.clone())?;
    let mut camera = Camera::new(&terrain, 512.0, 800.0, 0.0, config.hover);

    info!(
        "Flying {} frames over a {}x{} terrain",
        options.frames,
        terrain.width(),
        terrain.height()
    );

    // 匀速前飞加缓慢转向，顺便当吞吐量基准
    let start = Instant::now();
    for _ in 0..options.frames {
        renderer.render(&terrain, &camera)?;
        camera.advance(&terrain, 1.0);
        camera.rotate(-0.001);
    }
    let elapsed = start.elapsed().as_secs_f64();
    if elapsed > 0.0 {
        info!(
            "Rendered {} frames in {:.2}s ({:.1} fps)",
            options.frames,
            elapsed,
            options.frames as f64 / elapsed
        );
    }

    let frame = renderer.render(&terrain, &camera)?;
    if let Err(error) = save_frame(
        frame,
        config.screen_width as u32,
        config.screen_height as u32,
        &options.output,
    ) {
        warn!("Failed to save frame: {error}");
        return Err(error);
    }
    info!("Saved final frame to {}", options.output);

    Ok(())
}
