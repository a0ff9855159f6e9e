pub mod generator;
pub mod terrain;

pub use generator::{BumpConfig, TerrainGenerator, TerrainGeneratorConfig};
pub use terrain::{TerrainError, TerrainMap};
