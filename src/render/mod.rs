pub mod palette;
pub mod raster;
pub mod recorder;
pub mod scene;
