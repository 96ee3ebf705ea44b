//! Common GPU utilities for the wave simulation
//!
//! Windowed and headless wgpu contexts plus the view camera shared by the
//! simulation library and the viewer.

pub mod graphics;
pub mod camera;

pub use graphics::*;
pub use camera::*;
