//! Field ribbon geometry
//!
//! `MeshBuilder` turns one of a snapshot's arrays into a triangle list, two
//! triangles per grid segment. Probability rises from the baseline; signed
//! quantities (real and imaginary parts, phase) swing about an axis halfway
//! up the same band. It writes into its own staging frame and hands it over through
//! `MeshExchange`, so the render path never sees a frame while it is being
//! filled.

use crate::config::MeshConfig;
use crate::error::EngineError;
use crate::snapshot::FieldSnapshot;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::atomic::{AtomicU64, Ordering};

pub const VERTICES_PER_SEGMENT: usize = 6;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 4],
    pub color: [f32; 4],
    /// u runs along the domain, v is the normalized height
    pub tex_coord: [f32; 2],
}

impl MeshVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x4,
        1 => Float32x4,
        2 => Float32x2,
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Height-to-color mapping for the ribbon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorScheme {
    /// Linear blue to green
    #[default]
    Classic,
    /// Dark red rising through orange to yellow
    Thermal,
    /// Four hue bands
    Rainbow,
    Grayscale,
    /// Glowing violet to cyan
    Neon,
}

impl ColorScheme {
    pub const ALL: [ColorScheme; 5] = [
        ColorScheme::Classic,
        ColorScheme::Thermal,
        ColorScheme::Rainbow,
        ColorScheme::Grayscale,
        ColorScheme::Neon,
    ];

    /// The scheme after this one, wrapping around
    pub fn next(self) -> Self {
        match self {
            ColorScheme::Classic => ColorScheme::Thermal,
            ColorScheme::Thermal => ColorScheme::Rainbow,
            ColorScheme::Rainbow => ColorScheme::Grayscale,
            ColorScheme::Grayscale => ColorScheme::Neon,
            ColorScheme::Neon => ColorScheme::Classic,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColorScheme::Classic => "classic",
            ColorScheme::Thermal => "thermal",
            ColorScheme::Rainbow => "rainbow",
            ColorScheme::Grayscale => "grayscale",
            ColorScheme::Neon => "neon",
        }
    }

    /// RGBA for a normalized height; `h` is clamped to `[0, 1]`
    pub fn color(&self, h: f32) -> [f32; 4] {
        let h = if h.is_finite() { h.clamp(0.0, 1.0) } else { 0.0 };
        match self {
            ColorScheme::Classic => [0.1, 0.2 + 0.7 * h, 0.9 - 0.7 * h, 1.0],
            ColorScheme::Thermal => {
                if h < 0.5 {
                    [0.3 + 1.4 * h, 0.1 * h, 0.05, 1.0]
                } else {
                    [1.0, 2.0 * (h - 0.5), 0.1 * (h - 0.5), 1.0]
                }
            }
            ColorScheme::Rainbow => {
                let band = (h * 4.0).min(3.999);
                let f = band.fract();
                match band as u32 {
                    0 => [0.0, f, 1.0, 1.0],
                    1 => [0.0, 1.0, 1.0 - f, 1.0],
                    2 => [f, 1.0, 0.0, 1.0],
                    _ => [1.0, 1.0 - f, 0.0, 1.0],
                }
            }
            ColorScheme::Grayscale => [h, h, h, 1.0],
            ColorScheme::Neon => {
                let glow = 0.4 + 0.6 * h;
                [glow * (1.0 - h), glow * h, glow, 1.0]
            }
        }
    }
}

/// Which snapshot array drives the ribbon heights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VisualizationMode {
    #[default]
    Probability,
    RealPart,
    ImaginaryPart,
    Phase,
}

impl VisualizationMode {
    pub const ALL: [VisualizationMode; 4] = [
        VisualizationMode::Probability,
        VisualizationMode::RealPart,
        VisualizationMode::ImaginaryPart,
        VisualizationMode::Phase,
    ];

    pub fn next(self) -> Self {
        match self {
            VisualizationMode::Probability => VisualizationMode::RealPart,
            VisualizationMode::RealPart => VisualizationMode::ImaginaryPart,
            VisualizationMode::ImaginaryPart => VisualizationMode::Phase,
            VisualizationMode::Phase => VisualizationMode::Probability,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VisualizationMode::Probability => "probability",
            VisualizationMode::RealPart => "real part",
            VisualizationMode::ImaginaryPart => "imaginary part",
            VisualizationMode::Phase => "phase",
        }
    }

    /// Signed modes are drawn about the middle of the height band
    pub fn is_signed(&self) -> bool {
        !matches!(self, VisualizationMode::Probability)
    }

    /// The driving array and the factor that maps it into `[-1, 1]`
    fn source<'a>(&self, snapshot: &'a FieldSnapshot) -> (&'a [f64], f64) {
        let values: &[f64] = match self {
            VisualizationMode::Probability => &snapshot.probability,
            VisualizationMode::RealPart => &snapshot.real,
            VisualizationMode::ImaginaryPart => &snapshot.imag,
            VisualizationMode::Phase => return (&snapshot.phase, 1.0 / PI),
        };
        let peak = values.iter().fold(0.0, |m: f64, v| m.max(v.abs()));
        let scale = if peak > 0.0 && peak.is_finite() { 1.0 / peak } else { 0.0 };
        (values, scale)
    }
}

/// One complete set of ribbon vertices
#[derive(Debug, Clone, Default)]
pub struct MeshFrame {
    pub vertices: Vec<MeshVertex>,
    /// Simulation time of the snapshot the frame was built from
    pub time: f64,
    /// 0 until first published
    pub generation: u64,
}

/// Double buffer between the mesh producer and the render path.
///
/// `publish` swaps the producer's filled frame with the visible one under the
/// lock, so a reader always sees a complete frame. The generation counter is
/// bumped after the swap.
#[derive(Debug, Default)]
pub struct MeshExchange {
    front: Mutex<MeshFrame>,
    generation: AtomicU64,
}

impl MeshExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `staging` visible and take the previous frame back in its place
    pub fn publish(&self, staging: &mut MeshFrame) -> u64 {
        let mut front = self.front.lock();
        let generation = self.generation.load(Ordering::Acquire) + 1;
        staging.generation = generation;
        std::mem::swap(&mut *front, staging);
        self.generation.store(generation, Ordering::Release);
        generation
    }

    /// Generation of the visible frame
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Run `f` against the visible frame
    pub fn read<R>(&self, f: impl FnOnce(&MeshFrame) -> R) -> R {
        f(&self.front.lock())
    }
}

pub struct MeshBuilder {
    config: MeshConfig,
    scheme: ColorScheme,
    mode: VisualizationMode,
    staging: MeshFrame,
    last_time: Option<f64>,
    invalidated: bool,
    /// Largest vertex capacity reserved so far
    reserved: usize,
}

impl MeshBuilder {
    pub fn new(config: MeshConfig) -> Self {
        Self {
            config,
            scheme: ColorScheme::default(),
            mode: VisualizationMode::default(),
            staging: MeshFrame::default(),
            last_time: None,
            invalidated: true,
            reserved: 0,
        }
    }

    pub fn scheme(&self) -> ColorScheme {
        self.scheme
    }

    pub fn set_scheme(&mut self, scheme: ColorScheme) {
        if scheme != self.scheme {
            self.scheme = scheme;
            self.invalidated = true;
        }
    }

    pub fn mode(&self) -> VisualizationMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: VisualizationMode) {
        if mode != self.mode {
            self.mode = mode;
            self.invalidated = true;
        }
    }

    /// Force the next `build` to run even if time has not moved
    pub fn invalidate(&mut self) {
        self.invalidated = true;
    }

    /// Vertex capacity the builder has grown to. Both frames of the double
    /// buffer are grown to it on their next build.
    pub fn capacity(&self) -> usize {
        self.reserved
    }

    /// Vertex count for a grid of `points` samples
    pub fn vertex_count(points: usize) -> usize {
        points.saturating_sub(1) * VERTICES_PER_SEGMENT
    }

    /// Build the ribbon for `snapshot` and publish it to `exchange`.
    ///
    /// Returns `Ok(false)` without touching `exchange` when the snapshot is
    /// within `min_time_delta` of the last build and nothing was invalidated.
    /// On allocation failure the published frame is left as it was.
    pub fn build(&mut self, snapshot: &FieldSnapshot, exchange: &MeshExchange) -> Result<bool, EngineError> {
        if !self.invalidated {
            if let Some(last) = self.last_time {
                if (snapshot.time - last).abs() < self.config.min_time_delta {
                    return Ok(false);
                }
            }
        }

        let n = snapshot.len();
        let required = Self::vertex_count(n);
        self.reserve(required)?;

        let (values, scale) = self.mode.source(snapshot);
        let span = (n.max(2) - 1) as f32;
        let MeshConfig {
            height_scale,
            baseline,
            half_width,
            ..
        } = self.config;
        let (axis, reach) = if self.mode.is_signed() {
            (baseline + 0.5 * height_scale, 0.5 * height_scale)
        } else {
            (baseline, height_scale)
        };

        let scheme = self.scheme;
        let column = |i: usize| {
            let u = i as f32 / span;
            let s = ((values[i] * scale) as f32).clamp(-1.0, 1.0);
            let h = s.abs();
            let x = -half_width + 2.0 * half_width * u;
            let bottom = MeshVertex {
                position: [x, axis, 0.0, 1.0],
                color: scheme.color(0.0),
                tex_coord: [u, 0.0],
            };
            let top = MeshVertex {
                position: [x, axis + s * reach, 0.0, 1.0],
                color: scheme.color(h),
                tex_coord: [u, h],
            };
            (bottom, top)
        };

        let vertices = &mut self.staging.vertices;
        vertices.clear();
        for i in 0..n.saturating_sub(1) {
            let (b0, t0) = column(i);
            let (b1, t1) = column(i + 1);
            vertices.extend_from_slice(&[b0, b1, t1, b0, t1, t0]);
        }
        debug_assert_eq!(vertices.len(), required);

        self.staging.time = snapshot.time;
        exchange.publish(&mut self.staging);
        self.last_time = Some(snapshot.time);
        self.invalidated = false;
        Ok(true)
    }

    // Grow with headroom; capacity is never given back.
    fn reserve(&mut self, required: usize) -> Result<(), EngineError> {
        let vertices = &mut self.staging.vertices;
        if vertices.capacity() >= required {
            return Ok(());
        }
        let grown = ((required as f64) * self.config.growth_factor as f64).ceil() as usize;
        let target = grown.max(self.reserved);
        vertices.clear();
        vertices
            .try_reserve_exact(target)
            .map_err(|_| EngineError::MeshAllocation { vertices: target })?;
        log::debug!("mesh staging grown to {} vertices", vertices.capacity());
        self.reserved = self.reserved.max(vertices.capacity());
        Ok(())
    }
}
