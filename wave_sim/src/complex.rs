//! Complex field samples

/// One field value at one grid point
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ComplexSample {
    pub real: f64,
    pub imag: f64,
}

impl ComplexSample {
    pub const ZERO: ComplexSample = ComplexSample { real: 0.0, imag: 0.0 };

    pub fn new(real: f64, imag: f64) -> Self {
        Self { real, imag }
    }

    /// Create from polar form: r * e^(i*theta)
    ///
    /// A negative `r` is allowed and flips the sign of both components.
    pub fn from_polar(r: f64, theta: f64) -> Self {
        let (sin, cos) = theta.sin_cos();
        Self {
            real: r * cos,
            imag: r * sin,
        }
    }

    /// Magnitude squared |z|^2
    pub fn norm_sq(&self) -> f64 {
        self.real * self.real + self.imag * self.imag
    }

    /// Magnitude |z|
    pub fn norm(&self) -> f64 {
        self.norm_sq().sqrt()
    }

    /// Phase angle in (-π, π]
    pub fn arg(&self) -> f64 {
        self.imag.atan2(self.real)
    }

    pub fn conj(&self) -> Self {
        Self {
            real: self.real,
            imag: -self.imag,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.real == 0.0 && self.imag == 0.0
    }
}
