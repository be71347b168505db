//! Calibration measurements and default-uncertainty substitution.

use serde::{Deserialize, Serialize};

/// Number of numeric fields in one measurement record.
pub const FIELD_COUNT: usize = 9;

/// One calibration point with asymmetric uncertainties on every coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub x: f64,
    pub x_err_low: f64,
    pub x_err_high: f64,
    pub y: f64,
    pub y_err_low: f64,
    pub y_err_high: f64,
    pub z: f64,
    pub z_err_low: f64,
    pub z_err_high: f64,
}

/// Default relative uncertainties and the low-field floor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Defaults {
    /// Relative uncertainty on the response `z`.
    pub yield_uncertainty: f64,
    /// Relative uncertainty on `x`.
    pub energy_uncertainty: f64,
    /// Relative uncertainty on `y`.
    pub field_uncertainty: f64,
    /// Value substituted for a `y` of exactly zero.
    pub low_field: f64,
}

/// Which coordinate the default response uncertainty scales with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseReference {
    /// `|z|`, the usual case.
    Response,
    /// `|x|`; used for raw datasets fed to a one-argument model.
    Energy,
}

impl Measurement {
    /// Build a measurement from its nine fields in file order.
    pub fn from_fields(f: &[f64; FIELD_COUNT]) -> Self {
        Self {
            x: f[0],
            x_err_low: f[1],
            x_err_high: f[2],
            y: f[3],
            y_err_low: f[4],
            y_err_high: f[5],
            z: f[6],
            z_err_low: f[7],
            z_err_high: f[8],
        }
    }

    pub fn mean_x_err(&self) -> f64 {
        0.5 * (self.x_err_low + self.x_err_high)
    }

    pub fn mean_y_err(&self) -> f64 {
        0.5 * (self.y_err_low + self.y_err_high)
    }

    pub fn mean_z_err(&self) -> f64 {
        0.5 * (self.z_err_low + self.z_err_high)
    }

    /// Response variance used on the covariance diagonal.
    pub fn z_variance(&self) -> f64 {
        self.mean_z_err().powi(2)
    }

    /// Response error on the side of the model the residual points to.
    ///
    /// `residual` is `z - model`: a negative residual means the model lies
    /// above the point, so the upper error bar applies.
    pub fn z_err_toward(&self, residual: f64) -> f64 {
        if residual < 0.0 {
            self.z_err_high
        } else {
            self.z_err_low
        }
    }

    /// Fill zero (unspecified) uncertainties from the defaults.
    ///
    /// The low-field floor is applied first so the default `y` uncertainty is
    /// computed from the floored value. Applying this twice changes nothing.
    pub fn apply_defaults(&mut self, defaults: &Defaults, reference: ResponseReference) {
        if self.y == 0.0 {
            self.y = defaults.low_field;
        }

        let x_default = self.x.abs() * defaults.energy_uncertainty;
        fill(&mut self.x_err_low, x_default);
        fill(&mut self.x_err_high, x_default);

        let y_default = self.y.abs() * defaults.field_uncertainty;
        fill(&mut self.y_err_low, y_default);
        fill(&mut self.y_err_high, y_default);

        let z_ref = match reference {
            ResponseReference::Response => self.z,
            ResponseReference::Energy => self.x,
        };
        let z_default = z_ref.abs() * defaults.yield_uncertainty;
        fill(&mut self.z_err_low, z_default);
        fill(&mut self.z_err_high, z_default);
    }
}

fn fill(err: &mut f64, default: f64) {
    if *err == 0.0 {
        *err = default;
    }
}
