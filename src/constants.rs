//! Physical constants (SI, CODATA 2018).

/// Elementary charge (C).
pub const ELEMENTARY_CHARGE: f64 = 1.602176634e-19;

/// Electron rest mass (kg).
pub const ELECTRON_MASS: f64 = 9.1093837015e-31;

/// Vacuum permittivity (F/m).
pub const VACUUM_PERMITTIVITY: f64 = 8.8541878128e-12;

/// e / (4π ε0): Coulomb energy of two electrons one metre apart, in eV.
pub const COULOMB_CONSTANT_EV_M: f64 =
    ELEMENTARY_CHARGE / (4.0 * std::f64::consts::PI * VACUUM_PERMITTIVITY);
