/// Rest mass of the electron in unified atomic mass units.
pub const MASS_ELECTRON: f64 = 0.00054857990946;
