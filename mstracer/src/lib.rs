//! Simulation of isotope patterns for stable isotope tracing experiments.
//!
//! Given a sum formula, the sub-formula that a tracer can label (the capacity), up to two
//! heavy isotope tracers and the natural abundance corrected incorporation of each labeling
//! state, [`simulate_traced_pattern`] produces the centroided spectrum of the mixed pool,
//! annotated with the isotopic composition and the heavy isotopes of every peak.
//!
//! ```
//! use mstracer::simulate_traced_pattern;
//!
//! let pattern = simulate_traced_pattern("C", "C", Some("13C"), None, 0.5, 0.0, 0.0, 1e-4, 1.0, 1e-4)
//!     .unwrap()
//!     .round_mz(6)
//!     .round_intensities(6)
//!     .to_mid();
//! assert_eq!(pattern.size(), 2);
//! assert_eq!(pattern.heavy_isotopes()[1], "[13]C");
//! ```

pub mod error;

// chemistry module
pub mod chemistry {
    pub mod constants;
    pub mod elements;
    pub mod formula;
}

// algorithm module
pub mod algorithm {
    pub mod isotope;
    pub mod tracer;
}

// data module
pub mod data {
    pub mod pattern;
}

// simulation module
pub mod simulation {
    pub mod traced;
}

pub use crate::data::pattern::{SpectrumType, TracedPattern};
pub use crate::error::TracerError;
pub use crate::simulation::traced::{
    simulate_traced_pattern, DefaultSimulator, PatternParameters, TracedPatternSimulator, TracerExperiment,
};
