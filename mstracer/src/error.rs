use thiserror::Error;

/// Errors raised while parsing formulae or simulating traced isotope patterns.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TracerError {
    /// A formula, capacity or tracer argument does not match its grammar, holds a count
    /// beyond `i32`, or asks for more atoms than the formula has.
    #[error("Invalid formula: {0}")]
    InvalidFormula(String),
    #[error("(Sum of) rate(s) must be in [0,1], got {inc1}, {inc2} and {inc_both}")]
    InvalidRates { inc1: f64, inc2: f64, inc_both: f64 },
    #[error("Unknown isotope: {mass_number}{element}")]
    UnknownIsotope { element: String, mass_number: u16 },
    /// The natural abundance pattern generator could not produce a pattern.
    #[error("Isotope pattern generation failed: {0}")]
    GeneratorFailure(String),
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Failed to build thread pool: {0}")]
    ThreadPool(String),
}
