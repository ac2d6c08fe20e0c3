use statrs::function::factorial::ln_factorial;
use tracing::trace;

use crate::chemistry::constants::MASS_ELECTRON;
use crate::chemistry::elements::{IsotopeRecord, IsotopeReference, IsotopeTable};
use crate::chemistry::formula::{formula_map, ChemicalFormula};
use crate::data::pattern::TracedPattern;
use crate::error::TracerError;

/// Produces the natural abundance isotope pattern of a chemical formula.
pub trait NaturalPatternGenerator: Send + Sync {
    /// generate the centroided natural isotope pattern of a formula
    ///
    /// Arguments:
    ///
    /// * `formula` - chemical formula, possibly bracketed and charged, e.g. `[C5H9NO4]+`
    /// * `min_abundance` - isotopologues with a lower probability are dropped
    /// * `scale` - intensity of the most intense peak
    /// * `mz_tolerance` - peaks at most this far apart are merged into the lighter one
    ///
    /// Returns:
    ///
    /// * `Result<TracedPattern, TracerError>` - the pattern without heavy isotope annotations
    fn generate(
        &self,
        formula: &str,
        min_abundance: f64,
        scale: f32,
        mz_tolerance: f64,
    ) -> Result<TracedPattern, TracerError>;
}

/// A single isotopologue: exact mass, probability and composition string.
#[derive(Clone, Debug, PartialEq)]
struct Isotopologue {
    mass: f64,
    probability: f64,
    composition: String,
}

/// Exact isotopic fine structure generator.
///
/// Enumerates every isotopic distribution of every element of the formula, combines the
/// elements in formula order and keeps each isotopologue as a separate peak, annotated with its
/// composition, e.g. `[12]C[14]N`.
#[derive(Clone, Debug)]
pub struct FineStructureGenerator<R: IsotopeReference> {
    reference: R,
}

impl<R: IsotopeReference> FineStructureGenerator<R> {
    pub fn new(reference: R) -> Self {
        FineStructureGenerator { reference }
    }

    pub fn reference(&self) -> &R {
        &self.reference
    }

    fn isotopologues(&self, body: &str, min_abundance: f64) -> Result<Vec<Isotopologue>, TracerError> {
        let elements = formula_map(body).map_err(|e| TracerError::GeneratorFailure(e.to_string()))?;
        if elements.is_empty() {
            return Err(TracerError::GeneratorFailure(format!("no elements in formula '{body}'")));
        }

        let mut cumulative = vec![Isotopologue { mass: 0.0, probability: 1.0, composition: String::new() }];

        for (element, &count) in elements.iter() {
            if count < 0 {
                return Err(TracerError::GeneratorFailure(format!(
                    "negative count {count} for element {element}"
                )));
            }
            let isotopes = self
                .reference
                .natural_isotopes(element)
                .map_err(|e| TracerError::GeneratorFailure(e.to_string()))?;
            if isotopes.is_empty() {
                return Err(TracerError::GeneratorFailure(format!(
                    "element {element} has no natural isotopes"
                )));
            }

            let distribution = element_distribution(element, &isotopes, count as u32, min_abundance);

            let mut combined = Vec::with_capacity(cumulative.len() * distribution.len());
            for a in &cumulative {
                for b in &distribution {
                    let probability = a.probability * b.probability;
                    // products only shrink, pruning partial isotopologues is exact
                    if probability < min_abundance {
                        continue;
                    }
                    combined.push(Isotopologue {
                        mass: a.mass + b.mass,
                        probability,
                        composition: format!("{}{}", a.composition, b.composition),
                    });
                }
            }
            trace!("{} isotopologues after adding {}{}", combined.len(), element, count);
            cumulative = combined;
        }

        Ok(cumulative)
    }
}

impl Default for FineStructureGenerator<&'static IsotopeTable> {
    fn default() -> Self {
        FineStructureGenerator::new(IsotopeTable::shared())
    }
}

impl<R: IsotopeReference> NaturalPatternGenerator for FineStructureGenerator<R> {
    fn generate(
        &self,
        formula: &str,
        min_abundance: f64,
        scale: f32,
        mz_tolerance: f64,
    ) -> Result<TracedPattern, TracerError> {
        let chemical_formula: ChemicalFormula = formula
            .parse()
            .map_err(|e: TracerError| TracerError::GeneratorFailure(e.to_string()))?;
        let charge = chemical_formula
            .charge()
            .map_err(|e| TracerError::GeneratorFailure(e.to_string()))?;

        let mut isotopologues = self.isotopologues(&chemical_formula.body, min_abundance)?;
        if charge != 0 {
            for isotopologue in isotopologues.iter_mut() {
                isotopologue.mass = mass_to_mz(isotopologue.mass, charge);
            }
        }
        isotopologues.sort_by(|a, b| a.mass.total_cmp(&b.mass));

        let peaks = merge_within_tolerance(isotopologues, mz_tolerance);
        trace!("{} peaks for {} within {} Da", peaks.len(), formula, mz_tolerance);

        let max = peaks.iter().map(|peak| peak.probability).fold(0.0, f64::max);
        if peaks.is_empty() || max <= 0.0 {
            return Ok(TracedPattern::empty());
        }

        let mut mz = Vec::with_capacity(peaks.len());
        let mut intensity = Vec::with_capacity(peaks.len());
        let mut compositions = Vec::with_capacity(peaks.len());
        for peak in peaks {
            mz.push(peak.mass);
            intensity.push((peak.probability / max * scale as f64) as f32);
            compositions.push(peak.composition);
        }

        TracedPattern::from_compositions(mz, intensity, compositions)
    }
}

/// convert a neutral mass to the m/z of an ion that lost or gained `charge` electrons
///
/// Arguments:
///
/// * `mass` - neutral monoisotopic or isotopologue mass
/// * `charge` - signed charge, must not be zero
///
/// Returns:
///
/// * `f64` - m/z value
///
/// # Examples
///
/// ```
/// use mstracer::algorithm::isotope::mass_to_mz;
///
/// let mz = mass_to_mz(12.0, 1);
/// assert!((mz - 11.99945142009054).abs() < 1e-12);
/// ```
pub fn mass_to_mz(mass: f64, charge: i32) -> f64 {
    (mass - charge as f64 * MASS_ELECTRON) / charge.unsigned_abs() as f64
}

// all ways to distribute `count` atoms over the isotopes of one element, with multinomial
// probability; isotopes enter the composition in ascending mass number, zero counts omitted
fn element_distribution(
    element: &str,
    isotopes: &[IsotopeRecord],
    count: u32,
    min_abundance: f64,
) -> Vec<Isotopologue> {
    let ln_count = ln_factorial(count as u64);
    partitions(count, isotopes.len())
        .into_iter()
        .filter_map(|counts| {
            let ln_probability = counts.iter().zip(isotopes).fold(ln_count, |acc, (&k, isotope)| {
                if k == 0 {
                    acc
                } else {
                    acc - ln_factorial(k as u64) + k as f64 * isotope.abundance.ln()
                }
            });
            let probability = ln_probability.exp();
            if probability < min_abundance {
                return None;
            }

            let mut mass = 0.0;
            let mut composition = String::new();
            for (&k, isotope) in counts.iter().zip(isotopes) {
                if k == 0 {
                    continue;
                }
                mass += k as f64 * isotope.exact_mass;
                composition.push_str(&format!("[{}]{}", isotope.mass_number, element));
                if k > 1 {
                    composition.push_str(&k.to_string());
                }
            }
            Some(Isotopologue { mass, probability, composition })
        })
        .collect()
}

// every vector of `slots` non-negative integers summing up to `total`
fn partitions(total: u32, slots: usize) -> Vec<Vec<u32>> {
    if slots == 0 {
        return if total == 0 { vec![Vec::new()] } else { Vec::new() };
    }
    if slots == 1 {
        return vec![vec![total]];
    }
    let mut result = Vec::new();
    for first in (0..=total).rev() {
        for mut rest in partitions(total - first, slots - 1) {
            rest.insert(0, first);
            result.push(rest);
        }
    }
    result
}

// `isotopologues` must be sorted by mass; a peak absorbs all following peaks within tolerance
fn merge_within_tolerance(isotopologues: Vec<Isotopologue>, mz_tolerance: f64) -> Vec<Isotopologue> {
    let mut merged: Vec<Isotopologue> = Vec::with_capacity(isotopologues.len());
    for isotopologue in isotopologues {
        match merged.last_mut() {
            Some(last) if isotopologue.mass - last.mass <= mz_tolerance => {
                last.probability += isotopologue.probability;
            }
            _ => merged.push(isotopologue),
        }
    }
    merged
}
