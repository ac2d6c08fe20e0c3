use indexmap::IndexMap;

use crate::chemistry::elements::IsotopeReference;
use crate::chemistry::formula::{isotope_map, to_composition_string, ElementCounts, Nuclide};
use crate::data::pattern::TracedPattern;
use crate::error::TracerError;

/// mass a tracer adds to a molecule when it fills all of its element's capacity
///
/// The mass of the displaced light isotopes is not subtracted, the reduced formula handed to the
/// natural pattern generator already lacks those atoms.
///
/// Arguments:
///
/// * `reference` - isotope reference data
/// * `tracer` - the tracer, if any
/// * `capacity` - element counts of the capacity formula
///
/// Returns:
///
/// * `Result<f64, TracerError>` - `exact_mass(tracer) * capacity[element]`, zero without tracer
///
/// # Examples
///
/// ```
/// use mstracer::algorithm::tracer::mass_shift;
/// use mstracer::chemistry::elements::IsotopeTable;
/// use mstracer::chemistry::formula::{formula_map, Nuclide};
///
/// let c13: Nuclide = "13C".parse().unwrap();
/// let capacity = formula_map("C4N").unwrap();
/// let shift = mass_shift(IsotopeTable::shared(), Some(&c13), &capacity).unwrap();
/// assert_eq!(shift, 4.0 * 13.00335483507);
/// assert_eq!(mass_shift(IsotopeTable::shared(), None, &capacity).unwrap(), 0.0);
/// ```
pub fn mass_shift<R: IsotopeReference>(
    reference: &R,
    tracer: Option<&Nuclide>,
    capacity: &ElementCounts,
) -> Result<f64, TracerError> {
    match tracer {
        None => Ok(0.0),
        Some(tracer) => {
            let mass = reference.exact_mass(&tracer.element, tracer.mass_number)?;
            let factor = capacity.get(&tracer.element).copied().unwrap_or(0);
            Ok(factor as f64 * mass)
        }
    }
}

/// shift every peak by the combined mass of both tracers
pub fn add_tracer_mass<R: IsotopeReference>(
    reference: &R,
    pattern: &TracedPattern,
    capacity: &ElementCounts,
    tracer1: Option<&Nuclide>,
    tracer2: Option<&Nuclide>,
) -> Result<TracedPattern, TracerError> {
    let mut shift = 0.0;
    if tracer1.is_some() {
        shift += mass_shift(reference, tracer1, capacity)?;
    }
    if tracer2.is_some() {
        shift += mass_shift(reference, tracer2, capacity)?;
    }
    Ok(pattern.map_mz(|mz| mz + shift))
}

/// extend every composition by the tracer atoms, e.g. `[12]C3[1]H14` becomes
/// `[12]C3[1]H14[13]C4[15]N` for capacity `C4N` and tracers `13C` and `15N`
///
/// A tracer already present in a composition gets its count raised in place, a new one is
/// appended; a tracer without capacity leaves the composition unchanged.
pub fn add_tracer_composition(
    pattern: &TracedPattern,
    capacity: &ElementCounts,
    tracer1: Option<&Nuclide>,
    tracer2: Option<&Nuclide>,
) -> Result<TracedPattern, TracerError> {
    let tracers: Vec<(&Nuclide, i32)> = [tracer1, tracer2]
        .into_iter()
        .flatten()
        .map(|tracer| (tracer, capacity.get(&tracer.element).copied().unwrap_or(0)))
        .collect();

    pattern.try_map_compositions(|composition| {
        let mut counts = isotope_map(composition)?;
        for &(tracer, count) in &tracers {
            *counts.entry(tracer.clone()).or_insert(0) += count;
        }
        Ok(to_composition_string(&counts))
    })
}

/// annotate every peak with the isotopes of its composition that are heavier than the lightest
/// natural isotope of their element
///
/// Arguments:
///
/// * `reference` - isotope reference data
/// * `pattern` - pattern with isotope compositions
///
/// Returns:
///
/// * `Result<TracedPattern, TracerError>` - the pattern with heavy isotope annotations
///
/// # Examples
///
/// ```
/// use mstracer::algorithm::tracer::set_heavy_isotopes;
/// use mstracer::chemistry::elements::IsotopeTable;
/// use mstracer::TracedPattern;
///
/// let pattern = TracedPattern::from_compositions(
///     vec![26.0, 28.0],
///     vec![1.0, 0.1],
///     vec!["[12]C[14]N".to_string(), "[15]N[13]C".to_string()],
/// ).unwrap();
/// let annotated = set_heavy_isotopes(IsotopeTable::shared(), &pattern).unwrap();
/// assert_eq!(annotated.heavy_isotopes(), &["".to_string(), "[15]N[13]C".to_string()]);
/// ```
pub fn set_heavy_isotopes<R: IsotopeReference>(
    reference: &R,
    pattern: &TracedPattern,
) -> Result<TracedPattern, TracerError> {
    let mut lightest: IndexMap<String, u16> = IndexMap::new();
    let mut heavy_isotopes = Vec::with_capacity(pattern.size());

    for composition in pattern.isotope_composition() {
        let mut heavy = IndexMap::new();
        for (nuclide, count) in isotope_map(composition)? {
            let threshold = match lightest.get(&nuclide.element) {
                Some(&threshold) => threshold,
                None => {
                    let threshold = reference.lightest_natural_mass_number(&nuclide.element)?;
                    lightest.insert(nuclide.element.clone(), threshold);
                    threshold
                }
            };
            if nuclide.mass_number > threshold {
                heavy.insert(nuclide, count);
            }
        }
        heavy_isotopes.push(to_composition_string(&heavy));
    }

    pattern.with_heavy_isotopes(heavy_isotopes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chemistry::elements::IsotopeTable;
    use crate::chemistry::formula::formula_map;

    fn nuclide(s: &str) -> Nuclide {
        s.parse().unwrap()
    }

    fn pattern(mz: Vec<f64>, compositions: &[&str]) -> TracedPattern {
        let intensity = vec![1.0; mz.len()];
        TracedPattern::from_compositions(mz, intensity, compositions.iter().map(|c| c.to_string()).collect())
            .unwrap()
    }

    #[test]
    fn test_mass_shift_without_capacity() {
        let capacity = formula_map("C").unwrap();
        let shift = mass_shift(IsotopeTable::shared(), Some(&nuclide("15N")), &capacity).unwrap();
        assert_eq!(shift, 0.0);
    }

    #[test]
    fn test_mass_shift_unknown_isotope() {
        let result = mass_shift(IsotopeTable::shared(), Some(&nuclide("19C")), &formula_map("C").unwrap());
        assert_eq!(
            result,
            Err(TracerError::UnknownIsotope { element: "C".to_string(), mass_number: 19 })
        );
    }

    #[test]
    fn test_add_tracer_mass() {
        let table = IsotopeTable::shared();
        let capacity = formula_map("CN").unwrap();
        let p = pattern(vec![0.0, 12.0], &["", "[12]C"]);
        let shifted =
            add_tracer_mass(table, &p, &capacity, Some(&nuclide("13C")), Some(&nuclide("15N"))).unwrap();
        let expected = 13.00335483507 + 15.00010889888;
        assert_eq!(shifted.mz(), &[expected, 12.0 + expected]);
        assert_eq!(shifted.intensity(), p.intensity());
        assert_eq!(p.mz(), &[0.0, 12.0]);
    }

    #[test]
    fn test_add_tracer_composition() {
        let capacity = formula_map("C4N").unwrap();
        let p = pattern(vec![1.0, 2.0], &["[12]C3[1]H14[16]O[28]Si", "[13]C[1]H14"]);
        let extended =
            add_tracer_composition(&p, &capacity, Some(&nuclide("13C")), Some(&nuclide("15N"))).unwrap();
        assert_eq!(
            extended.isotope_composition(),
            &["[12]C3[1]H14[16]O[28]Si[13]C4[15]N", "[13]C5[1]H14[15]N"].map(String::from)
        );
    }

    #[test]
    fn test_add_tracer_composition_without_capacity() {
        let capacity = formula_map("C").unwrap();
        let p = pattern(vec![1.0], &["[12]C[14]N"]);
        let extended = add_tracer_composition(&p, &capacity, None, Some(&nuclide("15N"))).unwrap();
        assert_eq!(extended.isotope_composition()[0], "[12]C[14]N");
    }

    #[test]
    fn test_add_tracer_composition_rejects_overflowing_counts() {
        let capacity = formula_map("C").unwrap();
        let p = pattern(vec![1.0], &["[12]C99999999999"]);
        let result = add_tracer_composition(&p, &capacity, Some(&nuclide("13C")), None);
        assert!(matches!(result, Err(TracerError::InvalidFormula(_))));
    }

    #[test]
    fn test_heavy_isotopes() {
        let p = pattern(vec![1.0, 2.0, 3.0], &["[12]C2[1]H4", "[12]C[13]C[2]H[1]H3", "[14]C2"]);
        let annotated = set_heavy_isotopes(IsotopeTable::shared(), &p).unwrap();
        assert_eq!(annotated.heavy_isotopes(), &["", "[13]C[2]H", "[14]C2"].map(String::from));
        assert_eq!(annotated.isotope_composition(), p.isotope_composition());
    }

    #[test]
    fn test_heavy_isotopes_unknown_element() {
        let p = pattern(vec![1.0], &["[12]Xx"]);
        assert!(matches!(
            set_heavy_isotopes(IsotopeTable::shared(), &p),
            Err(TracerError::UnknownIsotope { .. })
        ));
    }
}
