use mstracer::chemistry::elements::{IsotopeReference, IsotopeTable};
use mstracer::chemistry::formula::{formula_map, isotope_map};
use mstracer::algorithm::tracer::set_heavy_isotopes;
use mstracer::{simulate_traced_pattern, DefaultSimulator, TracedPattern, TracerError, TracerExperiment};

fn finalize(pattern: TracedPattern) -> TracedPattern {
    pattern.round_mz(6).round_intensities(6).to_mid()
}

#[allow(clippy::too_many_arguments)]
fn simulate(
    formula: &str,
    capacity: &str,
    tracer1: Option<&str>,
    tracer2: Option<&str>,
    inc1: f64,
    inc2: f64,
    inc_both: f64,
    min_abundance: f64,
) -> TracedPattern {
    let pattern =
        simulate_traced_pattern(formula, capacity, tracer1, tracer2, inc1, inc2, inc_both, min_abundance, 1.0, 1e-4)
            .unwrap();
    finalize(pattern)
}

fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected} ± {tolerance}, got {actual}"
    );
}

#[test_log::test]
fn single_carbon_half_labeled() {
    let pattern = simulate("C", "C", Some("13C"), None, 0.5, 0.0, 0.0, 1e-4);

    assert_eq!(pattern.size(), 2);
    assert_close(pattern.mz()[0], 12.0000, 1e-4);
    assert_close(pattern.mz()[1], 13.0034, 1e-4);
    assert_close(pattern.intensity()[0] as f64, 0.5, 0.01);
    assert_close(pattern.intensity()[1] as f64, 0.5, 0.01);
    assert_eq!(pattern.heavy_isotopes(), &["".to_string(), "[13]C".to_string()]);
}

#[test_log::test]
fn tracer_without_capacity_is_ignored() {
    let expected = simulate("C", "C", Some("13C"), None, 0.5, 0.0, 0.0, 1e-4);
    let pattern = simulate("C", "C", Some("13C"), Some("15N"), 0.5, 0.5, 0.0, 1e-4);

    assert_eq!(pattern.size(), expected.size());
    assert_eq!(pattern.mz(), expected.mz());
    assert_eq!(pattern.heavy_isotopes(), expected.heavy_isotopes());
    for (a, b) in pattern.intensity().iter().zip(expected.intensity()) {
        assert_close(*a as f64, *b as f64, 0.01);
    }
}

#[test_log::test]
fn fully_labeled_pool() {
    let pattern = simulate("C", "C", Some("13C"), None, 1.0, 0.0, 0.0, 1e-4);

    assert_eq!(pattern.size(), 2);
    assert_eq!(pattern.intensity(), &[0.0, 1.0]);
}

#[test_log::test]
fn carbon_labeled_with_nitrogen_tracer() {
    let pattern = simulate("CN", "C", Some("13C"), Some("15N"), 0.5, 0.5, 0.0, 1e-4);

    assert_eq!(pattern.size(), 4);
    for (mz, expected) in pattern.mz().iter().zip([26.0031, 27.0001, 27.0064, 28.0035]) {
        assert_close(*mz, expected, 1e-4);
    }
    assert_close(pattern.intensity()[0] as f64, 0.5, 0.01);
    assert_close(pattern.intensity()[2] as f64, 0.5, 0.01);
    assert_eq!(
        pattern.heavy_isotopes(),
        &["", "[15]N", "[13]C", "[15]N[13]C"].map(String::from)
    );
}

#[test_log::test]
fn nitrogen_labeled_with_carbon_tracer() {
    let pattern = simulate("CN", "N", Some("13C"), Some("15N"), 0.5, 0.5, 0.0, 1e-4);

    assert_eq!(pattern.size(), 4);
    assert_close(pattern.intensity()[0] as f64, 0.5, 0.01);
    assert_close(pattern.intensity()[1] as f64, 0.5, 0.01);
}

#[test_log::test]
fn double_tracer_mixture() {
    let pattern = simulate("CN", "CN", Some("13C"), Some("15N"), 0.2, 0.2, 0.2, 1e-4);

    assert_eq!(pattern.size(), 4);
    for (intensity, expected) in pattern.intensity().iter().zip([0.4, 0.2, 0.2, 0.2]) {
        assert_close(*intensity as f64, expected, 0.01);
    }
}

#[test_log::test]
fn natural_abundance_only() {
    let pattern = simulate("CN", "CN", None, None, 0.0, 0.0, 0.0, 1e-5);

    assert_eq!(pattern.size(), 4);
    for (intensity, expected) in pattern.intensity().iter().zip([0.9857, 0.0036, 0.0107, 0.0000]) {
        assert_close(*intensity as f64, expected, 1e-4);
    }
    assert_eq!(
        pattern.heavy_isotopes(),
        &["", "[15]N", "[13]C", "[13]C[15]N"].map(String::from)
    );
}

fn experiments() -> Vec<TracerExperiment> {
    vec![
        TracerExperiment::new("C", "C").with_tracer1("13C", 0.5),
        TracerExperiment::new("CN", "C").with_tracer1("13C", 0.5).with_tracer2("15N", 0.5),
        TracerExperiment::new("CN", "CN").with_tracer1("13C", 0.2).with_tracer2("15N", 0.2).with_inc_both(0.2),
        TracerExperiment::new("C5H9NO4", "C5N").with_tracer1("13C", 0.5).with_tracer2("15N", 0.1).with_inc_both(0.2),
        TracerExperiment::new("C3H7NO2S", "C3").with_tracer1("13C", 0.4),
        TracerExperiment::new("[C6H12O6]-", "C6").with_tracer1("13C", 0.3).with_tracer2("2H", 0.0),
    ]
}

#[test_log::test]
fn mid_sums_to_one() {
    let simulator = DefaultSimulator::default();
    for experiment in experiments() {
        let pattern = simulator.simulate(&experiment).unwrap();
        let mid = pattern.to_mid();
        let total: f64 = mid.intensity().iter().map(|&i| i as f64).sum();
        assert_close(total, 1.0, 1e-5);
        assert_eq!(mid.mz(), pattern.mz());
        assert_eq!(mid.isotope_composition(), pattern.isotope_composition());
        assert_eq!(mid.heavy_isotopes(), pattern.heavy_isotopes());
    }
}

#[test_log::test]
fn heavy_isotopes_are_part_of_the_composition() {
    let simulator = DefaultSimulator::default();
    let table = IsotopeTable::shared();
    for experiment in experiments() {
        let pattern = simulator.simulate(&experiment).unwrap();
        for (_, _, composition, heavy) in pattern.peaks() {
            let composition = isotope_map(composition).unwrap();
            for (nuclide, count) in isotope_map(heavy).unwrap() {
                assert_eq!(composition.get(&nuclide), Some(&count), "{nuclide} missing in composition");
                let lightest = table.lightest_natural_mass_number(&nuclide.element).unwrap();
                assert!(nuclide.mass_number > lightest);
            }
        }
    }
}

#[test_log::test]
fn compositions_conserve_atoms() {
    let simulator = DefaultSimulator::default();
    for experiment in experiments() {
        let pattern = simulator.simulate(&experiment).unwrap();
        let body: mstracer::chemistry::formula::ChemicalFormula = experiment.chemical_formula.parse().unwrap();
        let formula = formula_map(&body.body).unwrap();
        for composition in pattern.isotope_composition() {
            let mut atoms = std::collections::HashMap::new();
            for (nuclide, count) in isotope_map(composition).unwrap() {
                *atoms.entry(nuclide.element).or_insert(0) += count;
            }
            for (element, count) in formula.iter() {
                assert_eq!(atoms.get(element), Some(count), "{composition} does not hold {count} {element}");
            }
        }
    }
}

#[test_log::test]
fn tracer_count_respects_capacity() {
    let simulator = DefaultSimulator::default();
    let experiment = TracerExperiment::new("C2N", "C2").with_tracer1("13C", 0.6).with_tracer2("15N", 0.3);
    let capacity = formula_map(&experiment.capacity_formula).unwrap();
    let pattern = simulator.simulate(&experiment).unwrap();
    for composition in pattern.isotope_composition() {
        for (nuclide, count) in isotope_map(composition).unwrap() {
            if nuclide.to_string() == "13C" {
                assert!(count <= capacity["C"]);
            }
        }
    }
}

#[test_log::test]
fn rounding_merges_in_order_of_first_occurrence() {
    let pattern = TracedPattern::from_compositions(
        vec![13.0000004, 12.0, 12.9999996, 14.0],
        vec![0.1, 0.2, 0.3, 0.4],
        vec!["first".to_string(), "b".to_string(), "second".to_string(), "c".to_string()],
    )
    .unwrap();

    let rounded = pattern.round_mz(6);
    assert_eq!(rounded.mz(), &[13.0, 12.0, 14.0]);
    assert_close(rounded.intensity()[0] as f64, 0.4, 1e-6);
    assert_eq!(rounded.isotope_composition()[0], "first");
}

#[test_log::test]
fn rounding_keeps_heavy_isotopes_of_first_occurrence() {
    let pattern = TracedPattern::from_compositions(
        vec![27.00640004, 26.0031, 27.00639996],
        vec![0.2, 0.5, 0.3],
        vec!["[12]C[15]N".to_string(), "[12]C[14]N".to_string(), "[13]C[14]N".to_string()],
    )
    .unwrap();
    let annotated = set_heavy_isotopes(IsotopeTable::shared(), &pattern).unwrap();
    assert_eq!(annotated.heavy_isotopes(), &["[15]N", "", "[13]C"].map(String::from));

    let rounded = annotated.round_mz(4);
    assert_eq!(rounded.mz(), &[27.0064, 26.0031]);
    assert_close(rounded.intensity()[0] as f64, 0.5, 1e-6);
    assert_eq!(rounded.isotope_composition(), &["[12]C[15]N", "[12]C[14]N"].map(String::from));
    assert_eq!(rounded.heavy_isotopes(), &["[15]N", ""].map(String::from));
}

#[test_log::test]
fn tracers_of_one_element_share_its_capacity() {
    let result = simulate_traced_pattern("C3", "C2", Some("13C"), Some("14C"), 0.0, 0.0, 0.5, 1e-4, 1.0, 1e-4);
    assert!(matches!(result, Err(TracerError::InvalidFormula(_))));

    let pattern = simulate("C4", "C2", Some("13C"), Some("14C"), 0.0, 0.0, 0.5, 1e-4);
    for composition in pattern.isotope_composition() {
        let carbons: i32 = isotope_map(composition).unwrap().values().sum();
        assert_eq!(carbons, 4, "{composition} does not hold 4 C");
    }
}

#[test_log::test]
fn overflowing_counts_are_rejected() {
    let result =
        simulate_traced_pattern("C99999999999", "C", Some("13C"), None, 0.5, 0.0, 0.0, 1e-4, 1.0, 1e-4);
    assert!(matches!(result, Err(TracerError::InvalidFormula(_))));
}

#[test_log::test]
fn invalid_arguments_are_rejected() {
    let result = simulate_traced_pattern("C", "C", Some("13C"), None, 0.6, 0.6, 0.0, 1e-4, 1.0, 1e-4);
    assert!(matches!(result, Err(TracerError::InvalidRates { .. })));

    let result = simulate_traced_pattern("C", "N", Some("13C"), None, 0.5, 0.0, 0.0, 1e-4, 1.0, 1e-4);
    assert!(matches!(result, Err(TracerError::InvalidFormula(_))));
}
