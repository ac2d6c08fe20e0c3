use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::algorithm::isotope::{FineStructureGenerator, NaturalPatternGenerator};
use crate::algorithm::tracer::{add_tracer_composition, add_tracer_mass, set_heavy_isotopes};
use crate::chemistry::elements::{IsotopeReference, IsotopeTable};
use crate::chemistry::formula::{
    check_capacity, formula_map, reduce_formula, validate, ChemicalFormula, ElementCounts, FormulaGrammar, Nuclide,
};
use crate::data::pattern::TracedPattern;
use crate::error::TracerError;

/// Settings handed to the natural pattern generator and the final normalization
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatternParameters {
    /// Isotopologues with a lower probability are dropped (default: 1e-4)
    pub min_abundance: f64,
    /// Intensity of the most intense peak of the simulated pattern (default: 1.0)
    pub intensity_scale: f32,
    /// Natural peaks at most this many Da apart are merged (default: 1e-4)
    pub mz_tolerance: f64,
}

impl Default for PatternParameters {
    fn default() -> Self {
        PatternParameters { min_abundance: 1e-4, intensity_scale: 1.0, mz_tolerance: 1e-4 }
    }
}

/// A labeling experiment: which molecule, which atoms can be labeled, with which tracers, and
/// which share of the pool ended up in each labeling state.
///
/// Incorporation rates are fractions of the pool, already corrected for natural abundance. The
/// unlabeled share is `1 - inc1 - inc2 - inc_both`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TracerExperiment {
    /// Sum formula of the molecule, optionally bracketed and charged, e.g. `C5H9NO4+`
    pub chemical_formula: String,
    /// Atoms a tracer can occupy, e.g. `C5N`
    pub capacity_formula: String,
    /// First tracer, e.g. `13C`
    pub tracer1: Option<String>,
    /// Second tracer, e.g. `15N`
    pub tracer2: Option<String>,
    /// Share labeled by the first tracer only
    pub inc1: f64,
    /// Share labeled by the second tracer only
    pub inc2: f64,
    /// Share labeled by both tracers
    pub inc_both: f64,
    #[serde(default)]
    pub parameters: PatternParameters,
}

impl TracerExperiment {
    /// An experiment without tracers, all of the pool is unlabeled.
    pub fn new(chemical_formula: impl Into<String>, capacity_formula: impl Into<String>) -> Self {
        TracerExperiment {
            chemical_formula: chemical_formula.into(),
            capacity_formula: capacity_formula.into(),
            tracer1: None,
            tracer2: None,
            inc1: 0.0,
            inc2: 0.0,
            inc_both: 0.0,
            parameters: PatternParameters::default(),
        }
    }

    pub fn with_tracer1(mut self, tracer: impl Into<String>, inc: f64) -> Self {
        self.tracer1 = Some(tracer.into());
        self.inc1 = inc;
        self
    }

    pub fn with_tracer2(mut self, tracer: impl Into<String>, inc: f64) -> Self {
        self.tracer2 = Some(tracer.into());
        self.inc2 = inc;
        self
    }

    pub fn with_inc_both(mut self, inc: f64) -> Self {
        self.inc_both = inc;
        self
    }

    pub fn with_parameters(mut self, parameters: PatternParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// share of the pool carrying any label
    pub fn total_incorporation(&self) -> f64 {
        self.inc1 + self.inc2 + self.inc_both
    }
}

/// Simulates the isotope pattern of a molecule pool mixed from an unlabeled, two single labeled
/// and one double labeled population.
///
/// The natural pattern generator and the isotope reference are injected, the default wires
/// [`FineStructureGenerator`] over the shared [`IsotopeTable`].
#[derive(Clone, Debug)]
pub struct TracedPatternSimulator<G, R> {
    generator: G,
    reference: R,
}

/// simulator over the exact fine structure generator and the shared isotope table
pub type DefaultSimulator = TracedPatternSimulator<FineStructureGenerator<&'static IsotopeTable>, &'static IsotopeTable>;

impl Default for DefaultSimulator {
    fn default() -> Self {
        TracedPatternSimulator::new(FineStructureGenerator::default(), IsotopeTable::shared())
    }
}

impl<G: NaturalPatternGenerator, R: IsotopeReference> TracedPatternSimulator<G, R> {
    pub fn new(generator: G, reference: R) -> Self {
        TracedPatternSimulator { generator, reference }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn reference(&self) -> &R {
        &self.reference
    }

    /// simulate the traced isotope pattern of an experiment
    ///
    /// Arguments:
    ///
    /// * `experiment` - formula, capacity, tracers, incorporation rates and pattern parameters
    ///
    /// Returns:
    ///
    /// * `Result<TracedPattern, TracerError>` - centroided pattern, its most intense peak at
    ///   `intensity_scale`, every peak annotated with composition and heavy isotopes
    ///
    /// # Examples
    ///
    /// ```
    /// use mstracer::{DefaultSimulator, TracerExperiment};
    ///
    /// let experiment = TracerExperiment::new("CN", "C")
    ///     .with_tracer1("13C", 0.5)
    ///     .with_tracer2("15N", 0.5);
    /// let pattern = DefaultSimulator::default().simulate(&experiment).unwrap();
    /// assert_eq!(pattern.size(), 4);
    /// assert_eq!(pattern.heavy_isotopes()[3], "[15]N[13]C");
    /// ```
    pub fn simulate(&self, experiment: &TracerExperiment) -> Result<TracedPattern, TracerError> {
        check_parameters(experiment)?;

        let formula: ChemicalFormula = experiment.chemical_formula.parse()?;
        formula.charge()?;
        check_capacity(&formula.body, &experiment.capacity_formula)?;
        let capacity = formula_map(&experiment.capacity_formula)?;
        let tracer1 = parse_tracer(experiment.tracer1.as_deref())?;
        let tracer2 = parse_tracer(experiment.tracer2.as_deref())?;
        let (tracer1, tracer2) = (tracer1.as_ref(), tracer2.as_ref());

        let reduced = |t1: Option<&Nuclide>, t2: Option<&Nuclide>| -> Result<ChemicalFormula, TracerError> {
            Ok(ChemicalFormula {
                body: reduce_formula(&formula.body, &experiment.capacity_formula, t1, t2)?,
                ..formula.clone()
            })
        };
        let reduced1 = reduced(tracer1, None)?;
        let reduced2 = reduced(None, tracer2)?;
        let reduced_both = reduced(tracer1, tracer2)?;
        debug!(
            "reduced formulae of {}: {}, {}, {}",
            experiment.chemical_formula,
            reduced1.bracketed(),
            reduced2.bracketed(),
            reduced_both.bracketed()
        );

        let parameters = &experiment.parameters;
        let natural_weight = (1.0 - experiment.total_incorporation()) as f32;

        let ((natural, labeled1), (labeled2, labeled_both)) = rayon::join(
            || {
                rayon::join(
                    || {
                        self.generator.generate(
                            &experiment.chemical_formula,
                            parameters.min_abundance,
                            natural_weight,
                            parameters.mz_tolerance,
                        )
                    },
                    || self.reduced_pattern(&reduced1, experiment.inc1 as f32, parameters),
                )
            },
            || {
                rayon::join(
                    || self.reduced_pattern(&reduced2, experiment.inc2 as f32, parameters),
                    || self.reduced_pattern(&reduced_both, experiment.inc_both as f32, parameters),
                )
            },
        );

        let natural = natural?;
        let labeled1 = self.label(&labeled1?, &capacity, tracer1, None)?;
        let labeled2 = self.label(&labeled2?, &capacity, None, tracer2)?;
        let labeled_both = self.label(&labeled_both?, &capacity, tracer1, tracer2)?;
        debug!(
            "sub-pattern sizes: natural {}, tracer1 {}, tracer2 {}, both {}",
            natural.size(),
            labeled1.size(),
            labeled2.size(),
            labeled_both.size()
        );

        let merged = natural
            .merge(&labeled1)
            .merge(&labeled2)
            .merge(&labeled_both)
            .normalize(parameters.intensity_scale);

        set_heavy_isotopes(&self.reference, &merged)
    }

    /// simulate many experiments in parallel
    ///
    /// Arguments:
    ///
    /// * `experiments` - the experiments to simulate
    /// * `num_threads` - number of threads to use
    ///
    /// Returns:
    ///
    /// * `Result<Vec<TracedPattern>, TracerError>` - one pattern per experiment, in input order;
    ///   the first failing experiment fails the batch
    pub fn simulate_batch(
        &self,
        experiments: &[TracerExperiment],
        num_threads: usize,
    ) -> Result<Vec<TracedPattern>, TracerError> {
        let thread_pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| TracerError::ThreadPool(e.to_string()))?;
        thread_pool.install(|| experiments.par_iter().map(|experiment| self.simulate(experiment)).collect())
    }

    // natural pattern of a reduced formula, a single point at zero if nothing is left to generate
    fn reduced_pattern(
        &self,
        reduced: &ChemicalFormula,
        weight: f32,
        parameters: &PatternParameters,
    ) -> Result<TracedPattern, TracerError> {
        if reduced.body.is_empty() {
            return Ok(TracedPattern::single_point(weight));
        }
        self.generator
            .generate(&reduced.bracketed(), parameters.min_abundance, weight, parameters.mz_tolerance)
    }

    fn label(
        &self,
        pattern: &TracedPattern,
        capacity: &ElementCounts,
        tracer1: Option<&Nuclide>,
        tracer2: Option<&Nuclide>,
    ) -> Result<TracedPattern, TracerError> {
        let shifted = add_tracer_mass(&self.reference, pattern, capacity, tracer1, tracer2)?;
        add_tracer_composition(&shifted, capacity, tracer1, tracer2)
    }
}

/// simulate a traced isotope pattern with the default generator and isotope table
///
/// Arguments:
///
/// * `chemical_formula` - sum formula, optionally bracketed and charged, e.g. `C5H9NO4+`
/// * `capacity_formula` - atoms the tracers can occupy, e.g. `C5N`
/// * `tracer1` - first tracer, e.g. `13C`
/// * `tracer2` - second tracer, e.g. `15N`
/// * `inc1` - share of the pool labeled by the first tracer only
/// * `inc2` - share of the pool labeled by the second tracer only
/// * `inc_both` - share of the pool labeled by both tracers
/// * `min_abundance` - isotopologues with a lower probability are dropped
/// * `intensity_scale` - intensity of the most intense peak
/// * `mz_tolerance` - natural peaks at most this far apart are merged
///
/// Returns:
///
/// * `Result<TracedPattern, TracerError>` - the simulated pattern
///
/// # Examples
///
/// ```
/// use mstracer::simulate_traced_pattern;
///
/// let pattern = simulate_traced_pattern("C", "C", Some("13C"), None, 1.0, 0.0, 0.0, 1e-4, 1.0, 1e-4)
///     .unwrap()
///     .to_mid();
/// assert_eq!(pattern.intensity(), &[0.0, 1.0]);
/// ```
#[allow(clippy::too_many_arguments)]
pub fn simulate_traced_pattern(
    chemical_formula: &str,
    capacity_formula: &str,
    tracer1: Option<&str>,
    tracer2: Option<&str>,
    inc1: f64,
    inc2: f64,
    inc_both: f64,
    min_abundance: f64,
    intensity_scale: f32,
    mz_tolerance: f64,
) -> Result<TracedPattern, TracerError> {
    let experiment = TracerExperiment {
        chemical_formula: chemical_formula.to_string(),
        capacity_formula: capacity_formula.to_string(),
        tracer1: tracer1.map(str::to_string),
        tracer2: tracer2.map(str::to_string),
        inc1,
        inc2,
        inc_both,
        parameters: PatternParameters { min_abundance, intensity_scale, mz_tolerance },
    };
    DefaultSimulator::default().simulate(&experiment)
}

fn check_parameters(experiment: &TracerExperiment) -> Result<(), TracerError> {
    validate(Some(&experiment.chemical_formula), FormulaGrammar::Chemical)?;
    validate(Some(&experiment.capacity_formula), FormulaGrammar::Uncharged)?;
    validate(experiment.tracer1.as_deref(), FormulaGrammar::Tracer)?;
    validate(experiment.tracer2.as_deref(), FormulaGrammar::Tracer)?;

    let rates = [experiment.inc1, experiment.inc2, experiment.inc_both];
    let total = experiment.total_incorporation();
    if rates.iter().any(|rate| !rate.is_finite() || *rate < 0.0) || !(0.0..=1.0).contains(&total) {
        return Err(TracerError::InvalidRates {
            inc1: experiment.inc1,
            inc2: experiment.inc2,
            inc_both: experiment.inc_both,
        });
    }
    Ok(())
}

fn parse_tracer(tracer: Option<&str>) -> Result<Option<Nuclide>, TracerError> {
    tracer.map(str::parse::<Nuclide>).transpose()
}
