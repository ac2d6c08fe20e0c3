use std::fmt::{self, Display, Formatter};

use indexmap::map::Entry;
use indexmap::IndexMap;
use itertools::izip;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::TracerError;

/// Represents the type of spectrum, traced patterns are always centroided.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpectrumType {
    #[default]
    Centroided,
}

impl Display for SpectrumType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SpectrumType::Centroided => write!(f, "Centroided"),
        }
    }
}

/// An isotope pattern whose peaks carry the isotopic composition of the contributing
/// isotopologues and the heavy isotopes among them.
///
/// All four per-peak vectors always have the same length. Every transformation returns a
/// new pattern and leaves `self` untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PatternColumns")]
pub struct TracedPattern {
    mz: Vec<f64>,
    intensity: Vec<f32>,
    isotope_composition: Vec<String>,
    heavy_isotopes: Vec<String>,
    spectrum_type: SpectrumType,
}

// serialized form of a TracedPattern, checked by TracedPattern::new before use
#[derive(Deserialize)]
struct PatternColumns {
    mz: Vec<f64>,
    intensity: Vec<f32>,
    isotope_composition: Vec<String>,
    heavy_isotopes: Vec<String>,
    #[serde(default)]
    spectrum_type: SpectrumType,
}

impl TryFrom<PatternColumns> for TracedPattern {
    type Error = TracerError;

    fn try_from(columns: PatternColumns) -> Result<Self, Self::Error> {
        TracedPattern::new(
            columns.mz,
            columns.intensity,
            columns.isotope_composition,
            columns.heavy_isotopes,
            columns.spectrum_type,
        )
    }
}

/// one row of a [`TracedPattern`]: m/z, intensity, isotope composition and heavy isotopes
pub type TracedPeak<'a> = (f64, f32, &'a str, &'a str);

impl TracedPattern {
    /// Constructs a new `TracedPattern`.
    ///
    /// # Arguments
    ///
    /// * `mz` - m/z values
    /// * `intensity` - intensities corresponding to the m/z values
    /// * `isotope_composition` - composition string of every peak
    /// * `heavy_isotopes` - heavy isotope string of every peak
    /// * `spectrum_type` - kind of spectrum
    ///
    /// # Errors
    ///
    /// `InvalidPattern` if the vectors differ in length.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use mstracer::{SpectrumType, TracedPattern};
    /// let pattern = TracedPattern::new(
    ///     vec![12.0, 13.00335483507],
    ///     vec![1.0, 0.0108],
    ///     vec!["[12]C".to_string(), "[13]C".to_string()],
    ///     vec![String::new(), "[13]C".to_string()],
    ///     SpectrumType::Centroided,
    /// ).unwrap();
    /// assert_eq!(pattern.size(), 2);
    /// assert!(TracedPattern::new(vec![12.0], vec![], vec![], vec![], SpectrumType::Centroided).is_err());
    /// ```
    pub fn new(
        mz: Vec<f64>,
        intensity: Vec<f32>,
        isotope_composition: Vec<String>,
        heavy_isotopes: Vec<String>,
        spectrum_type: SpectrumType,
    ) -> Result<Self, TracerError> {
        let n = mz.len();
        if intensity.len() != n || isotope_composition.len() != n || heavy_isotopes.len() != n {
            return Err(TracerError::InvalidPattern(format!(
                "{} m/z values, {} intensities, {} compositions and {} heavy isotope annotations",
                n,
                intensity.len(),
                isotope_composition.len(),
                heavy_isotopes.len()
            )));
        }
        Ok(TracedPattern { mz, intensity, isotope_composition, heavy_isotopes, spectrum_type })
    }

    /// centroided pattern without heavy isotope annotations yet
    pub fn from_compositions(
        mz: Vec<f64>,
        intensity: Vec<f32>,
        isotope_composition: Vec<String>,
    ) -> Result<Self, TracerError> {
        let heavy_isotopes = vec![String::new(); mz.len()];
        TracedPattern::new(mz, intensity, isotope_composition, heavy_isotopes, SpectrumType::Centroided)
    }

    /// A single peak at m/z 0 with an empty composition.
    ///
    /// Stands in for the natural pattern of a formula that has no atoms left once all labeled
    /// atoms are removed; shifting it by the tracer mass puts it at the fully labeled mass.
    pub fn single_point(intensity: f32) -> Self {
        TracedPattern {
            mz: vec![0.0],
            intensity: vec![intensity],
            isotope_composition: vec![String::new()],
            heavy_isotopes: vec![String::new()],
            spectrum_type: SpectrumType::Centroided,
        }
    }

    pub fn empty() -> Self {
        TracedPattern {
            mz: Vec::new(),
            intensity: Vec::new(),
            isotope_composition: Vec::new(),
            heavy_isotopes: Vec::new(),
            spectrum_type: SpectrumType::Centroided,
        }
    }

    pub fn mz(&self) -> &[f64] {
        &self.mz
    }

    pub fn intensity(&self) -> &[f32] {
        &self.intensity
    }

    pub fn isotope_composition(&self) -> &[String] {
        &self.isotope_composition
    }

    pub fn heavy_isotopes(&self) -> &[String] {
        &self.heavy_isotopes
    }

    pub fn size(&self) -> usize {
        self.mz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mz.is_empty()
    }

    pub fn spectrum_type(&self) -> SpectrumType {
        self.spectrum_type
    }

    pub fn total_intensity(&self) -> f64 {
        self.intensity.iter().map(|&i| i as f64).sum()
    }

    pub fn peaks(&self) -> impl Iterator<Item = TracedPeak<'_>> + '_ {
        izip!(&self.mz, &self.intensity, &self.isotope_composition, &self.heavy_isotopes)
            .map(|(&mz, &intensity, composition, heavy)| (mz, intensity, composition.as_str(), heavy.as_str()))
    }

    /// a copy with every m/z value passed through `f`
    pub fn map_mz<F: Fn(f64) -> f64>(&self, f: F) -> Self {
        TracedPattern { mz: self.mz.iter().map(|&mz| f(mz)).collect(), ..self.clone() }
    }

    /// a copy with every isotope composition passed through `f`, the first error aborts
    pub fn try_map_compositions<F>(&self, f: F) -> Result<Self, TracerError>
    where
        F: Fn(&str) -> Result<String, TracerError>,
    {
        Ok(TracedPattern {
            isotope_composition: self.isotope_composition.iter().map(|c| f(c)).collect::<Result<_, _>>()?,
            ..self.clone()
        })
    }

    /// a copy carrying the given heavy isotope annotations, one per peak
    pub fn with_heavy_isotopes(&self, heavy_isotopes: Vec<String>) -> Result<Self, TracerError> {
        TracedPattern::new(
            self.mz.clone(),
            self.intensity.clone(),
            self.isotope_composition.clone(),
            heavy_isotopes,
            self.spectrum_type,
        )
    }

    /// Union of the peaks of `self` and `other`.
    ///
    /// Peaks merge only if their m/z values are bit identical; the merged peak sums the
    /// intensities and keeps the annotations of the first peak that carries intensity, so `self`
    /// wins over `other` unless its peak is silent. The result is sorted by ascending m/z.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use mstracer::TracedPattern;
    /// let a = TracedPattern::from_compositions(vec![12.0, 13.0], vec![1.0, 0.5], vec!["a".into(), "b".into()]).unwrap();
    /// let b = TracedPattern::from_compositions(vec![11.0, 13.0], vec![0.2, 0.5], vec!["c".into(), "d".into()]).unwrap();
    /// let merged = a.merge(&b);
    /// assert_eq!(merged.mz(), &[11.0, 12.0, 13.0]);
    /// assert_eq!(merged.intensity(), &[0.2, 1.0, 1.0]);
    /// assert_eq!(merged.isotope_composition()[2], "b");
    /// ```
    pub fn merge(&self, other: &TracedPattern) -> TracedPattern {
        let mut peaks = collect_by_mz(self.peaks().chain(other.peaks()), |mz| mz, true);
        peaks.sort_by(|a, b| a.0.total_cmp(&b.0));
        trace!("merged {} and {} peaks into {}", self.size(), other.size(), peaks.len());
        TracedPattern::from_rows(peaks, self.spectrum_type)
    }

    /// Scale intensities so that the largest one equals `scale`.
    ///
    /// A pattern without positive intensity is returned unchanged.
    pub fn normalize(&self, scale: f32) -> TracedPattern {
        let max = self.intensity.iter().copied().fold(0.0f32, f32::max);
        if max <= 0.0 {
            return self.clone();
        }
        TracedPattern {
            intensity: self
                .intensity
                .iter()
                .map(|&i| (i as f64 / max as f64 * scale as f64) as f32)
                .collect(),
            ..self.clone()
        }
    }

    /// Round m/z values to `precision` decimal places, merging peaks that become equal.
    ///
    /// Merged peaks sum their intensities and keep the annotations of the first peak. Peaks stay
    /// in the order of their first occurrence, nothing is re-sorted.
    pub fn round_mz(&self, precision: i32) -> TracedPattern {
        let factor = 10f64.powi(precision);
        let peaks = collect_by_mz(self.peaks(), |mz| (mz * factor).round() / factor, false);
        TracedPattern::from_rows(peaks, self.spectrum_type)
    }

    /// Round intensities to `precision` decimal places.
    pub fn round_intensities(&self, precision: i32) -> TracedPattern {
        let factor = 10f64.powi(precision);
        TracedPattern {
            intensity: self
                .intensity
                .iter()
                .map(|&i| ((i as f64 * factor).round() / factor) as f32)
                .collect(),
            ..self.clone()
        }
    }

    /// Divide every intensity by the total intensity, giving the mass isotopomer distribution.
    ///
    /// A pattern with zero (or non finite) total intensity is returned unchanged.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use mstracer::TracedPattern;
    /// let pattern = TracedPattern::from_compositions(vec![12.0, 13.0], vec![3.0, 1.0], vec![String::new(), String::new()]).unwrap();
    /// assert_eq!(pattern.to_mid().intensity(), &[0.75, 0.25]);
    /// ```
    pub fn to_mid(&self) -> TracedPattern {
        let total = self.total_intensity();
        if total == 0.0 || !total.is_finite() {
            return self.clone();
        }
        TracedPattern {
            intensity: self.intensity.iter().map(|&i| (i as f64 / total) as f32).collect(),
            ..self.clone()
        }
    }

    /// Tabular rendering of the pattern for logs and debugging.
    pub fn debug_string(&self) -> String {
        let mut builder = String::from("\n");
        builder.push_str(&format!(
            "{:<9}|{:<9}|{:<20}|{:<50}|\n",
            "Mass", "Intensity", "Heavy isotopes", "Isotope formula"
        ));
        for (mz, intensity, composition, heavy) in self.peaks() {
            builder.push_str(&format!("{mz:<5.6}|{intensity:<1.7}|{heavy:<20}|{composition:<50}|\n"));
        }
        builder
    }

    fn from_rows(rows: Vec<(f64, f32, String, String)>, spectrum_type: SpectrumType) -> TracedPattern {
        let mut pattern = TracedPattern { spectrum_type, ..TracedPattern::empty() };
        for (mz, intensity, composition, heavy) in rows {
            pattern.mz.push(mz);
            pattern.intensity.push(intensity);
            pattern.isotope_composition.push(composition);
            pattern.heavy_isotopes.push(heavy);
        }
        pattern
    }
}

impl Display for TracedPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.debug_string())
    }
}

// group peaks by the bits of `key(mz)` in order of first occurrence; the first annotations win,
// with `prefer_intense` a silent peak hands them over to the first one carrying intensity
fn collect_by_mz<'a, I, K>(peaks: I, key: K, prefer_intense: bool) -> Vec<(f64, f32, String, String)>
where
    I: Iterator<Item = TracedPeak<'a>>,
    K: Fn(f64) -> f64,
{
    let mut grouped: IndexMap<u64, (f64, f32, String, String)> = IndexMap::new();
    for (mz, intensity, composition, heavy) in peaks {
        let mz = key(mz);
        match grouped.entry(mz.to_bits()) {
            Entry::Occupied(mut entry) => {
                let peak = entry.get_mut();
                if prefer_intense && peak.1 <= 0.0 && intensity > 0.0 {
                    peak.2 = composition.to_string();
                    peak.3 = heavy.to_string();
                }
                peak.1 += intensity;
            }
            Entry::Vacant(entry) => {
                entry.insert((mz, intensity, composition.to_string(), heavy.to_string()));
            }
        }
    }
    grouped.into_values().collect()
}
