use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::TracerError;

/// Upper bound used when searching the lightest natural isotope of an element.
pub const MAX_MASS_NUMBER: u16 = 1000;

/// A single nuclide of an element together with its exact mass and natural abundance.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IsotopeRecord {
    pub mass_number: u16,
    pub exact_mass: f64,
    pub abundance: f64,
}

impl IsotopeRecord {
    pub fn new(mass_number: u16, exact_mass: f64, abundance: f64) -> Self {
        IsotopeRecord { mass_number, exact_mass, abundance }
    }
}

/// Read-only access to isotope reference data.
///
/// Implementations must be safe to share between threads, the simulator may query them from
/// several rayon workers at once.
pub trait IsotopeReference: Send + Sync {
    /// exact atomic mass of the nuclide `mass_number` + `element`
    ///
    /// Arguments:
    ///
    /// * `element` - element symbol, e.g. `C`
    /// * `mass_number` - mass number of the nuclide, e.g. `13`
    ///
    /// Returns:
    ///
    /// * `Result<f64, TracerError>` - the exact mass, or `UnknownIsotope`
    ///
    /// # Examples
    ///
    /// ```
    /// use mstracer::chemistry::elements::{IsotopeReference, IsotopeTable};
    ///
    /// let table = IsotopeTable::shared();
    /// assert_eq!(table.exact_mass("C", 13).unwrap(), 13.00335483507);
    /// assert!(table.exact_mass("C", 19).is_err());
    /// ```
    fn exact_mass(&self, element: &str, mass_number: u16) -> Result<f64, TracerError>;

    /// all isotopes of `element` with a natural abundance above zero, ascending by mass number
    fn natural_isotopes(&self, element: &str) -> Result<Vec<IsotopeRecord>, TracerError>;

    /// the smallest mass number among the naturally occurring isotopes of `element`
    ///
    /// Elements without natural isotopes report [`MAX_MASS_NUMBER`], so none of their
    /// isotopes is considered heavy.
    fn lightest_natural_mass_number(&self, element: &str) -> Result<u16, TracerError> {
        Ok(self
            .natural_isotopes(element)?
            .iter()
            .filter(|isotope| isotope.abundance > 0.0)
            .map(|isotope| isotope.mass_number)
            .fold(MAX_MASS_NUMBER, u16::min))
    }

    /// the naturally most abundant isotope of `element`, if it has any
    fn most_abundant_isotope(&self, element: &str) -> Result<Option<IsotopeRecord>, TracerError> {
        Ok(self
            .natural_isotopes(element)?
            .into_iter()
            .max_by(|a, b| a.abundance.total_cmp(&b.abundance)))
    }
}

/// Static isotope table holding exact masses (NIST) and natural abundances (IUPAC).
#[derive(Clone, Debug)]
pub struct IsotopeTable {
    isotopes: HashMap<&'static str, Vec<IsotopeRecord>>,
}

static SHARED_TABLE: OnceLock<IsotopeTable> = OnceLock::new();

impl IsotopeTable {
    pub fn new() -> Self {
        let mut isotopes = isotope_records();
        for records in isotopes.values_mut() {
            records.sort_by_key(|isotope| isotope.mass_number);
        }
        IsotopeTable { isotopes }
    }

    /// The process wide table, built on first access.
    pub fn shared() -> &'static IsotopeTable {
        SHARED_TABLE.get_or_init(IsotopeTable::new)
    }

    /// every isotope known for `element`, including those without natural abundance
    pub fn isotopes(&self, element: &str) -> Option<&[IsotopeRecord]> {
        self.isotopes.get(element).map(Vec::as_slice)
    }

    pub fn contains_element(&self, element: &str) -> bool {
        self.isotopes.contains_key(element)
    }
}

impl Default for IsotopeTable {
    fn default() -> Self {
        IsotopeTable::new()
    }
}

impl IsotopeReference for IsotopeTable {
    fn exact_mass(&self, element: &str, mass_number: u16) -> Result<f64, TracerError> {
        self.isotopes(element)
            .and_then(|records| records.iter().find(|isotope| isotope.mass_number == mass_number))
            .map(|isotope| isotope.exact_mass)
            .ok_or_else(|| TracerError::UnknownIsotope {
                element: element.to_string(),
                mass_number,
            })
    }

    fn natural_isotopes(&self, element: &str) -> Result<Vec<IsotopeRecord>, TracerError> {
        let records = self.isotopes(element).ok_or_else(|| TracerError::UnknownIsotope {
            element: element.to_string(),
            mass_number: 0,
        })?;
        Ok(records.iter().copied().filter(|isotope| isotope.abundance > 0.0).collect())
    }
}

impl<T: IsotopeReference + ?Sized> IsotopeReference for &T {
    fn exact_mass(&self, element: &str, mass_number: u16) -> Result<f64, TracerError> {
        (**self).exact_mass(element, mass_number)
    }

    fn natural_isotopes(&self, element: &str) -> Result<Vec<IsotopeRecord>, TracerError> {
        (**self).natural_isotopes(element)
    }
}

// (mass number, exact mass, natural abundance); zero abundance marks tracer-only nuclides
fn isotope_records() -> HashMap<&'static str, Vec<IsotopeRecord>> {
    let entries: [(&'static str, &[(u16, f64, f64)]); 31] = [
        ("H", &[(1, 1.00782503223, 0.999885), (2, 2.01410177812, 0.000115), (3, 3.01604928, 0.0)]),
        ("He", &[(3, 3.0160293201, 0.00000134), (4, 4.00260325413, 0.99999866)]),
        ("Li", &[(6, 6.0151228874, 0.0759), (7, 7.0160034366, 0.9241)]),
        ("Be", &[(9, 9.012183065, 1.0)]),
        ("B", &[(10, 10.01293695, 0.199), (11, 11.00930536, 0.801)]),
        ("C", &[(12, 12.0, 0.9893), (13, 13.00335483507, 0.0107), (14, 14.0032419884, 0.0)]),
        ("N", &[(14, 14.00307400443, 0.99636), (15, 15.00010889888, 0.00364)]),
        ("O", &[(16, 15.99491461957, 0.99757), (17, 16.99913175650, 0.00038), (18, 17.99915961286, 0.00205)]),
        ("F", &[(19, 18.99840316273, 1.0)]),
        ("Ne", &[(20, 19.9924401762, 0.9048), (21, 20.993846685, 0.0027), (22, 21.991385114, 0.0925)]),
        ("Na", &[(23, 22.9897692820, 1.0)]),
        ("Mg", &[(24, 23.985041697, 0.7899), (25, 24.985836976, 0.1000), (26, 25.982592968, 0.1101)]),
        ("Al", &[(27, 26.98153853, 1.0)]),
        ("Si", &[(28, 27.97692653465, 0.92223), (29, 28.97649466490, 0.04685), (30, 29.973770136, 0.03092)]),
        ("P", &[(31, 30.97376199842, 1.0), (32, 31.973907643, 0.0)]),
        (
            "S",
            &[
                (32, 31.9720711744, 0.9499),
                (33, 32.9714589098, 0.0075),
                (34, 33.967867004, 0.0425),
                (35, 34.969032310, 0.0),
                (36, 35.96708071, 0.0001),
            ],
        ),
        ("Cl", &[(35, 34.968852682, 0.7576), (37, 36.965902602, 0.2424)]),
        ("K", &[(39, 38.9637064864, 0.932581), (40, 39.963998166, 0.000117), (41, 40.9618252579, 0.067302)]),
        (
            "Ca",
            &[
                (40, 39.962590863, 0.96941),
                (42, 41.95861783, 0.00647),
                (43, 42.95876644, 0.00135),
                (44, 43.95548156, 0.02086),
                (46, 45.9536890, 0.00004),
                (48, 47.95252276, 0.00187),
            ],
        ),
        ("Mn", &[(55, 54.93804391, 1.0)]),
        (
            "Fe",
            &[
                (54, 53.93960899, 0.05845),
                (56, 55.93493633, 0.91754),
                (57, 56.93539284, 0.02119),
                (58, 57.93327443, 0.00282),
            ],
        ),
        ("Co", &[(59, 58.93319429, 1.0)]),
        (
            "Ni",
            &[
                (58, 57.93534241, 0.68077),
                (60, 59.93078588, 0.26223),
                (61, 60.93105557, 0.011399),
                (62, 61.92834537, 0.036346),
                (64, 63.92796682, 0.009255),
            ],
        ),
        ("Cu", &[(63, 62.92959772, 0.6915), (65, 64.92778970, 0.3085)]),
        (
            "Zn",
            &[
                (64, 63.92914201, 0.4917),
                (66, 65.92603381, 0.2773),
                (67, 66.92712775, 0.0404),
                (68, 67.92484455, 0.1845),
                (70, 69.9253192, 0.0061),
            ],
        ),
        (
            "Se",
            &[
                (74, 73.922475934, 0.0089),
                (76, 75.919213704, 0.0937),
                (77, 76.919914154, 0.0763),
                (78, 77.91730928, 0.2377),
                (80, 79.9165218, 0.4961),
                (82, 81.9166995, 0.0873),
            ],
        ),
        ("Br", &[(79, 78.9183376, 0.5069), (81, 80.9162897, 0.4931)]),
        ("I", &[(127, 126.9044719, 1.0)]),
        ("Mo", &[
            (92, 91.90680716, 0.1453),
            (94, 93.90508359, 0.0915),
            (95, 94.90583744, 0.1584),
            (96, 95.90467477, 0.1667),
            (97, 96.90601812, 0.0960),
            (98, 97.90540482, 0.2439),
            (100, 99.9074718, 0.0982),
        ]),
        ("As", &[(75, 74.92159457, 1.0)]),
        ("Tc", &[(98, 97.9072124, 0.0)]),
    ];

    let mut map = HashMap::new();
    for (symbol, records) in entries {
        map.insert(
            symbol,
            records
                .iter()
                .map(|&(mass_number, mass, abundance)| IsotopeRecord::new(mass_number, mass, abundance))
                .collect(),
        );
    }
    map
}
