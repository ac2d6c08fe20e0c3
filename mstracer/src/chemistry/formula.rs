use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::TracerError;

static FORMULA_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\[\(]?((?:[A-Z][a-z]?[0-9]*)+)[\]\)]?(([0-9]*)([-+]))?$").expect("valid formula pattern")
});
static UNCHARGED_FORMULA_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^((?:[A-Z][a-z]?[0-9]*)+)$").expect("valid uncharged formula pattern"));
static TRACER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)([A-Z][a-z]?)$").expect("valid tracer pattern"));
static MULTI_ELEMENT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z][a-z]?)([0-9]*)").expect("valid element pattern"));
static COMPOSITION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([0-9]+)\]([A-Z][a-z]?)([0-9]*)").expect("valid composition pattern"));

/// Element symbol to atom count, iterated in order of first appearance.
pub type ElementCounts = IndexMap<String, i32>;

/// Nuclide to atom count, iterated in order of insertion.
pub type IsotopeCounts = IndexMap<Nuclide, i32>;

/// The grammars accepted for formula like arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormulaGrammar {
    /// optionally bracketed and optionally charged sum formula, e.g. `[C5H9NO4]2+`
    Chemical,
    /// plain sum formula, e.g. `C4N`
    Uncharged,
    /// mass number followed by an element symbol, e.g. `13C`
    Tracer,
}

impl FormulaGrammar {
    fn pattern(&self) -> &'static Regex {
        match self {
            FormulaGrammar::Chemical => &*FORMULA_PATTERN,
            FormulaGrammar::Uncharged => &*UNCHARGED_FORMULA_PATTERN,
            FormulaGrammar::Tracer => &*TRACER_PATTERN,
        }
    }
}

/// check that `formula` matches `grammar` end to end, `None` means "no formula" and passes
///
/// Arguments:
///
/// * `formula` - the formula to check, if any
/// * `grammar` - the grammar the formula has to follow
///
/// Returns:
///
/// * `Result<(), TracerError>` - `InvalidFormula` if the formula does not match
///
/// # Examples
///
/// ```
/// use mstracer::chemistry::formula::{validate, FormulaGrammar};
///
/// assert!(validate(Some("[C5H9NO4]+"), FormulaGrammar::Chemical).is_ok());
/// assert!(validate(Some("C5H9NO4+"), FormulaGrammar::Uncharged).is_err());
/// assert!(validate(None, FormulaGrammar::Tracer).is_ok());
/// ```
pub fn validate(formula: Option<&str>, grammar: FormulaGrammar) -> Result<(), TracerError> {
    match formula {
        Some(formula) if !grammar.pattern().is_match(formula) => {
            Err(TracerError::InvalidFormula(formula.to_string()))
        }
        _ => Ok(()),
    }
}

/// A nuclide such as `13C`, used for tracers and as key of isotope counts.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Nuclide {
    pub mass_number: u16,
    pub element: String,
}

impl Nuclide {
    pub fn new(mass_number: u16, element: impl Into<String>) -> Self {
        Nuclide { mass_number, element: element.into() }
    }

    /// the bracketed form used in composition strings, e.g. `[13]C`
    pub fn composition_token(&self) -> String {
        format!("[{}]{}", self.mass_number, self.element)
    }
}

impl FromStr for Nuclide {
    type Err = TracerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TracerError::InvalidFormula(s.to_string());
        let captures = TRACER_PATTERN.captures(s).ok_or_else(invalid)?;
        let mass_number = captures[1].parse::<u16>().map_err(|_| invalid())?;
        Ok(Nuclide::new(mass_number, &captures[2]))
    }
}

impl Display for Nuclide {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.mass_number, self.element)
    }
}

/// A chemical formula split into its uncharged body and its charge suffix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChemicalFormula {
    pub body: String,
    pub charge_count: String,
    pub charge_sign: String,
}

impl ChemicalFormula {
    /// the charge suffix exactly as written, e.g. `2+`, or the empty string
    pub fn charge_suffix(&self) -> String {
        format!("{}{}", self.charge_count, self.charge_sign)
    }

    /// signed charge, a sign without a count means a single charge
    ///
    /// Fails with `InvalidFormula` if the count does not fit an `i32`.
    pub fn charge(&self) -> Result<i32, TracerError> {
        let count = if self.charge_count.is_empty() {
            1
        } else {
            parse_count(&self.charge_count, &self.charge_suffix())?
        };
        Ok(match self.charge_sign.as_str() {
            "+" => count,
            "-" => -count,
            _ => 0,
        })
    }

    /// the body in brackets followed by the charge suffix, e.g. `[C3H7]+`
    pub fn bracketed(&self) -> String {
        format!("[{}]{}", self.body, self.charge_suffix())
    }
}

impl FromStr for ChemicalFormula {
    type Err = TracerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = FORMULA_PATTERN
            .captures(s)
            .ok_or_else(|| TracerError::InvalidFormula(s.to_string()))?;
        let group = |i: usize| captures.get(i).map_or("", |m| m.as_str()).to_string();
        Ok(ChemicalFormula {
            body: group(1),
            charge_count: group(3),
            charge_sign: group(4),
        })
    }
}

/// parse a plain formula into element counts in order of first appearance
///
/// A repeated element overwrites the count of its first appearance but keeps its position. A
/// count that does not fit an `i32` fails with `InvalidFormula`.
///
/// # Examples
///
/// ```
/// use mstracer::chemistry::formula::formula_map;
///
/// let counts = formula_map("C7H14NOSi").unwrap();
/// let elements: Vec<_> = counts.iter().map(|(e, c)| (e.as_str(), *c)).collect();
/// assert_eq!(elements, vec![("C", 7), ("H", 14), ("N", 1), ("O", 1), ("Si", 1)]);
/// assert!(formula_map("C99999999999").is_err());
/// ```
pub fn formula_map(formula: &str) -> Result<ElementCounts, TracerError> {
    MULTI_ELEMENT_PATTERN
        .captures_iter(formula)
        .map(|captures| {
            let quantity = parse_quantity(&captures[2], formula)?;
            Ok::<_, TracerError>((captures[1].to_string(), quantity))
        })
        .collect()
}

/// parse a composition string such as `[12]C7[1]H14[14]N` into isotope counts
pub fn isotope_map(composition: &str) -> Result<IsotopeCounts, TracerError> {
    COMPOSITION_PATTERN
        .captures_iter(composition)
        .map(|captures| {
            let mass_number = captures[1]
                .parse::<u16>()
                .map_err(|_| TracerError::InvalidFormula(composition.to_string()))?;
            let quantity = parse_quantity(&captures[3], composition)?;
            Ok::<_, TracerError>((Nuclide::new(mass_number, &captures[2]), quantity))
        })
        .collect()
}

// an omitted count means one atom
fn parse_quantity(digits: &str, formula: &str) -> Result<i32, TracerError> {
    if digits.is_empty() {
        Ok(1)
    } else {
        parse_count(digits, formula)
    }
}

fn parse_count(digits: &str, formula: &str) -> Result<i32, TracerError> {
    digits
        .parse::<i32>()
        .map_err(|e| TracerError::InvalidFormula(format!("count {digits} in {formula}: {e}")))
}

/// render element counts as a sum formula, skipping zero counts and omitting a count of one
pub fn to_formula_string(formula: &ElementCounts) -> String {
    formula
        .iter()
        .filter(|(_, count)| **count != 0)
        .map(|(element, &count)| render_count(element, count))
        .collect()
}

/// render isotope counts as a composition string, e.g. `[12]C3[13]C4[1]H14`
pub fn to_composition_string(composition: &IsotopeCounts) -> String {
    composition
        .iter()
        .filter(|(_, count)| **count != 0)
        .map(|(nuclide, &count)| render_count(&nuclide.composition_token(), count))
        .collect()
}

// only a count of one is implicit, any other count is written out
fn render_count(token: &str, count: i32) -> String {
    if count == 1 {
        token.to_string()
    } else {
        format!("{token}{count}")
    }
}

/// subtract the capacity of each supplied tracer's element from the formula
///
/// Two tracers of the same element each claim the full capacity of that element, so the
/// formula has to hold both claims.
///
/// Arguments:
///
/// * `formula` - uncharged formula, e.g. `C7H14NOSi`
/// * `capacity` - capacity formula, e.g. `C4N`
/// * `tracer1` - first tracer, if any
/// * `tracer2` - second tracer, if any
///
/// Returns:
///
/// * `Result<String, TracerError>` - the reduced formula, the empty string if no atom is left;
///   `InvalidFormula` if an element count would drop below zero
///
/// # Examples
///
/// ```
/// use mstracer::chemistry::formula::{reduce_formula, Nuclide};
///
/// let c13: Nuclide = "13C".parse().unwrap();
/// let c14: Nuclide = "14C".parse().unwrap();
/// let n15: Nuclide = "15N".parse().unwrap();
/// assert_eq!(reduce_formula("C7H14NOSi", "C4N", Some(&c13), Some(&n15)).unwrap(), "C3H14OSi");
/// assert_eq!(reduce_formula("C7H14NOSi", "C4N", None, Some(&n15)).unwrap(), "C7H14OSi");
/// assert!(reduce_formula("C7H14NOSi", "C4N", Some(&c13), Some(&c14)).is_err());
/// ```
pub fn reduce_formula(
    formula: &str,
    capacity: &str,
    tracer1: Option<&Nuclide>,
    tracer2: Option<&Nuclide>,
) -> Result<String, TracerError> {
    let mut element_formula = formula_map(formula)?;
    let capacity_formula = formula_map(capacity)?;
    for tracer in [tracer1, tracer2].into_iter().flatten() {
        if let Some(count) = element_formula.get_mut(&tracer.element) {
            *count -= capacity_formula.get(&tracer.element).copied().unwrap_or(0);
        }
    }
    if let Some((element, count)) = element_formula.iter().find(|(_, count)| **count < 0) {
        return Err(TracerError::InvalidFormula(format!(
            "{formula} lacks {} {element} for the tracers of capacity {capacity}",
            -count
        )));
    }
    Ok(to_formula_string(&element_formula))
}

/// make sure no capacity exceeds the number of atoms available in the formula
pub fn check_capacity(formula: &str, capacity: &str) -> Result<(), TracerError> {
    let element_formula = formula_map(formula)?;
    for (element, &count) in formula_map(capacity)?.iter() {
        let available = element_formula.get(element).copied().unwrap_or(0);
        if count > available {
            return Err(TracerError::InvalidFormula(format!(
                "capacity {capacity} requests {count} {element} but {formula} only holds {available}"
            )));
        }
    }
    Ok(())
}
