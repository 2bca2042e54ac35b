// filter_pipeline.rs
use crate::project_loader::{Dataset, ProjectRecord};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

pub const ALL_REGISTRIES: &str = "All";

pub const RANGE_INPUT_HELP: &str = "Couldn't read that range. Use two plain non-negative numbers \
     like '100 5000' (no signs, no exponents such as 1e6).";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrySelection {
    All,
    Only(String),
}

impl RegistrySelection {
    pub fn from_choice(choice: &str) -> Self {
        if choice.eq_ignore_ascii_case(ALL_REGISTRIES) {
            RegistrySelection::All
        } else {
            RegistrySelection::Only(choice.to_string())
        }
    }
}

impl fmt::Display for RegistrySelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrySelection::All => write!(f, "{}", ALL_REGISTRIES),
            RegistrySelection::Only(registry) => write!(f, "{}", registry),
        }
    }
}

/// Inclusive range over `Total Credits Issued`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreditRange {
    pub min: f64,
    pub max: f64,
}

impl CreditRange {
    pub fn new(a: f64, b: f64) -> Self {
        CreditRange {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Missing values never fall inside a range.
    pub fn contains(&self, value: Option<f64>) -> bool {
        match value {
            Some(v) => v >= self.min && v <= self.max,
            None => false,
        }
    }

    /// Accepts `MIN MAX`, `MIN-MAX`, `MIN..MAX`, `MIN, MAX` or `MIN to MAX`
    /// with plain non-negative decimals only (see `RANGE_INPUT_HELP`).
    /// Reversed ends are swapped and both ends are clamped to `bounds`.
    pub fn parse(input: &str, bounds: CreditRange) -> Option<CreditRange> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?)\s*(?:\.\.=?|-|,|to|\s)\s*(\d+(?:\.\d+)?)\s*$")
                .expect("credit range pattern compiles")
        });

        let caps = pattern.captures(input)?;
        let a: f64 = caps.get(1)?.as_str().parse().ok()?;
        let b: f64 = caps.get(2)?.as_str().parse().ok()?;
        let range = CreditRange::new(a, b);

        Some(CreditRange {
            min: range.min.clamp(bounds.min, bounds.max),
            max: range.max.clamp(bounds.min, bounds.max),
        })
    }
}

impl fmt::Display for CreditRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.min, self.max)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    pub registry: RegistrySelection,
    pub credit_range: CreditRange,
    pub country: Option<String>,
}

impl FilterState {
    /// Everything selected: all registries, the observed credit span, no country.
    pub fn unfiltered(dataset: &Dataset) -> Self {
        let (lo, hi) = dataset.credit_bounds().unwrap_or((0.0, 0.0));
        FilterState {
            registry: RegistrySelection::All,
            credit_range: CreditRange::new(lo, hi),
            country: None,
        }
    }

    /// Registry and credit range only; the map counts are taken before the country narrows things.
    pub fn population_predicates(&self) -> Vec<FilterPredicate> {
        let mut predicates = Vec::new();
        if let RegistrySelection::Only(registry) = &self.registry {
            predicates.push(FilterPredicate::Registry(registry.clone()));
        }
        predicates.push(FilterPredicate::CreditRange(self.credit_range));
        predicates
    }

    pub fn predicates(&self) -> Vec<FilterPredicate> {
        let mut predicates = self.population_predicates();
        if let Some(country) = &self.country {
            predicates.push(FilterPredicate::Country(country.clone()));
        }
        predicates
    }
}

/// One independent narrowing step. Each looks at a different field.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterPredicate {
    Registry(String),
    CreditRange(CreditRange),
    Country(String),
    AnomalyOnly,
}

impl FilterPredicate {
    pub fn matches(&self, record: &ProjectRecord) -> bool {
        match self {
            FilterPredicate::Registry(registry) => record.voluntary_registry == *registry,
            FilterPredicate::CreditRange(range) => range.contains(record.total_credits_issued),
            FilterPredicate::Country(country) => record.country == *country,
            FilterPredicate::AnomalyOnly => record.is_anomaly(),
        }
    }
}

/// Sequential narrowing: each predicate filters what the previous one left.
pub fn apply_predicates<'a, I>(records: I, predicates: &[FilterPredicate]) -> Vec<&'a ProjectRecord>
where
    I: IntoIterator<Item = &'a ProjectRecord>,
{
    let mut subset: Vec<&'a ProjectRecord> = records.into_iter().collect();
    for predicate in predicates {
        subset.retain(|record| predicate.matches(record));
    }
    subset
}

pub fn filter<'a>(
    records: &'a [ProjectRecord],
    registry_selection: &RegistrySelection,
    credit_range: CreditRange,
    country_selection: Option<&str>,
    anomaly_only: bool,
) -> Vec<&'a ProjectRecord> {
    let state = FilterState {
        registry: registry_selection.clone(),
        credit_range,
        country: country_selection.map(String::from),
    };
    let mut predicates = state.predicates();
    if anomaly_only {
        predicates.push(FilterPredicate::AnomalyOnly);
    }
    apply_predicates(records, &predicates)
}

pub fn anomalies<'a>(records: &[&'a ProjectRecord]) -> Vec<&'a ProjectRecord> {
    apply_predicates(records.iter().copied(), &[FilterPredicate::AnomalyOnly])
}
