// country_normalizer.rs
use crate::error::{GreenbroError, Result};
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

const BUNDLED_ISO_3166: &str = include_str!("../data/iso_3166.csv");
const BUNDLED_WORLD_COUNTRIES: &str = include_str!("../data/world_countries.txt");

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CountryEntry {
    pub alpha_2: String,
    pub alpha_3: String,
    pub numeric: String,
    pub name: String,
    pub official_name: Option<String>,
    pub common_name: Option<String>,
}

/// A read-only reference of countries. A lookup either finds an entry or it doesn't.
pub trait CountryRegistry {
    fn lookup(&self, query: &str) -> Option<&CountryEntry>;
    fn contains_alpha_3(&self, code: &str) -> bool;
}

/// Supplies every country name the map should show, anomalies or not.
pub trait WorldCountrySource {
    fn country_names(&self) -> Vec<String>;
}

/// ISO 3166-1 registry. Lookups are case-insensitive exact matches, codes first,
/// then names, official names and common names.
pub struct Iso3166Registry {
    entries: Vec<CountryEntry>,
    by_key: HashMap<String, usize>,
}

impl Iso3166Registry {
    pub fn bundled() -> Result<Self> {
        Self::from_reader(BUNDLED_ISO_3166.as_bytes())
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| GreenbroError::io(path, e))?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);

        let mut entries = Vec::new();
        for result in rdr.deserialize::<CountryEntry>() {
            let entry = result.map_err(|e| GreenbroError::CountryRegistry(e.to_string()))?;
            if !is_alpha_3(&entry.alpha_3) {
                warn!(code = %entry.alpha_3, name = %entry.name, "skipping registry entry with malformed alpha-3");
                continue;
            }
            entries.push(entry);
        }

        if entries.is_empty() {
            return Err(GreenbroError::CountryRegistry(
                "no usable entries".to_string(),
            ));
        }

        Ok(Self::from_entries(entries))
    }

    pub fn from_entries(entries: Vec<CountryEntry>) -> Self {
        let mut by_key = HashMap::new();

        for (i, entry) in entries.iter().enumerate() {
            for code in [&entry.alpha_2, &entry.alpha_3, &entry.numeric] {
                if !code.is_empty() {
                    by_key.entry(code.to_lowercase()).or_insert(i);
                }
            }
        }
        for (i, entry) in entries.iter().enumerate() {
            let names = std::iter::once(&entry.name)
                .chain(entry.official_name.iter())
                .chain(entry.common_name.iter());
            for name in names {
                if !name.is_empty() {
                    by_key.entry(name.to_lowercase()).or_insert(i);
                }
            }
        }

        Iso3166Registry { entries, by_key }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CountryRegistry for Iso3166Registry {
    fn lookup(&self, query: &str) -> Option<&CountryEntry> {
        let key = query.trim().to_lowercase();
        if key.is_empty() {
            return None;
        }
        self.by_key.get(&key).map(|&i| &self.entries[i])
    }

    fn contains_alpha_3(&self, code: &str) -> bool {
        self.entries.iter().any(|e| e.alpha_3 == code)
    }
}

pub struct StaticWorldCountries {
    names: Vec<String>,
}

impl StaticWorldCountries {
    pub fn bundled() -> Self {
        Self::from_lines(BUNDLED_WORLD_COUNTRIES)
    }

    /// One country per line; blank lines and `#` comments are skipped.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| GreenbroError::io(path, e))?;
        Ok(Self::from_lines(&text))
    }

    pub fn from_lines(text: &str) -> Self {
        let names = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(String::from)
            .collect();
        StaticWorldCountries { names }
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StaticWorldCountries {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl WorldCountrySource for StaticWorldCountries {
    fn country_names(&self) -> Vec<String> {
        self.names.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedCountry {
    pub name: String,
    pub iso_alpha_3: Option<String>,
}

/// Maps free-text country names onto the registry, remembering every answer.
/// A miss keeps the original text and carries no code.
pub struct CountryNormalizer {
    registry: Box<dyn CountryRegistry>,
    cache: RefCell<HashMap<String, NormalizedCountry>>,
}

impl CountryNormalizer {
    pub fn new(registry: Box<dyn CountryRegistry>) -> Self {
        CountryNormalizer {
            registry,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn normalize(&self, raw: &str) -> NormalizedCountry {
        if let Some(hit) = self.cache.borrow().get(raw) {
            return hit.clone();
        }

        let resolved = match self.registry.lookup(raw) {
            Some(entry) => NormalizedCountry {
                name: entry.name.clone(),
                iso_alpha_3: Some(entry.alpha_3.clone()),
            },
            None => {
                debug!(country = raw, "country not found in registry");
                NormalizedCountry {
                    name: raw.to_string(),
                    iso_alpha_3: None,
                }
            }
        };

        self.cache
            .borrow_mut()
            .insert(raw.to_string(), resolved.clone());
        resolved
    }

    /// Normalises the whole world list, dropping duplicate canonical names.
    pub fn normalize_world(&self, source: &dyn WorldCountrySource) -> Vec<NormalizedCountry> {
        let mut seen = std::collections::HashSet::new();
        let mut world = Vec::new();
        let mut unresolved = 0usize;

        for raw in source.country_names() {
            let country = self.normalize(&raw);
            if country.iso_alpha_3.is_none() {
                unresolved += 1;
            }
            if seen.insert(country.name.clone()) {
                world.push(country);
            }
        }

        if unresolved > 0 {
            warn!(unresolved, "world countries without an ISO-3 code will stay off the map");
        }
        world
    }

    pub fn cached_names(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn registry(&self) -> &dyn CountryRegistry {
        self.registry.as_ref()
    }
}

fn is_alpha_3(code: &str) -> bool {
    code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> CountryNormalizer {
        CountryNormalizer::new(Box::new(Iso3166Registry::bundled().unwrap()))
    }

    #[test]
    fn resolves_codes_and_names_case_insensitively() {
        let n = normalizer();
        for raw in ["USA", "us", "840", "United States of America", "united states"] {
            let c = n.normalize(raw);
            assert_eq!(c.name, "United States", "input {raw}");
            assert_eq!(c.iso_alpha_3.as_deref(), Some("USA"), "input {raw}");
        }
        assert_eq!(n.normalize("Vietnam").iso_alpha_3.as_deref(), Some("VNM"));
        assert_eq!(n.normalize("Brazil").name, "Brazil");
    }

    #[test]
    fn misses_keep_the_original_text() {
        let n = normalizer();
        let c = n.normalize("Congo, Dem. Rep.");
        assert_eq!(c.name, "Congo, Dem. Rep.");
        assert_eq!(c.iso_alpha_3, None);
        assert_eq!(n.normalize("").iso_alpha_3, None);
    }

    #[test]
    fn codes_are_well_formed_and_registered() {
        let n = normalizer();
        let inputs = StaticWorldCountries::bundled()
            .country_names()
            .into_iter()
            .chain(["", "  ", "xx", "Atlantis", "usa ", "ZZZ", "Türkiye", "123"].map(String::from));
        for raw in inputs {
            if let Some(code) = n.normalize(&raw).iso_alpha_3 {
                assert!(is_alpha_3(&code), "{raw} -> {code}");
                assert!(n.registry().contains_alpha_3(&code));
            }
        }
    }

    #[test]
    fn remembers_each_distinct_name_once() {
        let n = normalizer();
        n.normalize("Brazil");
        n.normalize("Brazil");
        n.normalize("Atlantis");
        assert_eq!(n.cached_names(), 2);
    }

    #[test]
    fn world_list_collapses_duplicates() {
        let n = normalizer();
        let world = StaticWorldCountries::from_names(["USA", "United States", "Brazil", "Atlantis"]);
        let normalized = n.normalize_world(&world);
        let names: Vec<&str> = normalized.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["United States", "Brazil", "Atlantis"]);
    }

    #[test]
    fn skips_malformed_registry_rows() {
        let csv = "alpha_2,alpha_3,numeric,name,official_name,common_name\n\
                   XX,xx1,999,Nowhere,,\n\
                   FR,FRA,250,France,French Republic,\n";
        let registry = Iso3166Registry::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("Nowhere").is_none());
        assert_eq!(registry.lookup("french republic").map(|e| e.alpha_3.as_str()), Some("FRA"));
    }

    #[test]
    fn world_file_skips_comments() {
        let world = StaticWorldCountries::from_lines("# map domain\nBrazil\n\n  Peru  \n");
        assert_eq!(world.country_names(), vec!["Brazil", "Peru"]);
    }
}
