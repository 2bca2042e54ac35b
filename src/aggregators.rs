// aggregators.rs
use crate::country_normalizer::NormalizedCountry;
use crate::project_loader::ProjectRecord;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryCount {
    pub country: String,
    pub iso_alpha_3: Option<String>,
    pub anomaly_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeCount {
    pub scope: String,
    pub anomaly_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskShare {
    pub risk_level: String,
    /// Fraction in `[0, 1]`, full precision.
    pub proportion: f64,
}

impl RiskShare {
    pub fn percent_label(&self) -> String {
        format!("{:.0}%", self.proportion * 100.0)
    }
}

/// Counts per key, largest first, ties broken alphabetically.
pub fn value_counts<'a, I, F>(items: I, key: F) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a ProjectRecord>,
    F: Fn(&'a ProjectRecord) -> Option<&'a str>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for item in items {
        if let Some(k) = key(item) {
            *counts.entry(k).or_insert(0) += 1;
        }
    }

    let mut rows: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(k, n)| (k.to_string(), n))
        .collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows
}

/// Anomalies per country over the whole world list. World countries without
/// anomalies get a zero; anomaly countries missing from the world list are
/// appended so the counts always add up to `anomalies.len()`.
pub fn country_anomaly_counts(
    anomalies: &[&ProjectRecord],
    world: &[NormalizedCountry],
) -> Vec<CountryCount> {
    let counted = value_counts(anomalies.iter().copied(), |r| Some(r.country.as_str()));

    let mut codes: HashMap<&str, &str> = HashMap::new();
    for record in anomalies {
        if let Some(code) = record.iso_alpha_3.as_deref() {
            codes.entry(record.country.as_str()).or_insert(code);
        }
    }

    let count_of: HashMap<&str, usize> = counted.iter().map(|(c, n)| (c.as_str(), *n)).collect();

    let mut rows: Vec<CountryCount> = world
        .iter()
        .map(|w| CountryCount {
            country: w.name.clone(),
            iso_alpha_3: w
                .iso_alpha_3
                .clone()
                .or_else(|| codes.get(w.name.as_str()).map(|c| c.to_string())),
            anomaly_count: count_of.get(w.name.as_str()).copied().unwrap_or(0),
        })
        .collect();

    for (country, n) in &counted {
        if !world.iter().any(|w| w.name == *country) {
            rows.push(CountryCount {
                country: country.clone(),
                iso_alpha_3: codes.get(country.as_str()).map(|c| c.to_string()),
                anomaly_count: *n,
            });
        }
    }

    rows
}

pub fn scope_counts(anomalies: &[&ProjectRecord]) -> Vec<ScopeCount> {
    value_counts(anomalies.iter().copied(), |r| {
        Some(r.scope.as_str()).filter(|s| !s.is_empty())
    })
    .into_iter()
    .map(|(scope, anomaly_count)| ScopeCount {
        scope,
        anomaly_count,
    })
    .collect()
}

/// Share of each present risk level. Absent levels are left out, not zero-filled.
pub fn risk_proportions(anomalies: &[&ProjectRecord]) -> Vec<RiskShare> {
    let counted = value_counts(anomalies.iter().copied(), |r| r.risk_level.as_deref());
    let total: usize = counted.iter().map(|(_, n)| n).sum();
    if total == 0 {
        return Vec::new();
    }

    counted
        .into_iter()
        .map(|(risk_level, n)| RiskShare {
            risk_level,
            proportion: n as f64 / total as f64,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project_loader::years;

    fn anomaly(country: &str, iso: Option<&str>, scope: &str, risk: Option<&str>) -> ProjectRecord {
        ProjectRecord {
            country: country.to_string(),
            iso_alpha_3: iso.map(String::from),
            voluntary_registry: "Verra".to_string(),
            project_id: format!("{country}-{scope}"),
            project_name: "Project".to_string(),
            scope: scope.to_string(),
            project_type: "REDD+".to_string(),
            total_credits_issued: Some(10.0),
            risk_level: risk.map(String::from),
            anomaly_flag: Some(-1),
            yearly_credits: years().map(|_| None).collect(),
        }
    }

    fn world() -> Vec<NormalizedCountry> {
        ["Brazil", "Peru", "United States"]
            .iter()
            .zip(["BRA", "PER", "USA"])
            .map(|(name, code)| NormalizedCountry {
                name: name.to_string(),
                iso_alpha_3: Some(code.to_string()),
            })
            .collect()
    }

    #[test]
    fn every_world_country_gets_a_row() {
        let records = vec![
            anomaly("Brazil", Some("BRA"), "1", Some("High")),
            anomaly("Brazil", Some("BRA"), "2", Some("Low")),
        ];
        let refs: Vec<&ProjectRecord> = records.iter().collect();
        let rows = country_anomaly_counts(&refs, &world());

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].anomaly_count, 2);
        assert_eq!(rows[1].anomaly_count, 0);
        assert_eq!(rows[2].anomaly_count, 0);
    }

    #[test]
    fn counts_add_up_even_outside_the_world_list() {
        let records = vec![
            anomaly("Brazil", Some("BRA"), "1", None),
            anomaly("Fiji", Some("FJI"), "1", None),
            anomaly("Atlantis", None, "1", None),
            anomaly("Atlantis", None, "2", None),
        ];
        let refs: Vec<&ProjectRecord> = records.iter().collect();
        let rows = country_anomaly_counts(&refs, &world());

        let total: usize = rows.iter().map(|r| r.anomaly_count).sum();
        assert_eq!(total, refs.len());
        let atlantis = rows.iter().find(|r| r.country == "Atlantis").unwrap();
        assert_eq!(atlantis.anomaly_count, 2);
        assert_eq!(atlantis.iso_alpha_3, None);
        let fiji = rows.iter().find(|r| r.country == "Fiji").unwrap();
        assert_eq!(fiji.iso_alpha_3.as_deref(), Some("FJI"));
    }

    #[test]
    fn scopes_are_ordered_by_count_then_label() {
        let records = vec![
            anomaly("Peru", None, "2", None),
            anomaly("Peru", None, "1", None),
            anomaly("Peru", None, "3", None),
            anomaly("Peru", None, "3", None),
        ];
        let refs: Vec<&ProjectRecord> = records.iter().collect();
        let scopes = scope_counts(&refs);
        let flat: Vec<(&str, usize)> = scopes
            .iter()
            .map(|s| (s.scope.as_str(), s.anomaly_count))
            .collect();
        assert_eq!(flat, vec![("3", 2), ("1", 1), ("2", 1)]);
    }

    #[test]
    fn risk_shares_sum_to_one_over_present_levels() {
        let records = vec![
            anomaly("Peru", None, "1", Some("High")),
            anomaly("Peru", None, "1", Some("High")),
            anomaly("Peru", None, "1", Some("Low")),
            anomaly("Peru", None, "1", None),
        ];
        let refs: Vec<&ProjectRecord> = records.iter().collect();
        let shares = risk_proportions(&refs);

        assert_eq!(shares.len(), 2);
        assert!(shares.iter().all(|s| s.risk_level != "Moderate"));
        let sum: f64 = shares.iter().map(|s| s.proportion).sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert_eq!(shares[0].risk_level, "High");
        assert_eq!(shares[0].percent_label(), "67%");
        assert!((shares[0].proportion - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn empty_anomaly_set_gives_empty_aggregates() {
        let refs: Vec<&ProjectRecord> = Vec::new();
        assert!(scope_counts(&refs).is_empty());
        assert!(risk_proportions(&refs).is_empty());
        assert!(country_anomaly_counts(&refs, &world())
            .iter()
            .all(|r| r.anomaly_count == 0));
    }
}
