// map_selection.rs
use crate::aggregators::CountryCount;
use std::fmt;
use tracing::debug;

/// The one piece of interaction state that survives between recomputes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MapSelection {
    #[default]
    Unfiltered,
    CountryFiltered {
        country: String,
        iso_alpha_3: String,
    },
}

/// Where a click landed. Regions are identified by ISO-3 code, never by their
/// position in the rendered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapClick {
    Region(String),
    Background,
}

/// Everything the map received during a single interaction cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapInteraction {
    pub click: Option<MapClick>,
    pub reset: bool,
}

impl MapInteraction {
    pub fn click(iso_alpha_3: &str) -> Self {
        MapInteraction {
            click: Some(MapClick::Region(iso_alpha_3.to_uppercase())),
            reset: false,
        }
    }

    pub fn background() -> Self {
        MapInteraction {
            click: Some(MapClick::Background),
            reset: false,
        }
    }

    pub fn reset() -> Self {
        MapInteraction {
            click: None,
            reset: true,
        }
    }
}

impl MapSelection {
    /// Reset beats any click in the same cycle. A background click clears the
    /// selection. A region click only sticks when that country has anomalies.
    pub fn advance(&self, interaction: &MapInteraction, counts: &[CountryCount]) -> MapSelection {
        if interaction.reset {
            return MapSelection::Unfiltered;
        }

        match &interaction.click {
            None => self.clone(),
            Some(MapClick::Background) => MapSelection::Unfiltered,
            Some(MapClick::Region(code)) => {
                let hit = counts.iter().find(|c| {
                    c.anomaly_count > 0 && c.iso_alpha_3.as_deref() == Some(code.as_str())
                });
                match hit {
                    Some(row) => MapSelection::CountryFiltered {
                        country: row.country.clone(),
                        iso_alpha_3: code.clone(),
                    },
                    None => {
                        debug!(iso_alpha_3 = %code, "click on a region without anomalies ignored");
                        self.clone()
                    }
                }
            }
        }
    }

    pub fn country(&self) -> Option<&str> {
        match self {
            MapSelection::Unfiltered => None,
            MapSelection::CountryFiltered { country, .. } => Some(country),
        }
    }

    pub fn iso_alpha_3(&self) -> Option<&str> {
        match self {
            MapSelection::Unfiltered => None,
            MapSelection::CountryFiltered { iso_alpha_3, .. } => Some(iso_alpha_3),
        }
    }
}

impl fmt::Display for MapSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapSelection::Unfiltered => write!(f, "all countries"),
            MapSelection::CountryFiltered {
                country,
                iso_alpha_3,
            } => write!(f, "{} ({})", country, iso_alpha_3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts() -> Vec<CountryCount> {
        vec![
            CountryCount {
                country: "Brazil".into(),
                iso_alpha_3: Some("BRA".into()),
                anomaly_count: 3,
            },
            CountryCount {
                country: "Peru".into(),
                iso_alpha_3: Some("PER".into()),
                anomaly_count: 0,
            },
        ]
    }

    fn brazil() -> MapSelection {
        MapSelection::CountryFiltered {
            country: "Brazil".into(),
            iso_alpha_3: "BRA".into(),
        }
    }

    #[test]
    fn clicking_a_country_with_anomalies_selects_it() {
        let next = MapSelection::Unfiltered.advance(&MapInteraction::click("bra"), &counts());
        assert_eq!(next, brazil());
        assert_eq!(next.country(), Some("Brazil"));
    }

    #[test]
    fn clicking_a_quiet_country_changes_nothing() {
        let c = counts();
        assert_eq!(
            MapSelection::Unfiltered.advance(&MapInteraction::click("PER"), &c),
            MapSelection::Unfiltered
        );
        assert_eq!(brazil().advance(&MapInteraction::click("PER"), &c), brazil());
        assert_eq!(brazil().advance(&MapInteraction::click("ATA"), &c), brazil());
    }

    #[test]
    fn background_click_and_reset_clear_the_selection() {
        let c = counts();
        assert_eq!(brazil().advance(&MapInteraction::background(), &c), MapSelection::Unfiltered);
        assert_eq!(brazil().advance(&MapInteraction::reset(), &c), MapSelection::Unfiltered);
        assert_eq!(
            MapSelection::Unfiltered.advance(&MapInteraction::reset(), &c),
            MapSelection::Unfiltered
        );
    }

    #[test]
    fn reset_wins_over_a_click_in_the_same_cycle() {
        let both = MapInteraction {
            click: Some(MapClick::Region("BRA".into())),
            reset: true,
        };
        assert_eq!(MapSelection::Unfiltered.advance(&both, &counts()), MapSelection::Unfiltered);
    }

    #[test]
    fn no_event_keeps_state() {
        assert_eq!(brazil().advance(&MapInteraction::default(), &counts()), brazil());
    }
}
