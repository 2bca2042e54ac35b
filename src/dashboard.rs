// dashboard.rs
use crate::aggregators::{
    country_anomaly_counts, risk_proportions, scope_counts, CountryCount, RiskShare, ScopeCount,
};
use crate::country_normalizer::{CountryNormalizer, NormalizedCountry, WorldCountrySource};
use crate::filter_pipeline::{
    anomalies, apply_predicates, CreditRange, FilterPredicate, FilterState, RegistrySelection,
    ALL_REGISTRIES, RANGE_INPUT_HELP,
};
use crate::map_selection::{MapClick, MapInteraction, MapSelection};
use crate::project_loader::{Dataset, ProjectRecord};
use crate::user_experience::{
    handle_cancel_flag, handle_quit_flag, handle_reset_flag, handle_special_flag, FLAGS,
};
use crate::user_interaction::{
    determine_action_as_text, determine_sub_choice, fuzzy_best_match, get_user_input,
    get_user_input_level_2, print_insight, print_insight_level_2, print_list, print_list_level_2,
};
use crate::view_renderer::{
    format_credits, render_map, render_project_table, render_risk_bar, render_scope_chart,
    render_trend, RenderOptions,
};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Fuzzy country names below this ratio are treated as a miss.
const CLICK_MATCH_THRESHOLD: u8 = 60;

const MENU_OPTIONS: [&str; 6] = [
    "REGISTRY",
    "CREDIT RANGE",
    "MAP CLICK",
    "RESET",
    "PROJECT TREND",
    "FLAGS",
];

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardState {
    pub registry: RegistrySelection,
    pub credit_range: CreditRange,
    pub map: MapSelection,
    pub project: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DashboardCommand {
    SelectRegistry(RegistrySelection),
    SetCreditRange(CreditRange),
    Map(MapInteraction),
    SelectProject(String),
}

/// What a prompt produced: a command to apply, nothing, or a request to quit.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Apply(DashboardCommand),
    Stay,
    Quit,
}

/// One full render pass worth of derived data.
#[derive(Debug, Clone)]
pub struct Snapshot<'a> {
    /// The country selection actually in force for this pass.
    pub selection: MapSelection,
    pub filter: FilterState,
    pub country_counts: Vec<CountryCount>,
    pub scope_counts: Vec<ScopeCount>,
    pub risk: Vec<RiskShare>,
    pub anomalies: Vec<&'a ProjectRecord>,
    pub project_options: Vec<String>,
    /// Every anomaly row carrying the shown `Project_ID`.
    pub project_rows: Vec<&'a ProjectRecord>,
}

pub struct Dashboard {
    dataset: Dataset,
    world: Vec<NormalizedCountry>,
    normalizer: CountryNormalizer,
    render: RenderOptions,
    state: DashboardState,
}

impl Dashboard {
    /// Normalises the dataset and the world list once; everything else is
    /// recomputed on every interaction.
    pub fn new(
        dataset: Dataset,
        normalizer: CountryNormalizer,
        world_source: &dyn WorldCountrySource,
        render: RenderOptions,
    ) -> Self {
        let dataset = dataset.normalize_countries(&normalizer);
        let world = normalizer.normalize_world(world_source);
        let filter = FilterState::unfiltered(&dataset);

        Dashboard {
            dataset,
            world,
            normalizer,
            render,
            state: DashboardState {
                registry: filter.registry,
                credit_range: filter.credit_range,
                map: MapSelection::Unfiltered,
                project: None,
            },
        }
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn credit_bounds(&self) -> CreditRange {
        let (lo, hi) = self.dataset.credit_bounds().unwrap_or((0.0, 0.0));
        CreditRange::new(lo, hi)
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        compute_snapshot(&self.dataset, &self.world, &self.state)
    }

    /// Applies one interaction. Map clicks are judged against the counts of the
    /// view the user was looking at.
    pub fn apply(&mut self, command: DashboardCommand) {
        debug!(?command, "applying dashboard command");
        match command {
            DashboardCommand::SelectRegistry(registry) => self.state.registry = registry,
            DashboardCommand::SetCreditRange(range) => self.state.credit_range = range,
            DashboardCommand::Map(interaction) => {
                let counts = self.snapshot().country_counts;
                self.state.map = self.state.map.advance(&interaction, &counts);
            }
            DashboardCommand::SelectProject(id) => self.state.project = Some(id),
        }
    }

    /// Turns typed text into a map click. ISO-3 codes and registry names are
    /// tried first, then a fuzzy match against the drawn regions. Blank input
    /// is a click on open ocean.
    pub fn resolve_click(&self, input: &str) -> Option<MapClick> {
        let input = input.trim();
        if input.is_empty() {
            return Some(MapClick::Background);
        }

        let snapshot = self.snapshot();
        let drawn: Vec<(&str, &str)> = snapshot
            .country_counts
            .iter()
            .filter_map(|c| c.iso_alpha_3.as_deref().map(|code| (code, c.country.as_str())))
            .collect();

        let upper = input.to_uppercase();
        if let Some((code, _)) = drawn.iter().find(|(code, _)| *code == upper) {
            return Some(MapClick::Region(code.to_string()));
        }

        if let Some(code) = self.normalizer.normalize(input).iso_alpha_3 {
            if drawn.iter().any(|(c, _)| *c == code) {
                return Some(MapClick::Region(code));
            }
        }

        let names: Vec<&str> = drawn.iter().map(|(_, name)| *name).collect();
        match fuzzy_best_match(&names, input) {
            Some((index, score)) if score >= CLICK_MATCH_THRESHOLD => {
                Some(MapClick::Region(drawn[index].0.to_string()))
            }
            _ => None,
        }
    }

    pub fn render(&self) -> String {
        render_snapshot(&self.snapshot(), &self.state, self.dataset.has_risk_level, &self.render)
    }
}

/// Filter, then aggregate. The map counts ignore the country selection so
/// every country stays clickable; everything else honours it. A selected
/// country only narrows the views while it still has anomalies in the
/// registry and credit range population.
pub fn compute_snapshot<'a>(
    dataset: &'a Dataset,
    world: &[NormalizedCountry],
    state: &DashboardState,
) -> Snapshot<'a> {
    let mut filter = FilterState {
        registry: state.registry.clone(),
        credit_range: state.credit_range,
        country: None,
    };

    let population = apply_predicates(&dataset.records, &filter.population_predicates());
    let anomalies_all = anomalies(&population);
    let country_counts = country_anomaly_counts(&anomalies_all, world);

    let selection = match state.map.country() {
        Some(country)
            if country_counts
                .iter()
                .any(|c| c.country == country && c.anomaly_count > 0) =>
        {
            state.map.clone()
        }
        Some(country) => {
            debug!(country, "selected country has no anomalies here, showing all countries");
            MapSelection::Unfiltered
        }
        None => MapSelection::Unfiltered,
    };
    filter.country = selection.country().map(String::from);

    let region = match &filter.country {
        Some(country) => apply_predicates(
            population.iter().copied(),
            &[FilterPredicate::Country(country.clone())],
        ),
        None => population,
    };
    let selected = anomalies(&region);

    let project_options = project_options(&selected);
    let project_rows: Vec<&ProjectRecord> = state
        .project
        .as_deref()
        .filter(|id| project_options.iter().any(|o| o == id))
        .or_else(|| project_options.first().map(|s| s.as_str()))
        .map(|id| {
            selected
                .iter()
                .copied()
                .filter(|r| r.project_id == id)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    debug!(
        anomalies_all = anomalies_all.len(),
        anomalies = selected.len(),
        country = ?filter.country,
        "recomputed dashboard"
    );

    Snapshot {
        scope_counts: scope_counts(&selected),
        risk: risk_proportions(&selected),
        country_counts,
        selection,
        filter,
        anomalies: selected,
        project_options,
        project_rows,
    }
}

/// Distinct project ids in table order.
pub fn project_options(anomalies: &[&ProjectRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    anomalies
        .iter()
        .filter(|r| seen.insert(r.project_id.as_str()))
        .map(|r| r.project_id.clone())
        .collect()
}

pub fn render_snapshot(
    snapshot: &Snapshot<'_>,
    state: &DashboardState,
    has_risk_level: bool,
    opts: &RenderOptions,
) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Registry: {} | Credits: {} to {} | Country: {}\n\n",
        state.registry,
        format_credits(state.credit_range.min),
        format_credits(state.credit_range.max),
        snapshot.selection
    ));
    out.push_str(&render_map(&snapshot.country_counts, &snapshot.selection, opts));
    out.push('\n');
    out.push_str(&render_scope_chart(&snapshot.scope_counts, opts));
    out.push('\n');
    out.push_str(&render_risk_bar(&snapshot.risk, has_risk_level, opts));
    out.push('\n');
    out.push_str(&render_project_table(&snapshot.anomalies, opts));

    let trend = render_trend(&snapshot.project_rows, opts);
    if !trend.is_empty() {
        out.push('\n');
        out.push_str(&trend);
    }
    out
}

/// The interactive loop: show everything, take one interaction, recompute.
pub fn run_dashboard(dashboard: &mut Dashboard, config_path: &Path) {
    println!("{}", dashboard.render());

    loop {
        print_insight("Choose an action:");
        print_list(&MENU_OPTIONS);
        let choice = get_user_input("Your move, bro: ");

        let step = match flag_step(&choice, config_path) {
            Some(step) => step,
            None => match determine_action_as_text(&MENU_OPTIONS, &choice).as_deref() {
                Some("REGISTRY") => prompt_registry(dashboard, config_path),
                Some("CREDIT RANGE") => prompt_credit_range(dashboard, config_path),
                Some("MAP CLICK") => prompt_map_click(dashboard, config_path),
                Some("RESET") => Step::Apply(DashboardCommand::Map(MapInteraction::reset())),
                Some("PROJECT TREND") => prompt_project(dashboard, config_path),
                Some("FLAGS") => {
                    print_list(&FLAGS);
                    Step::Stay
                }
                _ => {
                    print_insight("Dude, that action's a no-go. Give it another whirl, alright?");
                    Step::Stay
                }
            },
        };

        match step {
            Step::Apply(command) => {
                dashboard.apply(command);
                println!();
                println!("{}", dashboard.render());
            }
            Step::Stay => {}
            Step::Quit => {
                print_insight("Later, bro.");
                break;
            }
        }
    }
}

/// Flags are honoured at every prompt before any menu matching happens.
pub fn flag_step(input: &str, config_path: &Path) -> Option<Step> {
    if handle_quit_flag(input) {
        return Some(Step::Quit);
    }
    if handle_cancel_flag(input) {
        return Some(Step::Stay);
    }
    if handle_reset_flag(input) {
        return Some(Step::Apply(DashboardCommand::Map(MapInteraction::reset())));
    }
    if handle_special_flag(input, config_path) {
        return Some(Step::Stay);
    }
    None
}

/// `All` or one of the known registries; weak matches and flags pick nothing.
pub fn resolve_registry(registries: &[String], input: &str) -> Option<RegistrySelection> {
    let mut options: Vec<&str> = vec![ALL_REGISTRIES];
    options.extend(registries.iter().map(|s| s.as_str()));
    determine_sub_choice(&options, input).map(|picked| RegistrySelection::from_choice(&picked))
}

fn prompt_registry(dashboard: &Dashboard, config_path: &Path) -> Step {
    let registries = dashboard.dataset().registries();
    let mut options: Vec<&str> = vec![ALL_REGISTRIES];
    options.extend(registries.iter().map(|s| s.as_str()));

    print_insight_level_2("Filter by Voluntary Registry:");
    print_list_level_2(&options);
    let choice = get_user_input_level_2("Enter your choice: ");
    if let Some(step) = flag_step(&choice, config_path) {
        return step;
    }

    match resolve_registry(&registries, &choice) {
        Some(registry) => Step::Apply(DashboardCommand::SelectRegistry(registry)),
        None => {
            print_insight_level_2("No such registry, bro.");
            Step::Stay
        }
    }
}

fn prompt_credit_range(dashboard: &Dashboard, config_path: &Path) -> Step {
    let bounds = dashboard.credit_bounds();
    let current = dashboard.state().credit_range;
    print_insight_level_2(&format!(
        "Total Credits Issued spans {} to {} (now {} to {})",
        format_credits(bounds.min),
        format_credits(bounds.max),
        format_credits(current.min),
        format_credits(current.max)
    ));
    let input = get_user_input_level_2("Enter MIN MAX (e.g. '100 5000'): ");
    if let Some(step) = flag_step(&input, config_path) {
        return step;
    }

    match CreditRange::parse(&input, bounds) {
        Some(range) => Step::Apply(DashboardCommand::SetCreditRange(range)),
        None => {
            print_insight_level_2(RANGE_INPUT_HELP);
            Step::Stay
        }
    }
}

fn prompt_map_click(dashboard: &Dashboard, config_path: &Path) -> Step {
    let input = get_user_input_level_2("Click a country (name or ISO-3, blank for open ocean): ");
    if let Some(step) = flag_step(&input, config_path) {
        return step;
    }

    match dashboard.resolve_click(&input) {
        Some(click) => Step::Apply(DashboardCommand::Map(MapInteraction {
            click: Some(click),
            reset: false,
        })),
        None => {
            print_insight_level_2("That's not on the map, bro.");
            Step::Stay
        }
    }
}

fn prompt_project(dashboard: &Dashboard, config_path: &Path) -> Step {
    let snapshot = dashboard.snapshot();
    if snapshot.project_options.is_empty() {
        print_insight_level_2("No anomalous projects in the current selection.");
        return Step::Stay;
    }

    let options: Vec<&str> = snapshot.project_options.iter().map(|s| s.as_str()).collect();
    print_insight_level_2("Select Project_ID:");
    print_list_level_2(&options);
    let choice = get_user_input_level_2("Enter your choice: ");
    if let Some(step) = flag_step(&choice, config_path) {
        return step;
    }

    match determine_sub_choice(&options, &choice) {
        Some(id) => Step::Apply(DashboardCommand::SelectProject(id)),
        None => {
            print_insight_level_2("No such project in the current selection.");
            Step::Stay
        }
    }
}
