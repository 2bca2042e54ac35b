// config.rs
use crate::country_normalizer::{Iso3166Registry, StaticWorldCountries};
use crate::error::{GreenbroError, Result};
use crate::user_interaction::{get_edited_user_config_input, print_insight_level_2};
use crate::view_renderer::RenderOptions;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const CONFIG_FILE_NAME: &str = "greenbro.config";

const SYNTAX: &str = r#"SYNTAX
======
{
  "data_dir": "",               // where to look for csv/xls files; empty => ~/Desktop/csv_db
  "world_countries_path": "",   // one country per line; empty => bundled list
  "country_registry_path": "",  // csv: alpha_2,alpha_3,numeric,name,official_name,common_name; empty => bundled ISO 3166
  "table_row_limit": 25,
  "cell_width": 24,
  "chart_width": 40,
  "map_show_zero_counts": false,
  "use_colors": true            // NO_COLOR in the environment also turns colours off
}
"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: String,
    pub world_countries_path: String,
    pub country_registry_path: String,
    pub table_row_limit: usize,
    pub cell_width: usize,
    pub chart_width: usize,
    pub map_show_zero_counts: bool,
    pub use_colors: bool,
}

impl Default for Config {
    fn default() -> Self {
        let render = RenderOptions::default();
        Config {
            data_dir: String::new(),
            world_countries_path: String::new(),
            country_registry_path: String::new(),
            table_row_limit: render.table_row_limit,
            cell_width: render.cell_width,
            chart_width: render.chart_width,
            map_show_zero_counts: render.map_show_zero_counts,
            use_colors: render.use_colors,
        }
    }
}

impl Config {
    pub fn data_dir(&self) -> PathBuf {
        if self.data_dir.trim().is_empty() {
            default_data_dir()
        } else {
            PathBuf::from(self.data_dir.trim())
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            use_colors: self.use_colors && env::var_os("NO_COLOR").is_none(),
            chart_width: self.chart_width.max(1),
            cell_width: self.cell_width.max(1),
            table_row_limit: self.table_row_limit,
            map_show_zero_counts: self.map_show_zero_counts,
        }
    }

    pub fn country_registry(&self) -> Result<Iso3166Registry> {
        match self.country_registry_path.trim() {
            "" => Iso3166Registry::bundled(),
            path => Iso3166Registry::from_path(Path::new(path)),
        }
    }

    pub fn world_countries(&self) -> Result<StaticWorldCountries> {
        match self.world_countries_path.trim() {
            "" => Ok(StaticWorldCountries::bundled()),
            path => StaticWorldCountries::from_path(Path::new(path)),
        }
    }
}

pub fn default_data_dir() -> PathBuf {
    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join("Desktop").join("csv_db")
}

pub fn default_config_path() -> PathBuf {
    default_data_dir().join(CONFIG_FILE_NAME)
}

fn default_config_text() -> Result<String> {
    let json = serde_json::to_string_pretty(&Config::default())?;
    Ok(format!("{}\n\n{}", json, SYNTAX))
}

/// Everything before the `SYNTAX` block is the config. An empty config means defaults.
pub fn parse_config_text(text: &str) -> Result<Config> {
    let json_part = text.split("SYNTAX").next().unwrap_or_default().trim();
    if json_part.is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_json::from_str(json_part)?)
}

/// Reads the config, writing a default one first if there is none yet.
pub fn load_config(config_path: &Path) -> Result<Config> {
    if !config_path.exists() {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| GreenbroError::io(parent, e))?;
        }
        fs::write(config_path, default_config_text()?)
            .map_err(|e| GreenbroError::io(config_path, e))?;
        info!(path = %config_path.display(), "wrote default config");
    }

    let text = fs::read_to_string(config_path).map_err(|e| GreenbroError::io(config_path, e))?;
    let config = parse_config_text(&text)?;
    info!(path = %config_path.display(), "config loaded");
    Ok(config)
}

/// Opens the config in vim. Invalid JSON is reported and nothing is saved.
pub fn edit_config(config_path: &Path) -> Result<Config> {
    let current_config_text = if config_path.exists() {
        fs::read_to_string(config_path).map_err(|e| GreenbroError::io(config_path, e))?
    } else {
        default_config_text()?
    };

    let edited_config_text = get_edited_user_config_input(current_config_text);

    let config = match parse_config_text(&edited_config_text) {
        Ok(config) => {
            print_insight_level_2("Config's all good, bro!");
            config
        }
        Err(e) => {
            print_insight_level_2(&format!(
                "Whoops, hit a snag with that JSON: {}. Mind tweaking the config and trying again?",
                e
            ));
            return Err(e);
        }
    };

    let json_part = edited_config_text
        .split("SYNTAX")
        .next()
        .unwrap_or_default()
        .trim_end();
    let new_config_content = format!("{}\n\n{}", json_part, SYNTAX);
    fs::write(config_path, new_config_content).map_err(|e| GreenbroError::io(config_path, e))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_text_round_trips_through_the_syntax_block() {
        let text = default_config_text().unwrap();
        assert!(text.contains("SYNTAX"));
        assert_eq!(parse_config_text(&text).unwrap(), Config::default());
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = parse_config_text(r#"{ "table_row_limit": 5 }"#).unwrap();
        assert_eq!(config.table_row_limit, 5);
        assert_eq!(config.chart_width, 40);
        assert!(config.use_colors);
        assert_eq!(parse_config_text("").unwrap(), Config::default());
    }

    #[test]
    fn bad_json_is_a_config_error() {
        let err = parse_config_text("{ not json").unwrap_err();
        assert!(matches!(err, GreenbroError::Config(_)));
    }

    #[test]
    fn first_load_writes_a_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let config = load_config(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());
        assert_eq!(load_config(&path).unwrap(), Config::default());
    }

    #[test]
    fn custom_world_list_is_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let world = dir.path().join("world.txt");
        fs::write(&world, "Brazil\nPeru\n").unwrap();
        let config = Config {
            world_countries_path: world.display().to_string(),
            ..Config::default()
        };
        use crate::country_normalizer::WorldCountrySource;
        assert_eq!(config.world_countries().unwrap().country_names(), vec!["Brazil", "Peru"]);
    }
}
