pub mod aggregators;
pub mod config;
pub mod country_normalizer;
pub mod csv_manager;
pub mod dashboard;
pub mod error;
pub mod filter_pipeline;
pub mod map_selection;
pub mod project_loader;
pub mod user_experience;
pub mod user_interaction;
pub mod view_renderer;
