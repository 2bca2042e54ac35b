// user_experience.rs
use crate::config::edit_config;
use crate::error::GreenbroError;
use crate::user_interaction::{print_insight, print_insight_level_2, print_list};
use std::path::Path;

pub const FLAGS: [&str; 5] = [
    "@c           : Any sub-prompt => Cancel action",
    "@config      : Anywhere => Edit config (takes effect on next launch)",
    "@f / @flags  : Anywhere => View all flags",
    "@r / @reset  : Anywhere => Reset the country selection",
    "@q           : Anywhere => Quit greenbro",
];

/// Flags that need nothing from the dashboard. Returns true if one was handled.
pub fn handle_special_flag(flag: &str, config_path: &Path) -> bool {
    match flag.trim() {
        "@f" | "@flags" => {
            print_insight("Serving your flags ...");
            print_list(&FLAGS);
            println!();
            true
        }
        "@config" => {
            if let Err(e) = edit_config(config_path) {
                if let Some(message) = config_edit_failure(&e) {
                    print_insight_level_2(&message);
                }
            }
            true
        }
        _ => false,
    }
}

/// Bad JSON is already explained inside the editor round-trip; anything else
/// still needs telling.
pub fn config_edit_failure(error: &GreenbroError) -> Option<String> {
    match error {
        GreenbroError::Config(_) => None,
        other => Some(format!("Couldn't save the config, bro: {}", other)),
    }
}

pub fn handle_quit_flag(flag: &str) -> bool {
    flag.trim() == "@q"
}

pub fn handle_reset_flag(flag: &str) -> bool {
    matches!(flag.trim(), "@r" | "@reset")
}

pub fn handle_cancel_flag(flag: &str) -> bool {
    flag.trim().starts_with("@c") && flag.trim() != "@config"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_flags() {
        assert!(handle_quit_flag(" @q "));
        assert!(!handle_quit_flag("q"));
        assert!(handle_reset_flag("@reset"));
        assert!(handle_reset_flag("@r"));
        assert!(handle_cancel_flag("@c"));
        assert!(handle_cancel_flag("@cancel"));
        assert!(!handle_cancel_flag("@config"));
    }

    #[test]
    fn config_write_failures_are_reported() {
        let io = GreenbroError::io(
            "/nowhere/greenbro.config",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let message = config_edit_failure(&io).unwrap();
        assert!(message.contains("/nowhere/greenbro.config"));
        assert!(message.contains("denied"));

        let json = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        assert_eq!(config_edit_failure(&GreenbroError::Config(json)), None);
    }

    #[test]
    fn unknown_flags_are_left_alone() {
        assert!(!handle_special_flag("@nope", Path::new("unused.config")));
    }
}
