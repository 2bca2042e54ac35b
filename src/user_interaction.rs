// user_interaction.rs
use fuzzywuzzy::fuzz;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use vim_edit::vim_edit;

fn read_line_with_prompt(custom_prompt: &str) -> String {
    let mut rl = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            println!("Failed to initialize editor: {:?}", err);
            return String::new();
        }
    };

    match rl.readline(custom_prompt) {
        Ok(line) => {
            let _ = rl.add_history_entry(line.as_str());
            line
        }
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
            println!("Input interrupted or end of file reached.");
            "@q".to_string()
        }
        Err(err) => {
            println!("Error reading line: {:?}", err);
            String::new()
        }
    }
}

pub fn get_user_input(prompt: &str) -> String {
    // ANSI escape codes for styling
    let bold_green = "\x1b[1;38;5;34m";
    let reset = "\x1b[0m";

    let custom_prompt = format!("{}@BIGbro: {}{}", bold_green, prompt, reset);
    read_line_with_prompt(&custom_prompt)
}

pub fn get_user_input_level_2(prompt: &str) -> String {
    let green = "\x1b[0;38;5;34m";
    let reset = "\x1b[0m";

    let custom_prompt = format!("  {}@LILbro: {}{}", green, prompt, reset);
    read_line_with_prompt(&custom_prompt)
}

/// Opens the config text in vim and hands back whatever was saved.
pub fn get_edited_user_config_input(current_config: String) -> String {
    vim_edit(current_config)
}

pub fn print_list(options: &[&str]) {
    let bold_yellow = "\x1b[1;33m";
    let reset = "\x1b[0m";

    // Pad serials so the options line up
    let max_digits = options.len().to_string().len();

    for (index, option) in options.iter().enumerate() {
        let padded_index = format!("{:width$}:", index + 1, width = max_digits);
        println!("  {}{} {}{}", bold_yellow, padded_index, option, reset);
    }
}

pub fn print_list_level_2(options: &[&str]) {
    let yellow = "\x1b[0;33m";
    let reset = "\x1b[0m";

    let max_digits = options.len().to_string().len();

    for (index, option) in options.iter().enumerate() {
        let padded_index = format!("{:width$}:", index + 1, width = max_digits);
        println!("    {}{} {}{}", yellow, padded_index, option, reset);
    }
}

/// Best fuzzy match as a zero-based index with its score.
pub fn fuzzy_best_match(options: &[&str], choice: &str) -> Option<(usize, u8)> {
    let choice = choice.trim().to_lowercase();
    if choice.is_empty() {
        return None;
    }
    options
        .iter()
        .enumerate()
        .map(|(index, option)| (index, fuzz::ratio(&choice, &option.to_lowercase())))
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
}

/// A serial number wins; otherwise the closest option by fuzzy ratio.
pub fn determine_action_as_number(menu_options: &[&str], choice: &str) -> Option<usize> {
    if let Ok(index) = choice.trim().parse::<usize>() {
        if index > 0 && index <= menu_options.len() {
            return Some(index);
        }
        return None;
    }

    fuzzy_best_match(menu_options, choice).map(|(index, _)| index + 1)
}

pub fn determine_action_as_text(menu_options: &[&str], choice: &str) -> Option<String> {
    determine_action_as_number(menu_options, choice).map(|n| menu_options[n - 1].to_string())
}

/// Fuzzy matches below this ratio are treated as a miss at sub-prompts.
pub const SUB_CHOICE_THRESHOLD: u8 = 60;

/// Stricter than `determine_action_as_text`: flags never match, then a serial
/// number, an exact name, a unique prefix, or a fuzzy match of at least
/// `SUB_CHOICE_THRESHOLD`.
pub fn determine_sub_choice(options: &[&str], choice: &str) -> Option<String> {
    let trimmed = choice.trim();
    if trimmed.is_empty() || trimmed.starts_with('@') {
        return None;
    }

    if let Ok(index) = trimmed.parse::<usize>() {
        return index
            .checked_sub(1)
            .and_then(|i| options.get(i))
            .map(|o| o.to_string());
    }

    let lowered = trimmed.to_lowercase();
    if let Some(exact) = options.iter().find(|o| o.to_lowercase() == lowered) {
        return Some(exact.to_string());
    }

    let prefixed: Vec<&&str> = options
        .iter()
        .filter(|o| o.to_lowercase().starts_with(&lowered))
        .collect();
    if let [only] = prefixed.as_slice() {
        return Some(only.to_string());
    }

    match fuzzy_best_match(options, trimmed) {
        Some((index, score)) if score >= SUB_CHOICE_THRESHOLD => Some(options[index].to_string()),
        _ => None,
    }
}

pub fn print_insight(message: &str) {
    let bold_green = "\x1b[1;38;5;34m";
    let reset = "\x1b[0m";

    println!("{}@BIGBro: {}{}", bold_green, message, reset);
}

pub fn print_insight_level_2(message: &str) {
    let green = "\x1b[0;38;5;34m";
    let reset = "\x1b[0m";

    println!("  {}@LILBro: {}{}", green, message, reset);
}

#[cfg(test)]
mod tests {
    use super::*;

    const MENU: [&str; 4] = ["REGISTRY", "CREDIT RANGE", "MAP CLICK", "RESET"];

    #[test]
    fn serial_numbers_pick_directly() {
        assert_eq!(determine_action_as_number(&MENU, "2"), Some(2));
        assert_eq!(determine_action_as_text(&MENU, " 4 "), Some("RESET".to_string()));
        assert_eq!(determine_action_as_number(&MENU, "9"), None);
        assert_eq!(determine_action_as_number(&MENU, "0"), None);
    }

    #[test]
    fn text_falls_back_to_fuzzy_matching() {
        assert_eq!(determine_action_as_text(&MENU, "registy"), Some("REGISTRY".to_string()));
        assert_eq!(determine_action_as_text(&MENU, "map"), Some("MAP CLICK".to_string()));
        assert_eq!(determine_action_as_text(&MENU, ""), None);
    }

    #[test]
    fn sub_choices_ignore_flags_and_weak_matches() {
        let registries = ["All", "Gold Standard", "Verra"];
        assert_eq!(determine_sub_choice(&registries, "@q"), None);
        assert_eq!(determine_sub_choice(&registries, "@config"), None);
        assert_eq!(determine_sub_choice(&registries, "xyzzy"), None);
        assert_eq!(determine_sub_choice(&registries, "4"), None);
        assert_eq!(determine_sub_choice(&registries, "3"), Some("Verra".to_string()));
        assert_eq!(determine_sub_choice(&registries, "ALL"), Some("All".to_string()));
        assert_eq!(
            determine_sub_choice(&registries, "gold"),
            Some("Gold Standard".to_string())
        );
        assert_eq!(determine_sub_choice(&registries, "vera"), Some("Verra".to_string()));
    }

    #[test]
    fn fuzzy_match_reports_a_score() {
        let (index, score) = fuzzy_best_match(&["Brazil", "Peru"], "brazl").unwrap();
        assert_eq!(index, 0);
        assert!(score > 80);
    }
}
