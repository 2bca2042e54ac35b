// csv_manager.rs
use crate::user_interaction::{get_user_input, print_insight, print_list};
use chrono::{DateTime, Local};
use fuzzywuzzy::fuzz;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::warn;

const DATA_EXTENSIONS: [&str; 3] = ["csv", "xls", "xlsx"];

#[derive(Debug, Clone, PartialEq)]
pub struct DataFile {
    pub path: PathBuf,
    pub modified: SystemTime,
}

impl DataFile {
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    fn listing(&self) -> String {
        let modified: DateTime<Local> = self.modified.into();
        format!(
            "{} (Modified: {})",
            self.file_name(),
            modified.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// Spreadsheets in `dir`, most recently modified first.
pub fn list_data_files(dir: &Path) -> io::Result<Vec<DataFile>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_data = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| DATA_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false);
        if path.is_file() && is_data {
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            files.push(DataFile { path, modified });
        }
    }

    files.sort_by(|a, b| {
        b.modified
            .cmp(&a.modified)
            .then_with(|| a.file_name().cmp(b.file_name()))
    });
    Ok(files)
}

/// Picks a file by serial number or closest name. `None` means the user backed out.
pub fn pick_data_file(files: &[DataFile], choice: &str) -> Option<PathBuf> {
    let choice = choice.trim().to_lowercase();
    if choice.is_empty() {
        return None;
    }

    if let Ok(serial) = choice.parse::<usize>() {
        return files.get(serial.checked_sub(1)?).map(|f| f.path.clone());
    }

    if fuzz::ratio(&choice, "back") > 60 {
        return None;
    }

    files
        .iter()
        .map(|f| (f, fuzz::ratio(&choice, &f.file_name().to_lowercase())))
        .max_by_key(|&(_, score)| score)
        .map(|(f, _)| f.path.clone())
}

pub fn open_data_file(data_dir: &Path) -> Option<PathBuf> {
    let files = match list_data_files(data_dir) {
        Ok(files) => files,
        Err(e) => {
            warn!(dir = %data_dir.display(), error = %e, "could not read data directory");
            print_insight("Failed to read the directory.");
            return None;
        }
    };

    if files.is_empty() {
        print_insight(&format!(
            "No files in sight, bro. Drop a csv or xlsx into {}",
            data_dir.display()
        ));
        return None;
    }

    let listings: Vec<String> = files.iter().map(DataFile::listing).collect();
    let mut options: Vec<&str> = listings.iter().map(AsRef::as_ref).collect();
    options.push("BACK");
    print_list(&options);

    let choice = get_user_input("What's it gonna be?: ");
    if choice.trim().parse::<usize>().ok() == Some(options.len()) {
        print_insight("Bailed on that. Heading back, bro.");
        return None;
    }

    match pick_data_file(&files, &choice) {
        Some(path) => {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                print_insight(&format!("Opening {}", name));
            }
            Some(path)
        }
        None => {
            print_insight("No matching file found.");
            None
        }
    }
}
