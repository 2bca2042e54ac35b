// project_loader.rs
use crate::country_normalizer::CountryNormalizer;
use crate::error::{GreenbroError, Result};
use calamine::{open_workbook_auto, DataType, Reader};
use csv::ReaderBuilder;
use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const FIRST_YEAR: u16 = 1996;
pub const LAST_YEAR: u16 = 2025;

/// The only value of `anomaly_flag` that marks a project as irregular.
pub const ANOMALY_FLAG: i64 = -1;

pub const COL_COUNTRY: &str = "Country";
pub const COL_REGISTRY: &str = "Voluntary Registry";
pub const COL_PROJECT_ID: &str = "Project_ID";
pub const COL_PROJECT_NAME: &str = "Project Name";
pub const COL_SCOPE: &str = "Scope";
pub const COL_TYPE: &str = "Type";
pub const COL_TOTAL_CREDITS: &str = "Total Credits Issued";
pub const COL_RISK_LEVEL: &str = "Risk_Level";
pub const COL_ANOMALY_FLAG: &str = "anomaly_flag";

// The year columns 1996..=2025 are required as well.
const REQUIRED_COLUMNS: [&str; 8] = [
    COL_COUNTRY,
    COL_REGISTRY,
    COL_PROJECT_ID,
    COL_PROJECT_NAME,
    COL_SCOPE,
    COL_TYPE,
    COL_TOTAL_CREDITS,
    COL_ANOMALY_FLAG,
];

pub fn years() -> impl Iterator<Item = u16> {
    FIRST_YEAR..=LAST_YEAR
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectRecord {
    pub country: String,
    pub iso_alpha_3: Option<String>,
    pub voluntary_registry: String,
    pub project_id: String,
    pub project_name: String,
    pub scope: String,
    pub project_type: String,
    pub total_credits_issued: Option<f64>,
    pub risk_level: Option<String>,
    pub anomaly_flag: Option<i64>,
    /// Credits issued per calendar year, `FIRST_YEAR` first.
    pub yearly_credits: Vec<Option<f64>>,
}

impl ProjectRecord {
    pub fn is_anomaly(&self) -> bool {
        self.anomaly_flag == Some(ANOMALY_FLAG)
    }

    pub fn credits_by_year(&self) -> Vec<(u16, Option<f64>)> {
        years()
            .zip(self.yearly_credits.iter().copied().chain(std::iter::repeat(None)))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub source: PathBuf,
    pub records: Vec<ProjectRecord>,
    pub has_risk_level: bool,
}

impl Dataset {
    /// Loads a `.csv`, `.xls` or `.xlsx` file. Workbooks are read from their first sheet.
    pub fn load(path: &Path) -> Result<Dataset> {
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();

        let dataset = match extension.as_str() {
            "csv" => {
                let file = std::fs::File::open(path).map_err(|e| GreenbroError::io(path, e))?;
                Dataset::from_csv_reader(path, file)?
            }
            "xls" | "xlsx" | "xlsm" | "xlsb" | "ods" => Dataset::from_workbook(path)?,
            _ => return Err(GreenbroError::UnsupportedFile(path.to_path_buf())),
        };

        info!(
            path = %path.display(),
            records = dataset.records.len(),
            anomalies = dataset.records.iter().filter(|r| r.is_anomaly()).count(),
            "dataset loaded"
        );
        Ok(dataset)
    }

    pub fn from_csv_reader<R: Read>(source: &Path, reader: R) -> Result<Dataset> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| GreenbroError::csv(source, e))?
            .iter()
            .map(String::from)
            .collect();

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| GreenbroError::csv(source, e))?;
            rows.push(record.iter().map(String::from).collect());
        }

        Dataset::from_table(source, &headers, rows)
    }

    fn from_workbook(path: &Path) -> Result<Dataset> {
        let mut workbook = open_workbook_auto(path).map_err(|e| GreenbroError::Workbook {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let range = match workbook.worksheet_range_at(0) {
            Some(Ok(range)) => range,
            Some(Err(e)) => {
                return Err(GreenbroError::Workbook {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }
            None => return Err(GreenbroError::EmptyWorkbook(path.to_path_buf())),
        };

        let mut sheet_rows = range
            .rows()
            .map(|row| row.iter().map(cell_to_string).collect::<Vec<String>>());
        let headers = sheet_rows
            .next()
            .ok_or_else(|| GreenbroError::EmptyWorkbook(path.to_path_buf()))?;

        Dataset::from_table(path, &headers, sheet_rows.collect())
    }

    /// Builds records from raw string cells, coercing numerics as it goes.
    pub fn from_table(source: &Path, headers: &[String], rows: Vec<Vec<String>>) -> Result<Dataset> {
        let index = HeaderIndex::new(headers);

        let year_labels: Vec<String> = years().map(|y| y.to_string()).collect();
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(year_labels.iter().cloned())
            .filter(|c| index.position(c).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(GreenbroError::MissingColumns(missing));
        }

        let risk_position = index.position(COL_RISK_LEVEL);
        let year_positions: Vec<Option<usize>> =
            year_labels.iter().map(|y| index.position(y)).collect();

        let mut malformed_cells = 0usize;
        let mut records = Vec::with_capacity(rows.len());

        for row in &rows {
            let cell = |column: &str| index.cell(row, column).to_string();

            let mut coerce = |raw: &str| -> Option<f64> {
                let value = parse_number(raw);
                if value.is_none() && !raw.trim().is_empty() {
                    malformed_cells += 1;
                }
                value
            };

            let total_credits_issued = coerce(&cell(COL_TOTAL_CREDITS));
            let yearly_credits = year_positions
                .iter()
                .map(|p| coerce(p.and_then(|i| row.get(i)).map(|s| s.as_str()).unwrap_or("")))
                .collect();

            let risk_level = risk_position
                .and_then(|i| row.get(i))
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(String::from);

            records.push(ProjectRecord {
                country: cell(COL_COUNTRY).trim().to_string(),
                iso_alpha_3: None,
                voluntary_registry: cell(COL_REGISTRY).trim().to_string(),
                project_id: cell(COL_PROJECT_ID).trim().to_string(),
                project_name: cell(COL_PROJECT_NAME).trim().to_string(),
                scope: cell(COL_SCOPE).trim().to_string(),
                project_type: cell(COL_TYPE).trim().to_string(),
                total_credits_issued,
                risk_level,
                anomaly_flag: parse_flag(&cell(COL_ANOMALY_FLAG)),
                yearly_credits,
            });
        }

        if malformed_cells > 0 {
            warn!(malformed_cells, "numeric cells could not be coerced and were treated as missing");
        }

        Ok(Dataset {
            source: source.to_path_buf(),
            records,
            has_risk_level: risk_position.is_some(),
        })
    }

    /// Replaces every raw country with its canonical name and attaches the ISO-3 code.
    pub fn normalize_countries(mut self, normalizer: &CountryNormalizer) -> Dataset {
        let mut unresolved = BTreeSet::new();
        for record in &mut self.records {
            let resolved = normalizer.normalize(&record.country);
            if resolved.iso_alpha_3.is_none() && !resolved.name.is_empty() {
                unresolved.insert(resolved.name.clone());
            }
            record.country = resolved.name;
            record.iso_alpha_3 = resolved.iso_alpha_3;
        }

        if !unresolved.is_empty() {
            warn!(countries = ?unresolved, "countries not found in the registry are kept as typed");
        }
        self
    }

    /// Observed min/max of `Total Credits Issued`, ignoring missing values.
    pub fn credit_bounds(&self) -> Option<(f64, f64)> {
        self.records
            .iter()
            .filter_map(|r| r.total_credits_issued)
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    pub fn registries(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.voluntary_registry.as_str())
            .filter(|r| !r.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(String::from)
            .collect()
    }
}

struct HeaderIndex {
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    fn new(headers: &[String]) -> Self {
        let mut positions = HashMap::new();
        for (i, header) in headers.iter().enumerate() {
            positions.entry(normalize_header(header)).or_insert(i);
        }
        HeaderIndex { positions }
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    fn cell<'r>(&self, row: &'r [String], column: &str) -> &'r str {
        self.position(column)
            .and_then(|i| row.get(i))
            .map(|s| s.as_str())
            .unwrap_or("")
    }
}

/// Collapses whitespace runs (embedded newlines included) so that
/// `"Total Credits \nIssued"` matches `Total Credits Issued`.
pub fn normalize_header(header: &str) -> String {
    header
        .trim_start_matches('\u{feff}')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_flag(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(v);
    }
    match parse_number(trimmed) {
        Some(v) if v.fract() == 0.0 => Some(v as i64),
        _ => None,
    }
}

fn cell_to_string(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.clone(),
        DataType::Float(f) => f.to_string(),
        DataType::Int(i) => i.to_string(),
        DataType::Bool(b) => b.to_string(),
        DataType::DateTime(f) => f.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn year_header() -> String {
        years().map(|y| y.to_string()).collect::<Vec<_>>().join(",")
    }

    fn year_cells(values: &[(u16, &str)]) -> String {
        years()
            .map(|y| {
                values
                    .iter()
                    .find(|(year, _)| *year == y)
                    .map(|(_, v)| v.to_string())
                    .unwrap_or_default()
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    fn sample_csv() -> String {
        format!(
            "Country,Voluntary Registry,Project_ID,Project Name,Scope,Type,\"Total Credits \nIssued\",Risk_Level,anomaly_flag,{}\n\
             USA,Verra,VCS1,Forest Guard,1,REDD+,100,High,-1,{}\n\
             Brazil,Gold Standard,GS7,Cookstoves,2,Household,oops,Low,1,{}\n",
            year_header(),
            year_cells(&[(1996, "5"), (2001, "n/a"), (2025, "12.5")]),
            year_cells(&[]),
        )
    }

    #[test]
    fn loads_csv_and_collapses_multiline_header() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(sample_csv().as_bytes()).unwrap();

        let dataset = Dataset::load(file.path()).unwrap();
        assert_eq!(dataset.records.len(), 2);
        assert!(dataset.has_risk_level);

        let first = &dataset.records[0];
        assert_eq!(first.country, "USA");
        assert_eq!(first.total_credits_issued, Some(100.0));
        assert!(first.is_anomaly());
        assert_eq!(first.yearly_credits.len(), 30);
        assert_eq!(first.yearly_credits[0], Some(5.0));
        assert_eq!(first.yearly_credits[5], None);
        assert_eq!(first.yearly_credits[29], Some(12.5));
    }

    #[test]
    fn malformed_numbers_become_missing() {
        let dataset = Dataset::from_csv_reader(Path::new("mem.csv"), sample_csv().as_bytes()).unwrap();
        let second = &dataset.records[1];
        assert_eq!(second.total_credits_issued, None);
        assert!(!second.is_anomaly());
        assert!(second.yearly_credits.iter().all(|v| v.is_none()));
    }

    #[test]
    fn reports_every_missing_column() {
        let csv = "Country,Project_ID\nUSA,1\n";
        let err = Dataset::from_csv_reader(Path::new("mem.csv"), csv.as_bytes()).unwrap_err();
        match err {
            GreenbroError::MissingColumns(cols) => {
                assert!(cols.contains(&COL_REGISTRY.to_string()));
                assert!(cols.contains(&"1996".to_string()));
                assert!(cols.contains(&"2025".to_string()));
                assert!(!cols.contains(&COL_COUNTRY.to_string()));
                assert!(!cols.contains(&COL_RISK_LEVEL.to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn risk_level_column_is_optional() {
        let csv = format!(
            "Country,Voluntary Registry,Project_ID,Project Name,Scope,Type,Total Credits Issued,anomaly_flag,{}\n\
             Peru,Verra,P1,Andes,1,Hydro,3,-1.0,{}\n",
            year_header(),
            year_cells(&[]),
        );
        let dataset = Dataset::from_csv_reader(Path::new("mem.csv"), csv.as_bytes()).unwrap();
        assert!(!dataset.has_risk_level);
        assert_eq!(dataset.records[0].risk_level, None);
        assert!(dataset.records[0].is_anomaly());
    }

    #[test]
    fn derives_bounds_and_registries() {
        let dataset = Dataset::from_csv_reader(Path::new("mem.csv"), sample_csv().as_bytes()).unwrap();
        assert_eq!(dataset.credit_bounds(), Some((100.0, 100.0)));
        assert_eq!(dataset.registries(), vec!["Gold Standard", "Verra"]);
    }

    #[test]
    fn loads_first_sheet_of_a_workbook() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/projects.xlsx");
        let dataset = Dataset::load(&path).unwrap();
        assert!(dataset.has_risk_level);
        assert_eq!(dataset.records.len(), 2);

        let kenya = &dataset.records[0];
        assert_eq!(kenya.country, "Kenya");
        assert_eq!(kenya.project_id, "VCS4");
        assert_eq!(kenya.scope, "1");
        assert_eq!(kenya.total_credits_issued, Some(300.0));
        assert_eq!(kenya.anomaly_flag, Some(-1));
        assert!(kenya.is_anomaly());
        assert_eq!(kenya.yearly_credits[14], Some(12.5));
        assert_eq!(kenya.yearly_credits[0], None);

        assert!(!dataset.records[1].is_anomaly());
        assert_eq!(dataset.credit_bounds(), Some((300.0, 900.0)));
    }

    #[test]
    fn workbook_floats_become_plain_cell_text() {
        assert_eq!(cell_to_string(&DataType::Float(-1.0)), "-1");
        assert_eq!(parse_flag(&cell_to_string(&DataType::Float(-1.0))), Some(-1));
        assert_eq!(cell_to_string(&DataType::Float(1996.0)), "1996");
        assert_eq!(cell_to_string(&DataType::Empty), "");
    }

    #[test]
    fn rejects_unknown_extensions() {
        let err = Dataset::load(Path::new("projects.parquet")).unwrap_err();
        assert!(matches!(err, GreenbroError::UnsupportedFile(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Dataset::load(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, GreenbroError::Io { .. }));
    }
}
