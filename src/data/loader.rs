//! Event table loading
//!
//! Finds the cleaned CSV among candidate directories and reads it into an
//! [`EventTable`], negotiating the column schema once up front.

use super::schema::{Column, ColumnSet, EventRecord, EventTable};
use crate::error::{Error, Result};
use csv::ReaderBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Cells a dataframe reader would treat as missing
const NA_LITERALS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Preferred file name inside a data directory
const GNN_READY_FILE: &str = "events_gnn_ready.csv";

/// Name fragment of dated cleaner outputs
const CLEANED_FRAGMENT: &str = "events_cleaned_";

/// Prioritized search over candidate data directories
#[derive(Debug, Clone)]
pub struct DatasetLocator {
    candidates: Vec<PathBuf>,
}

impl DatasetLocator {
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    /// Single explicit directory, no search
    pub fn explicit(dir: impl Into<PathBuf>) -> Self {
        Self {
            candidates: vec![dir.into()],
        }
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// First candidate directory that holds a CSV, and the chosen file in it
    pub fn locate(&self) -> Result<PathBuf> {
        for dir in &self.candidates {
            if !dir.is_dir() {
                debug!("Candidate {:?} does not exist", dir);
                continue;
            }
            match pick_csv(dir) {
                Ok(Some(file)) => {
                    info!("Using data directory {:?}", dir);
                    return Ok(file);
                }
                Ok(None) => debug!("Candidate {:?} holds no CSV files", dir),
                Err(e) => warn!("Cannot read candidate {:?}: {}", dir, e),
            }
        }

        Err(Error::MissingInput {
            attempted: self.candidates.clone(),
        })
    }
}

/// Choose the event CSV inside `dir`
///
/// `events_gnn_ready.csv` wins, then files named `events_cleaned_*`, then any
/// CSV; within a tier the most recently modified file is taken.
pub fn pick_csv(dir: &Path) -> Result<Option<PathBuf>> {
    let mut best: Option<(u8, SystemTime, PathBuf)> = None;

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if !is_csv || !path.is_file() {
            continue;
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tier = if name == GNN_READY_FILE {
            0
        } else if name.contains(CLEANED_FRAGMENT) {
            1
        } else {
            2
        };
        let modified = fs::metadata(&path)
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let better = match &best {
            None => true,
            Some((best_tier, best_time, _)) => {
                tier < *best_tier || (tier == *best_tier && modified > *best_time)
            }
        };
        if better {
            best = Some((tier, modified, path));
        }
    }

    Ok(best.map(|(_, _, path)| path))
}

/// CSV reader for cleaned event tables
pub struct DataLoader;

impl DataLoader {
    /// Read an event table from a CSV file
    pub fn load_events<P: AsRef<Path>>(path: P) -> Result<EventTable> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let text = decode(&bytes);

        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut columns = ColumnSet::empty();
        let mut positions: Vec<(Column, usize)> = Vec::new();
        for (idx, header) in headers.iter().enumerate() {
            if let Some(column) = Column::from_header(header) {
                if !columns.has(column) {
                    columns.insert(column);
                    positions.push((column, idx));
                }
            }
        }

        for required in [Column::Title, Column::Description] {
            if !columns.has(required) {
                warn!("Column '{}' missing, using empty strings", required);
            }
        }

        let mut records = Vec::new();
        for (row_idx, row) in reader.records().enumerate() {
            let row = row?;
            let mut record = EventRecord {
                node_id: row_idx,
                ..Default::default()
            };

            for &(column, idx) in &positions {
                let value = row.get(idx).and_then(present);
                match column {
                    Column::NodeId => {
                        if let Some(id) = value.and_then(parse_node_id) {
                            record.node_id = id;
                        }
                    }
                    Column::Title => record.title = value.unwrap_or_default().to_string(),
                    Column::Description => {
                        record.description = value.unwrap_or_default().to_string()
                    }
                    Column::Category => record.category = value.map(str::to_string),
                    Column::Organizer => record.organizer = value.map(str::to_string),
                    Column::Location => record.location = value.map(str::to_string),
                    Column::Source => record.source = value.map(str::to_string),
                    Column::IsFree => record.is_free = value.and_then(parse_flag),
                    Column::DateStart => record.date_start = value.map(str::to_string),
                }
            }
            records.push(record);
        }

        if records.is_empty() {
            return Err(Error::EmptyDataset(path.to_path_buf()));
        }

        info!("Loaded {} events from {:?}", records.len(), path);
        debug!("Columns: {:?}", headers);

        Ok(EventTable::from_parts(records, columns, headers, path.to_path_buf()))
    }
}

/// UTF-8 (BOM stripped) with a Latin-1 fallback
fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            warn!("Input is not valid UTF-8, decoding as Latin-1");
            bytes.iter().map(|&b| b as char).collect()
        }
    }
}

/// `None` for missing-value literals
fn present(cell: &str) -> Option<&str> {
    if NA_LITERALS.contains(&cell) || cell.trim().is_empty() {
        None
    } else {
        Some(cell)
    }
}

fn parse_node_id(value: &str) -> Option<usize> {
    let value = value.trim();
    value
        .parse::<usize>()
        .ok()
        .or_else(|| value.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v as usize))
}

/// Free-flag cell to bool; unknown spellings are treated as missing
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "y" | "free" | "да" => Some(true),
        "false" | "no" | "n" | "paid" | "не" => Some(false),
        other => other.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v != 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write(path: &Path, content: &[u8]) {
        let mut file = fs::File::create(path).unwrap();
        file.write_all(content).unwrap();
    }

    #[test]
    fn test_load_events_with_missing_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.csv");
        write(
            &path,
            "title,description,organizer,is_free,date_start\n\
             Jazz,Live jazz,MKC,True,2024-05-01\n\
             Film,,nan,0,TBD\n"
                .as_bytes(),
        );

        let table = DataLoader::load_events(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.has(Column::Organizer));
        assert!(!table.has(Column::Category));

        let records = table.records();
        assert_eq!(records[0].organizer.as_deref(), Some("MKC"));
        assert_eq!(records[0].is_free, Some(true));
        assert_eq!(records[1].description, "");
        assert_eq!(records[1].organizer, None);
        assert_eq!(records[1].is_free, Some(false));
        assert_eq!(records[1].node_id, 1);
    }

    #[test]
    fn test_load_strips_bom_and_falls_back_to_latin1() {
        let dir = tempdir().unwrap();

        let bom = dir.path().join("bom.csv");
        write(&bom, b"\xEF\xBB\xBFtitle,description\nA,B\n");
        let table = DataLoader::load_events(&bom).unwrap();
        assert!(table.has(Column::Title));

        let latin = dir.path().join("latin.csv");
        write(&latin, b"title,description\nCaf\xE9,x\n");
        let table = DataLoader::load_events(&latin).unwrap();
        assert_eq!(table.records()[0].title, "Café");
    }

    #[test]
    fn test_empty_table_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        write(&path, b"title,description\n");
        assert!(matches!(
            DataLoader::load_events(&path),
            Err(Error::EmptyDataset(_))
        ));
    }

    #[test]
    fn test_pick_csv_priority() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("other.csv"), b"title\nx\n");
        write(&dir.path().join("events_cleaned_2024.csv"), b"title\nx\n");
        let picked = pick_csv(dir.path()).unwrap().unwrap();
        assert!(picked.ends_with("events_cleaned_2024.csv"));

        write(&dir.path().join(GNN_READY_FILE), b"title\nx\n");
        let picked = pick_csv(dir.path()).unwrap().unwrap();
        assert!(picked.ends_with(GNN_READY_FILE));
    }

    #[test]
    fn test_locator_reports_attempted_paths() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        let empty = dir.path().join("empty");
        fs::create_dir(&empty).unwrap();

        let locator = DatasetLocator::new(vec![missing.clone(), empty.clone()]);
        match locator.locate() {
            Err(Error::MissingInput { attempted }) => {
                assert_eq!(attempted, vec![missing, empty]);
            }
            other => panic!("expected MissingInput, got {:?}", other),
        }
    }

    #[test]
    fn test_locator_skips_to_first_directory_with_csv() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        fs::create_dir(&first).unwrap();
        fs::create_dir(&second).unwrap();
        write(&second.join("events.csv"), b"title\nx\n");

        let found = DatasetLocator::new(vec![first, second.clone()]).locate().unwrap();
        assert_eq!(found, second.join("events.csv"));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("True"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("1.0"), Some(true));
        assert_eq!(parse_flag("maybe"), None);
    }
}
