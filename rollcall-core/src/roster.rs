//! Roster loading.
//!
//! A roster is a CSV file with a header row containing at least an `id`
//! column (integer) and a `name` column. Other columns are ignored. Entries
//! keep the order they appear in the file.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::{info, warn};
use serde::Deserialize;

use crate::error::{Result, RollcallError};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RosterEntry {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct Roster {
    entries: Vec<RosterEntry>,
}

impl Roster {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| RollcallError::RosterIo {
            path: path.to_path_buf(),
            source,
        })?;
        let roster = Self::from_reader(file)?;
        info!("Loaded {} roster entries from {:?}", roster.len(), path);
        Ok(roster)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        for column in ["id", "name"] {
            if !headers.iter().any(|h| h == column) {
                return Err(RollcallError::MissingColumn(column));
            }
        }

        let mut entries = Vec::new();
        for record in csv_reader.deserialize::<RosterEntry>() {
            entries.push(record?);
        }

        let roster = Self { entries };
        for id in roster.duplicate_ids() {
            warn!("Roster id {} appears more than once; the first entry wins", id);
        }
        Ok(roster)
    }

    /// Name for a recognizer label, or `None` when the label is not on the roster.
    pub fn lookup(&self, id: i32) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.name.as_str())
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn duplicate_ids(&self) -> Vec<i32> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for entry in &self.entries {
            if !seen.insert(entry.id) && !duplicates.contains(&entry.id) {
                duplicates.push(entry.id);
            }
        }
        duplicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Roster> {
        Roster::from_reader(text.as_bytes())
    }

    #[test]
    fn test_names_keep_file_order() {
        let roster = parse("id,name\n7,Zoe\n2,Adam\n5,Maya\n").unwrap();
        assert_eq!(roster.len(), 3);
        let names: Vec<&str> = roster.names().collect();
        assert_eq!(names, vec!["Zoe", "Adam", "Maya"]);
    }

    #[test]
    fn test_extra_columns_are_ignored() {
        let roster = parse("name,email,id\nAda,ada@example.org,1\nLin,lin@example.org,2\n").unwrap();
        assert_eq!(roster.lookup(2), Some("Lin"));
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn test_lookup_unknown_label() {
        let roster = parse("id,name\n1,Ada\n").unwrap();
        assert_eq!(roster.lookup(1), Some("Ada"));
        assert_eq!(roster.lookup(-1), None);
        assert_eq!(roster.lookup(42), None);
    }

    #[test]
    fn test_missing_name_column() {
        let err = parse("id,label\n1,Ada\n").unwrap_err();
        assert!(matches!(err, RollcallError::MissingColumn("name")));
    }

    #[test]
    fn test_missing_id_column() {
        let err = parse("name\nAda\n").unwrap_err();
        assert!(matches!(err, RollcallError::MissingColumn("id")));
    }

    #[test]
    fn test_non_numeric_id_fails() {
        let err = parse("id,name\nabc,Ada\n").unwrap_err();
        assert!(matches!(err, RollcallError::RosterParse(_)));
    }

    #[test]
    fn test_whitespace_trimmed() {
        let roster = parse("id , name\n 3 ,  Grace Hopper \n").unwrap();
        assert_eq!(roster.lookup(3), Some("Grace Hopper"));
    }

    #[test]
    fn test_duplicate_ids_first_wins() {
        let roster = parse("id,name\n1,Ada\n1,Alan\n2,Lin\n").unwrap();
        assert_eq!(roster.lookup(1), Some("Ada"));
        assert_eq!(roster.duplicate_ids(), vec![1]);
    }

    #[test]
    fn test_header_only_is_empty() {
        let roster = parse("id,name\n").unwrap();
        assert!(roster.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Roster::load(Path::new("/nonexistent/rollcall/roster.csv")).unwrap_err();
        assert!(matches!(err, RollcallError::RosterIo { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("rollcall-roster-{}.csv", std::process::id()));
        std::fs::write(&path, "id,name\n10,Ada\n11,Lin\n").unwrap();
        let roster = Roster::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(roster.names().collect::<Vec<_>>(), vec!["Ada", "Lin"]);
    }
}
