use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::data::memory_table::MemoryTable;

/// Load a CSV file with a header row into a [`MemoryTable`].
pub fn load_csv(path: &Path) -> Result<MemoryTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("Failed to read CSV header from {}", path.display()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut table = MemoryTable::new(headers);
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Bad CSV record at row {}", line + 1))?;
        table.add_row(record.iter().map(String::from).collect())?;
    }

    info!(target: "data", "Loaded {} rows from {}", table.row_count(), path.display());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_csv_pads_short_rows() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "id, status").unwrap();
        writeln!(file, "1,open").unwrap();
        writeln!(file, "2").unwrap();

        let table = load_csv(file.path()).unwrap();
        assert_eq!(table.column_names(), &["id".to_string(), "status".to_string()]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.visible_rows()[1], &["2".to_string(), String::new()]);
    }

    #[test]
    fn test_missing_file() {
        assert!(load_csv(Path::new("/definitely/not/here.csv")).is_err());
    }
}
