//! CSV loading for labelled and unlabelled feature files
//!
//! The first line is a header. Every other non-empty line holds comma
//! separated numbers; in labelled files the last column is the 0/1 label.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::data::dataset::ClassificationDataset;
use crate::{ClassifierError, Result};

/// Load a labelled dataset (last column is the label)
pub fn load_labelled(path: impl AsRef<Path>) -> Result<ClassificationDataset> {
    let rows = read_rows(path.as_ref())?;

    let mut features = Vec::with_capacity(rows.len());
    let mut labels = Vec::with_capacity(rows.len());
    for (line, mut row) in rows {
        let label = row.pop().ok_or_else(|| {
            ClassifierError::Parse(format!("line {}: expected at least one column", line))
        })?;
        features.push(row);
        labels.push(label);
    }

    ClassificationDataset::new(features, labels)
}

/// Load feature rows without labels
pub fn load_features(path: impl AsRef<Path>) -> Result<Vec<Vec<f32>>> {
    Ok(read_rows(path.as_ref())?
        .into_iter()
        .map(|(_, row)| row)
        .collect())
}

fn read_rows(path: &Path) -> Result<Vec<(usize, Vec<f32>)>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut rows = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        if i == 0 {
            continue;
        } // Skip header
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row = line
            .split(',')
            .map(|s| {
                s.trim().parse::<f32>().map_err(|e| {
                    ClassifierError::Parse(format!("line {}: '{}': {}", i + 1, s.trim(), e))
                })
            })
            .collect::<Result<Vec<f32>>>()?;
        rows.push((i + 1, row));
    }

    log::debug!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}
