//! Data loading utilities

use crate::error::{AutisenseError, Result};
use crate::preprocessing::{normalize_labels, FieldSchema, FieldValue, RawRecord};
use ndarray::{Array1, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Labelled questionnaire rows ready for splitting
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    records: Vec<RawRecord>,
    labels: Array1<f64>,
}

impl Dataset {
    /// Pair records with already-normalized labels
    pub fn new(records: Vec<RawRecord>, labels: Array1<f64>) -> Result<Self> {
        if records.len() != labels.len() {
            return Err(AutisenseError::ShapeError {
                expected: format!("{} labels", records.len()),
                actual: format!("{} labels", labels.len()),
            });
        }
        if let Some(bad) = labels.iter().find(|&&v| v != 0.0 && v != 1.0) {
            return Err(AutisenseError::InvalidLabel {
                value: bad.to_string(),
            });
        }
        Ok(Self { records, labels })
    }

    /// Pair records with raw label values ("Yes"/"No", 1/0)
    pub fn from_raw_labels(records: Vec<RawRecord>, labels: &[FieldValue]) -> Result<Self> {
        Self::new(records, normalize_labels(labels)?)
    }

    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    pub fn labels(&self) -> &Array1<f64> {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows at the given positions, in that order
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(AutisenseError::InvalidInput(format!(
                "row index {} out of range for {} rows",
                bad,
                self.len()
            )));
        }
        Ok(Self {
            records: indices.iter().map(|&i| self.records[i].clone()).collect(),
            labels: self.labels.select(Axis(0), indices),
        })
    }

    /// Number of rows per label (0.0 then 1.0)
    pub fn class_counts(&self) -> (usize, usize) {
        let positives = self.labels.iter().filter(|&&v| v == 1.0).count();
        (self.len() - positives, positives)
    }

    /// Row count, class balance and per-field missing counts
    pub fn summary(&self, schema: &FieldSchema) -> DatasetSummary {
        let (negatives, positives) = self.class_counts();
        let missing_by_field = schema
            .feature_fields()
            .map(|field| {
                let missing = self
                    .records
                    .iter()
                    .filter(|r| r.get(field).map_or(true, FieldValue::is_missing))
                    .count();
                (field.to_string(), missing)
            })
            .collect();

        DatasetSummary {
            n_rows: self.len(),
            n_features: schema.n_features(),
            positives,
            negatives,
            missing_by_field,
        }
    }
}

/// Dataset overview printed by the `info` command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub n_rows: usize,
    pub n_features: usize,
    pub positives: usize,
    pub negatives: usize,
    pub missing_by_field: BTreeMap<String, usize>,
}

/// Reads screening CSV files into a [`Dataset`]
#[derive(Debug, Clone)]
pub struct DataLoader {
    schema: FieldSchema,
    /// Rows used by polars to infer column types
    infer_schema_length: usize,
}

impl DataLoader {
    pub fn new(schema: FieldSchema) -> Self {
        Self {
            schema,
            infer_schema_length: 1000,
        }
    }

    /// Set the number of rows used for type inference
    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows;
        self
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    /// Load a labelled CSV file
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<Dataset> {
        let start = Instant::now();
        let df = self.read_frame(path.as_ref())?;
        let dataset = self.from_dataframe(&df)?;
        info!(
            path = %path.as_ref().display(),
            rows = dataset.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded dataset"
        );
        Ok(dataset)
    }

    /// Load an unlabelled CSV file of records to score
    pub fn load_records(&self, path: impl AsRef<Path>) -> Result<Vec<RawRecord>> {
        let df = self.read_frame(path.as_ref())?;
        self.records_from_dataframe(&df)
    }

    fn read_frame(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path).map_err(|e| {
            AutisenseError::DataError(format!("cannot open {}: {}", path.display(), e))
        })?;

        let mut df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .into_reader_with_file_handle(file)
            .finish()?;

        // Source headers carry stray whitespace ("Class/ASD Traits ")
        let trimmed: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| name.trim().to_string())
            .collect();
        df.set_column_names(trimmed)?;
        Ok(df)
    }

    /// Convert a frame with the label column into a dataset. A configured id
    /// column must be present just like the feature columns.
    pub fn from_dataframe(&self, df: &DataFrame) -> Result<Dataset> {
        if let Some(id) = self.schema.id_field.as_deref() {
            if df.column(id).is_err() {
                return Err(AutisenseError::FeatureNotFound(id.to_string()));
            }
        }
        let records = self.records_from_dataframe(df)?;
        let labels = column_values(df, &self.schema.label_field)?;
        Dataset::from_raw_labels(records, &labels)
    }

    /// Convert the declared feature columns into records; other columns are dropped
    pub fn records_from_dataframe(&self, df: &DataFrame) -> Result<Vec<RawRecord>> {
        let mut records = vec![RawRecord::new(); df.height()];
        for field in self.schema.feature_fields() {
            for (record, value) in records.iter_mut().zip(column_values(df, field)?) {
                record.insert(field, value);
            }
        }

        let expected = self.schema.expected_fields();
        let ignored: Vec<&str> = df
            .get_column_names()
            .into_iter()
            .map(|n| n.as_str())
            .filter(|n| !expected.contains(*n) && *n != self.schema.label_field)
            .collect();
        if !ignored.is_empty() {
            debug!(?ignored, "Dropped non-feature columns");
        }

        Ok(records)
    }
}

/// Column values as [`FieldValue`]s; nulls become `Missing`
fn column_values(df: &DataFrame, name: &str) -> Result<Vec<FieldValue>> {
    let column = df
        .column(name)
        .map_err(|_| AutisenseError::FeatureNotFound(name.to_string()))?;
    let series = column.as_materialized_series();

    match series.dtype() {
        DataType::String => Ok(series
            .str()?
            .into_iter()
            .map(|v| v.map(|s| FieldValue::Text(s.to_string())).unwrap_or(FieldValue::Missing))
            .collect()),
        _ => {
            let numeric = series.cast(&DataType::Float64).map_err(|e| {
                AutisenseError::DataError(format!("column '{}' is not numeric or text: {}", name, e))
            })?;
            Ok(numeric
                .f64()?
                .into_iter()
                .map(|v| v.map(FieldValue::Number).unwrap_or(FieldValue::Missing))
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CSV: &str = "\
Case_No,A1,A2,A3,A4,A5,A6,A7,A8,A9,A10,Age_Mons,Qchat-10-Score,Sex,Ethnicity,Jaundice,Family_mem_with_ASD,Who completed the test,Class/ASD Traits
1,0,0,0,0,0,0,1,1,0,1,28,3,f,middle eastern,yes,no,family member,No
2,1,1,0,0,0,1,1,0,0,0,36,4,m,White European,yes,no,family member,Yes
3,1,0,0,0,0,0,1,1,0,1,,4,m,middle eastern,yes,no,family member,Yes
4,1,1,1,1,1,1,1,1,1,1,24,10,m,Hispanic,no,no,,Yes
";

    fn write_csv() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CSV.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_csv() {
        let file = write_csv();
        let dataset = DataLoader::new(FieldSchema::screening()).load_csv(file.path()).unwrap();

        assert_eq!(dataset.len(), 4);
        assert_eq!(dataset.labels(), &ndarray::array![0.0, 1.0, 1.0, 1.0]);
        assert_eq!(dataset.class_counts(), (1, 3));

        let first = &dataset.records()[0];
        assert_eq!(first.len(), 16);
        assert_eq!(first.get("Age_Mons"), Some(&FieldValue::Number(28.0)));
        assert_eq!(first.get("Sex"), Some(&FieldValue::Text("f".to_string())));
        assert!(first.get("Case_No").is_none());
        assert!(first.get("Qchat-10-Score").is_none());
    }

    #[test]
    fn test_nulls_become_missing() {
        let file = write_csv();
        let dataset = DataLoader::new(FieldSchema::screening()).load_csv(file.path()).unwrap();

        assert_eq!(dataset.records()[2].get("Age_Mons"), Some(&FieldValue::Missing));
        let summary = dataset.summary(&FieldSchema::screening());
        assert_eq!(summary.missing_by_field["Age_Mons"], 1);
        assert_eq!(summary.missing_by_field["Who completed the test"], 1);
        assert_eq!(summary.positives, 3);
    }

    #[test]
    fn test_missing_declared_column() {
        let df = df!("A1" => [1.0, 0.0], "label" => ["Yes", "No"]).unwrap();
        let schema = FieldSchema::new(["A1", "A2"], Vec::<String>::new());
        let err = DataLoader::new(schema).from_dataframe(&df).unwrap_err();
        assert!(matches!(err, AutisenseError::FeatureNotFound(f) if f == "A2"));
    }

    #[test]
    fn test_missing_id_column() {
        let df = df!("A1" => [1.0, 0.0], "label" => ["Yes", "No"]).unwrap();
        let schema = FieldSchema::new(["A1"], Vec::<String>::new()).with_id_field("Case_No");
        let err = DataLoader::new(schema.clone()).from_dataframe(&df).unwrap_err();
        assert!(matches!(err, AutisenseError::FeatureNotFound(f) if f == "Case_No"));

        // Scoring input is not held to the id column
        assert_eq!(DataLoader::new(schema).records_from_dataframe(&df).unwrap().len(), 2);
    }

    #[test]
    fn test_bad_label() {
        let df = df!("A1" => [1.0, 0.0], "label" => ["Yes", "Maybe"]).unwrap();
        let schema = FieldSchema::new(["A1"], Vec::<String>::new());
        let err = DataLoader::new(schema).from_dataframe(&df).unwrap_err();
        assert!(matches!(err, AutisenseError::InvalidLabel { .. }));
    }

    #[test]
    fn test_select_rows() {
        let records = vec![
            RawRecord::new().with_number("A1", 0.0),
            RawRecord::new().with_number("A1", 1.0),
        ];
        let dataset = Dataset::new(records, ndarray::array![0.0, 1.0]).unwrap();
        let picked = dataset.select(&[1]).unwrap();
        assert_eq!(picked.labels(), &ndarray::array![1.0]);
        assert!(dataset.select(&[2]).is_err());
    }
}
