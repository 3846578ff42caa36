//! Offline scaler fitting and inspection

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use gateway_lib::{
    preprocessing::{ModelSchema, KNN_DIASTOLIC, KNN_SYSTOLIC, RANDOM_FOREST},
    FeatureVector, Scaler,
};
use std::path::Path;
use tabled::Tabled;

use crate::output::{print_info, print_json, print_success, print_table, OutputFormat};

/// Model whose numeric features the scaler covers
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ScalerModel {
    RandomForest,
    KnnSystolic,
    KnnDiastolic,
}

impl ScalerModel {
    pub fn schema(&self) -> &'static ModelSchema {
        match self {
            ScalerModel::RandomForest => &RANDOM_FOREST,
            ScalerModel::KnnSystolic => &KNN_SYSTOLIC,
            ScalerModel::KnnDiastolic => &KNN_DIASTOLIC,
        }
    }
}

#[derive(Tabled)]
struct ScalerRow {
    #[tabled(rename = "Feature")]
    feature: String,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "Scale")]
    scale: String,
}

/// Read training records: a JSON array of objects with numeric fields
fn read_records(path: &Path) -> Result<Vec<FeatureVector>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let records: Vec<FeatureVector> = serde_json::from_str(&content)
        .with_context(|| format!("{} must be a JSON array of numeric records", path.display()))?;
    if records.is_empty() {
        bail!("{} holds no records", path.display());
    }
    Ok(records)
}

/// Fit a scaler over the model's numeric features and write it as JSON
pub fn fit(input: &Path, model: ScalerModel, output: &Path) -> Result<Scaler> {
    let records = read_records(input)?;
    let schema = model.schema();

    let scaler = Scaler::fit(&records, schema.scaled_features)
        .with_context(|| format!("Failed to fit scaler for {}", schema.name))?;
    scaler
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    print_success(&format!(
        "Fitted {} scaler on {} records -> {}",
        schema.name,
        records.len(),
        output.display()
    ));
    Ok(scaler)
}

/// Print the per-feature parameters of a scaler file
pub fn inspect(path: &Path, format: OutputFormat) -> Result<()> {
    let scaler = Scaler::load(path).with_context(|| format!("Failed to load {}", path.display()))?;

    match format {
        OutputFormat::Json => print_json(&scaler)?,
        OutputFormat::Table => {
            print_info(&format!(
                "{} features, fitted on {} samples",
                scaler.len(),
                scaler.n_samples_seen()
            ));
            let rows: Vec<ScalerRow> = scaler
                .features()
                .iter()
                .zip(scaler.mean().iter().zip(scaler.scale()))
                .map(|(feature, (mean, scale))| ScalerRow {
                    feature: feature.clone(),
                    mean: format!("{:.6}", mean),
                    scale: format!("{:.6}", scale),
                })
                .collect();
            print_table(&rows);
        }
    }

    Ok(())
}
