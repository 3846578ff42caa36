//! Prediction commands: classify, systolic, diastolic

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::{Map, Number, Value};
use std::path::PathBuf;

use crate::client::{ApiClient, BpPrediction};
use crate::output::{
    color_label, format_mmhg, format_probability, print_json, print_table, FieldRow, OutputFormat,
};

/// Sample input shared by the prediction commands
#[derive(Args, Debug, Clone)]
pub struct SampleArgs {
    /// JSON file holding one request object
    #[arg(long, short)]
    pub input: Option<PathBuf>,

    /// Set a field, e.g. --set Age=45 (repeatable, overrides the file)
    #[arg(long = "set", value_name = "FIELD=VALUE")]
    pub fields: Vec<String>,

    /// Values are raw measurements; the gateway scales them
    #[arg(long)]
    pub raw: bool,
}

impl SampleArgs {
    /// Build the request body from the input file and `--set` flags
    pub fn to_request(&self) -> Result<Value> {
        let mut body = match &self.input {
            Some(path) => read_object(path)?,
            None => Map::new(),
        };

        for field in &self.fields {
            let (name, value) = parse_field(field)?;
            body.insert(name, value);
        }

        if self.raw {
            body.insert("is_raw".to_string(), Value::Bool(true));
        }

        if body.is_empty() {
            bail!("No sample given; use --input <file> or --set FIELD=VALUE");
        }

        Ok(Value::Object(body))
    }
}

fn read_object(path: &PathBuf) -> Result<Map<String, Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    match serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?
    {
        Value::Object(map) => Ok(map),
        _ => bail!("{} must contain a JSON object", path.display()),
    }
}

/// Parse `FIELD=VALUE`; integers stay integers so 0/1 flags deserialize
fn parse_field(field: &str) -> Result<(String, Value)> {
    let (name, raw) = field
        .split_once('=')
        .with_context(|| format!("Expected FIELD=VALUE, got '{}'", field))?;
    let name = name.trim();
    let raw = raw.trim();
    if name.is_empty() {
        bail!("Empty field name in '{}'", field);
    }

    let value = if let Ok(i) = raw.parse::<i64>() {
        Value::Number(i.into())
    } else if let Ok(b) = raw.parse::<bool>() {
        Value::Bool(b)
    } else {
        let f: f64 = raw
            .parse()
            .with_context(|| format!("{} is not a number: '{}'", name, raw))?;
        Value::Number(Number::from_f64(f).with_context(|| format!("{} must be finite", name))?)
    };

    Ok((name.to_string(), value))
}

/// Classify hypertension stage
pub async fn classify(client: &ApiClient, args: &SampleArgs, format: OutputFormat) -> Result<()> {
    let result = client.classify(&args.to_request()?).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            println!("{}", "Hypertension Classification".bold());
            print_table(&[
                FieldRow::new("Class", result.prediction),
                FieldRow::new("Label", color_label(result.prediction, &result.label)),
                FieldRow::new("Probability", format_probability(result.probability)),
                FieldRow::new("Model", &result.model_type),
            ]);
        }
    }

    Ok(())
}

/// Predict systolic BP
pub async fn systolic(client: &ApiClient, args: &SampleArgs, format: OutputFormat) -> Result<()> {
    let result = client.predict_systolic(&args.to_request()?).await?;
    print_bp("Systolic BP Prediction", &result, format)
}

/// Predict diastolic BP
pub async fn diastolic(client: &ApiClient, args: &SampleArgs, format: OutputFormat) -> Result<()> {
    let result = client.predict_diastolic(&args.to_request()?).await?;
    print_bp("Diastolic BP Prediction", &result, format)
}

fn print_bp(title: &str, result: &BpPrediction, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(result)?,
        OutputFormat::Table => {
            println!("{}", title.bold());
            print_table(&[
                FieldRow::new("Predicted", format_mmhg(result.predicted_value_mmhg).bold()),
                FieldRow::new(
                    "95% interval",
                    format!(
                        "{} - {}",
                        format_mmhg(result.confidence_interval_lower),
                        format_mmhg(result.confidence_interval_upper)
                    ),
                ),
                FieldRow::new("Std dev", format_mmhg(result.prediction_std_mmhg)),
                FieldRow::new("Normalized", format!("{:.4}", result.predicted_normalized)),
                FieldRow::new("Input", &result.input_type),
                FieldRow::new("Model", &result.model_type),
            ]);
        }
    }
    Ok(())
}
