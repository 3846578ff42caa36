//! Gateway status command

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{color_status, print_json, print_table, print_warning, OutputFormat};

#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Show gateway and per-model status
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status = client.status().await?;

    match format {
        OutputFormat::Json => print_json(&status)?,
        OutputFormat::Table => {
            println!("{} {}", "Gateway:".bold(), color_status(&status.status));
            println!("{}", status.message.dimmed());
            println!();

            let rows: Vec<ModelRow> = status
                .models
                .iter()
                .map(|(model, state)| ModelRow {
                    model: model.clone(),
                    status: if state.starts_with("available") {
                        state.green().to_string()
                    } else {
                        state.red().to_string()
                    },
                })
                .collect();
            print_table(&rows);

            if status.status != "healthy" {
                print_warning("Some models are unavailable; their endpoints answer 503");
            }
        }
    }

    Ok(())
}
