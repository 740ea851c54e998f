use crate::model::chart::ChartData;
use anyhow::{Context, Result, anyhow};
use log::info;
use std::fs;
use std::path::Path;

/// Serializes `data` as pretty-printed JSON, the chart save file format.
pub fn export_chart(data: &ChartData) -> Result<String> {
    serde_json::to_string_pretty(data).context("Failed to serialize chart data")
}

pub fn parse_chart(text: &str) -> Result<ChartData> {
    serde_json::from_str(text).map_err(|e| anyhow!("Failed to parse chart data: {}", e))
}

pub fn load_chart_file<P: AsRef<Path>>(path: P) -> Result<ChartData> {
    let text = fs::read_to_string(path.as_ref()).map_err(|e| {
        anyhow!(
            "Failed to read chart file {}: {}",
            path.as_ref().display(),
            e
        )
    })?;

    let chart = parse_chart(&text)
        .with_context(|| format!("Invalid chart file {}", path.as_ref().display()))?;

    info!(
        "Loaded chart '{}' from {} with {} timing points and {} notes..!",
        chart.song_info.title,
        path.as_ref().display(),
        chart.timing_points.len(),
        chart.notes.len()
    );

    Ok(chart)
}

pub fn save_chart_file<P: AsRef<Path>>(path: P, data: &ChartData) -> Result<()> {
    let text = export_chart(data)?;

    fs::write(path.as_ref(), text).map_err(|e| {
        anyhow!(
            "Failed to write chart file {}: {}",
            path.as_ref().display(),
            e
        )
    })?;

    info!("Saved chart to {}..!", path.as_ref().display());
    Ok(())
}
