use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::models::channel_state::{ChannelState, IqCorrection};
use crate::models::error::SourceError;
use crate::session::channel_map::ChannelRoute;

/// Snapshot of an aggregate source: what is connected where, and the
/// settings each device channel was last given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReport {
    pub version: String,
    pub args: String,
    pub degraded: bool,
    pub failure: Option<String>,
    pub declared_channels: usize,
    pub sample_rate: f64,
    pub devices: Vec<DeviceReport>,
    pub channels: Vec<ChannelReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceReport {
    pub name: String,
    pub channels: usize,
}

/// One output channel. Synthetic channels have no route and no settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelReport {
    pub channel: usize,
    pub route: Option<ChannelRoute>,
    pub synthetic: bool,
    pub settings: Option<ChannelState>,
    pub iq_correction: IqCorrection,
}

/// Sidecar path for a capture: `{capture_path}.source.json`.
pub fn report_path(capture_path: &Path) -> PathBuf {
    capture_path.with_extension("source.json")
}

/// Write the report as a JSON sidecar next to a capture file.
pub fn write_report(report: &SourceReport, capture_path: &Path) -> Result<(), SourceError> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| SourceError::Io(format!("failed to serialize report: {}", e)))?;
    fs::write(report_path(capture_path), json)
        .map_err(|e| SourceError::Io(format!("failed to write report: {}", e)))?;
    Ok(())
}

/// Read the JSON sidecar of a capture file.
pub fn read_report(capture_path: &Path) -> Result<SourceReport, SourceError> {
    let json = fs::read_to_string(report_path(capture_path))
        .map_err(|e| SourceError::Io(format!("failed to read report: {}", e)))?;
    let report: SourceReport =
        serde_json::from_str(&json).map_err(|e| SourceError::Io(format!("failed to parse report: {}", e)))?;
    Ok(report)
}
