//! Status and position output formatting

use crate::core::{PermissionState, Position, PositionError};
use crate::display::PositionHistory;
use crate::tracker::PositionTracker;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON document
    Json,
    /// One CSV row per position
    Csv,
}

/// Snapshot of everything the display shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub supported: bool,
    pub permission: Option<PermissionState>,
    pub tracking: bool,
    pub positions: Vec<Position>,
    pub error: Option<PositionError>,
}

impl StatusReport {
    pub fn capture(tracker: &PositionTracker, history: &PositionHistory) -> Self {
        Self {
            supported: tracker.is_supported(),
            permission: tracker.permission_state(),
            tracking: tracker.is_tracking(),
            positions: history.to_vec(),
            error: tracker.position_error(),
        }
    }
}

/// Human-readable text formatter
pub struct TextFormatter {
    /// Decimal places for coordinates
    pub precision: usize,
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self { precision: 6 }
    }
}

impl TextFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    pub fn format_position(&self, position: &Position) -> String {
        let coords = &position.coords;
        let mut line = format!(
            "[{}] lat {:.prec$} lon {:.prec$} ±{:.1}m",
            position.timestamp_ms,
            coords.latitude,
            coords.longitude,
            coords.accuracy,
            prec = self.precision
        );
        if let Some(altitude) = coords.altitude {
            let _ = write!(line, " alt {:.1}m", altitude);
        }
        if let Some(heading) = coords.heading {
            let _ = write!(line, " hdg {:.0}°", heading);
        }
        if let Some(speed) = coords.speed {
            let _ = write!(line, " spd {:.1}m/s", speed);
        }
        line
    }

    pub fn format_error(&self, error: &PositionError) -> String {
        format!("{} (code {}): {}", error.kind, error.kind.code(), error.message)
    }

    /// Support flag and permission, then the last error or else the history
    pub fn format_report(&self, report: &StatusReport) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Geolocation API supported: {}", report.supported);
        let permission = report
            .permission
            .map(|permission| permission.to_string())
            .unwrap_or_else(|| "?".to_string());
        let _ = writeln!(out, "Geolocation API permission: {}", permission);

        match &report.error {
            Some(error) => {
                let _ = writeln!(out, "Position Error");
                let _ = writeln!(out, "  {}", self.format_error(error));
            }
            None => {
                let _ = writeln!(out, "Position History");
                for position in &report.positions {
                    let _ = writeln!(out, "  {}", self.format_position(position));
                }
            }
        }
        out
    }
}

/// JSON formatter
#[derive(Default)]
pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    pub fn format_position(&self, position: &Position) -> Result<String, serde_json::Error> {
        self.to_json(position)
    }

    pub fn format_report(&self, report: &StatusReport) -> Result<String, serde_json::Error> {
        self.to_json(report)
    }

    fn to_json<T: Serialize>(&self, value: &T) -> Result<String, serde_json::Error> {
        if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
    }
}

/// CSV formatter for position logging
pub struct CsvFormatter {
    /// Include header row
    pub include_header: bool,
}

impl Default for CsvFormatter {
    fn default() -> Self {
        Self { include_header: true }
    }
}

impl CsvFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(&self) -> String {
        "timestamp_ms,latitude,longitude,accuracy,altitude,heading,speed".to_string()
    }

    pub fn format_position(&self, position: &Position) -> String {
        let optional = |value: Option<f64>| value.map(|v| format!("{:.2}", v)).unwrap_or_default();
        let coords = &position.coords;
        format!(
            "{},{:.6},{:.6},{:.1},{},{},{}",
            position.timestamp_ms,
            coords.latitude,
            coords.longitude,
            coords.accuracy,
            optional(coords.altitude),
            optional(coords.heading),
            optional(coords.speed)
        )
    }

    /// Header (if enabled) followed by one row per position
    pub fn format_positions<'a>(
        &self,
        positions: impl IntoIterator<Item = &'a Position>,
    ) -> String {
        let mut rows = Vec::new();
        if self.include_header {
            rows.push(self.header());
        }
        rows.extend(positions.into_iter().map(|position| self.format_position(position)));
        rows.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix() -> Position {
        Position::new(10.0, 20.0, 5.0)
            .with_timestamp(1_000)
            .with_heading(90.0)
    }

    fn report(error: Option<PositionError>) -> StatusReport {
        StatusReport {
            supported: true,
            permission: None,
            tracking: error.is_none(),
            positions: vec![fix()],
            error,
        }
    }

    #[test]
    fn test_text_position() {
        let line = TextFormatter::new().with_precision(2).format_position(&fix());
        assert_eq!(line, "[1000] lat 10.00 lon 20.00 ±5.0m hdg 90°");
    }

    #[test]
    fn test_text_report_shows_history_without_error() {
        let text = TextFormatter::new().format_report(&report(None));
        assert!(text.contains("Geolocation API supported: true"));
        assert!(text.contains("Geolocation API permission: ?"));
        assert!(text.contains("Position History"));
        assert!(text.contains("lat 10.000000"));
    }

    #[test]
    fn test_text_report_prefers_error() {
        let error = PositionError::permission_denied("User denied Geolocation");
        let text = TextFormatter::new().format_report(&report(Some(error)));
        assert!(text.contains("Position Error"));
        assert!(text.contains("permission denied (code 1): User denied Geolocation"));
        assert!(!text.contains("Position History"));
    }

    #[test]
    fn test_json_report() {
        let json = JsonFormatter::new(false).format_report(&report(None)).unwrap();
        let parsed: StatusReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report(None));
    }

    #[test]
    fn test_csv_rows() {
        let csv = CsvFormatter::new().format_positions([&fix()]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "1000,10.000000,20.000000,5.0,,90.00,");
    }
}
