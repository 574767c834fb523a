//! Generator configuration

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Options shared by both SQL backends
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneratorOptions {
    /// Dates substituted for the reserved measurement period parameter
    pub measurement_period: MeasurementPeriod,
    /// Pre-expanded value set membership table
    pub valueset_table: ValuesetTable,
    /// Definitions counted by the closing aggregate query
    pub populations: Populations,
}

impl GeneratorOptions {
    pub fn with_measurement_period(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.measurement_period = MeasurementPeriod { start, end };
        self
    }
}

/// Closed date interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl MeasurementPeriod {
    /// Start as a quoted SQL date
    pub fn start_sql(&self) -> String {
        format!("'{}'", self.start.format("%Y-%m-%d"))
    }

    /// End as a quoted SQL date
    pub fn end_sql(&self) -> String {
        format!("'{}'", self.end.format("%Y-%m-%d"))
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }
}

impl Default for MeasurementPeriod {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default(),
        }
    }
}

/// Table and columns of the value set membership lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValuesetTable {
    pub name: String,
    pub url_column: String,
    pub code_column: String,
    pub system_column: String,
}

impl Default for ValuesetTable {
    fn default() -> Self {
        Self {
            name: "valueset_membership".to_string(),
            url_column: "valueset_url".to_string(),
            code_column: "code".to_string(),
            system_column: "code_system".to_string(),
        }
    }
}

/// Names of the three population definitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Populations {
    pub initial_population: String,
    pub denominator: String,
    pub numerator: String,
}

impl Default for Populations {
    fn default() -> Self {
        Self {
            initial_population: "InitialPopulation".to_string(),
            denominator: "Denominator".to_string(),
            numerator: "Numerator".to_string(),
        }
    }
}
