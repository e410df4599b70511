//! CSV-based assumption loader
//!
//! Reads `name,value` rows, e.g. `inflation_rate,0.03`.

use super::Assumptions;
use crate::error::ConfigError;
use std::collections::HashMap;
use std::error::Error;
use std::io::Read;
use std::path::Path;

/// Default path to the assumptions file
pub const DEFAULT_ASSUMPTIONS_PATH: &str = "data/assumptions.csv";

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    name: String,
    value: f64,
}

/// Load assumptions from a CSV file
pub fn load_assumptions<P: AsRef<Path>>(path: P) -> Result<Assumptions, Box<dyn Error>> {
    let file = std::fs::File::open(path)?;
    load_assumptions_from_reader(file)
}

/// Load assumptions from any reader
pub fn load_assumptions_from_reader<R: Read>(reader: R) -> Result<Assumptions, Box<dyn Error>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);

    let mut values = HashMap::new();
    for result in csv_reader.deserialize() {
        let row: CsvRow = result?;
        if values.insert(row.name.clone(), row.value).is_some() {
            return Err(ConfigError::InvalidAssumption {
                name: row.name,
                reason: "defined more than once".to_string(),
            }
            .into());
        }
    }

    Ok(Assumptions::from_map(&values)?)
}
