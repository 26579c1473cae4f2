//! Federation agreement document and tolerance loaders.
//!
//! The FAD is a CSV document, one detonation per row. Identifier triplets
//! and the munition type descriptor are dot-separated; the articulated
//! part list is `part:type:value` triples joined with `|`; a literal
//! `none` names the absent target/munition entity.
//!
//! ```text
//! event,firing,target,munition,munition_type,warhead,fuse,quantity,rate,result,...
//! 1.1.1,1.1.10,2.1.20,none,2.1.39.2.14.1.0,1000,100,1,0,1,...
//! ```
//!
//! The spatial tolerance document is JSON with the fixed key set
//! `worldLocation` / `relativePosition` / `velocity`.

use nalgebra::Vector3;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use fedrecon_core::detonation::{
    ArticulatedPart, DetonationRecord, DetonationResult, EntityIdentifier, EntityTypeCode,
    EventIdentifier,
};
use fedrecon_core::reconcile::SpatialToleranceConfig;

/// Errors while loading reference data.
#[derive(Debug, Error)]
pub enum FadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Row {row}: {reason}")]
    Parse { row: usize, reason: String },
}

#[derive(Debug, Deserialize)]
struct FadRow {
    event: String,
    firing: String,
    target: String,
    munition: String,
    munition_type: String,
    warhead: u16,
    fuse: u16,
    quantity: u16,
    rate: u16,
    result: u8,
    world_x: f64,
    world_y: f64,
    world_z: f64,
    rel_x: f32,
    rel_y: f32,
    rel_z: f32,
    vel_x: f32,
    vel_y: f32,
    vel_z: f32,
    #[serde(default)]
    articulated: String,
}

fn parse_triplet(row: usize, field: &str, text: &str) -> Result<[u16; 3], FadError> {
    let parts: Vec<&str> = text.split('.').collect();
    if parts.len() != 3 {
        return Err(FadError::Parse {
            row,
            reason: format!("{}: expected site.application.number, got '{}'", field, text),
        });
    }
    let mut out = [0u16; 3];
    for (slot, part) in out.iter_mut().zip(&parts) {
        *slot = part.parse().map_err(|_| FadError::Parse {
            row,
            reason: format!("{}: invalid component '{}'", field, part),
        })?;
    }
    Ok(out)
}

fn parse_entity_id(row: usize, field: &str, text: &str) -> Result<EntityIdentifier, FadError> {
    if text.eq_ignore_ascii_case("none") {
        return Ok(EntityIdentifier::none());
    }
    let [site, application, entity] = parse_triplet(row, field, text)?;
    Ok(EntityIdentifier::new(site, application, entity))
}

fn parse_entity_type(row: usize, text: &str) -> Result<EntityTypeCode, FadError> {
    let parts: Vec<&str> = text.split('.').collect();
    if parts.len() != 7 {
        return Err(FadError::Parse {
            row,
            reason: format!("munition_type: expected 7 dotted components, got '{}'", text),
        });
    }
    fn component<T: std::str::FromStr>(row: usize, text: &str) -> Result<T, FadError> {
        text.parse().map_err(|_| FadError::Parse {
            row,
            reason: format!("munition_type: invalid component '{}'", text),
        })
    }
    Ok(EntityTypeCode {
        kind: component(row, parts[0])?,
        domain: component(row, parts[1])?,
        country: component(row, parts[2])?,
        category: component(row, parts[3])?,
        subcategory: component(row, parts[4])?,
        specific: component(row, parts[5])?,
        extra: component(row, parts[6])?,
    })
}

fn parse_articulated(row: usize, text: &str) -> Result<Vec<ArticulatedPart>, FadError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    text.split('|')
        .map(|entry| {
            let pieces: Vec<&str> = entry.split(':').collect();
            if pieces.len() != 3 {
                return Err(FadError::Parse {
                    row,
                    reason: format!("articulated: expected part:type:value, got '{}'", entry),
                });
            }
            let part_id = pieces[0].parse().map_err(|_| FadError::Parse {
                row,
                reason: format!("articulated: invalid part id '{}'", pieces[0]),
            })?;
            let parameter_type = pieces[1].parse().map_err(|_| FadError::Parse {
                row,
                reason: format!("articulated: invalid parameter type '{}'", pieces[1]),
            })?;
            let value = pieces[2].parse().map_err(|_| FadError::Parse {
                row,
                reason: format!("articulated: invalid value '{}'", pieces[2]),
            })?;
            Ok(ArticulatedPart::new(part_id, parameter_type, value))
        })
        .collect()
}

fn row_to_record(row_index: usize, row: FadRow) -> Result<DetonationRecord, FadError> {
    let [site, application, number] = parse_triplet(row_index, "event", &row.event)?;
    Ok(DetonationRecord {
        event_id: EventIdentifier::new(site, application, number),
        firing_object: parse_entity_id(row_index, "firing", &row.firing)?,
        target_object: parse_entity_id(row_index, "target", &row.target)?,
        munition_object: parse_entity_id(row_index, "munition", &row.munition)?,
        munition_type: parse_entity_type(row_index, &row.munition_type)?,
        warhead_type: row.warhead,
        fuse_type: row.fuse,
        quantity_fired: row.quantity,
        rate_of_fire: row.rate,
        result: DetonationResult::from_code(row.result),
        detonation_location: Vector3::new(row.world_x, row.world_y, row.world_z),
        relative_location: Vector3::new(row.rel_x, row.rel_y, row.rel_z),
        final_velocity: Vector3::new(row.vel_x, row.vel_y, row.vel_z),
        articulated_parts: parse_articulated(row_index, &row.articulated)?,
    })
}

/// Parses FAD rows from any CSV source.
pub fn parse_fad_csv<R: std::io::Read>(reader: R) -> Result<Vec<DetonationRecord>, FadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for (index, row) in csv_reader.deserialize::<FadRow>().enumerate() {
        // Row numbers are 1-based and skip the header line.
        records.push(row_to_record(index + 2, row?)?);
    }
    Ok(records)
}

/// Loads the federation agreement document from a CSV file.
pub fn load_fad_csv(path: &Path) -> Result<Vec<DetonationRecord>, FadError> {
    let file = std::fs::File::open(path)?;
    let records = parse_fad_csv(file)?;
    info!(
        "Loaded {} reference detonations from {}",
        records.len(),
        path.display()
    );
    Ok(records)
}

/// Loads the spatial tolerance configuration from a JSON file.
pub fn load_tolerance_json(path: &Path) -> Result<SpatialToleranceConfig, FadError> {
    let file = std::fs::File::open(path)?;
    let tolerance: SpatialToleranceConfig = serde_json::from_reader(file)?;
    info!(
        "Loaded spatial tolerances from {}: world={} relative={} velocity={}",
        path.display(),
        tolerance.world_location,
        tolerance.relative_location,
        tolerance.velocity
    );
    Ok(tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "event,firing,target,munition,munition_type,warhead,fuse,quantity,rate,\
                          result,world_x,world_y,world_z,rel_x,rel_y,rel_z,vel_x,vel_y,vel_z,articulated";

    #[test]
    fn test_parse_full_row() {
        let csv = format!(
            "{}\n1.1.1,1.1.10,2.1.20,none,2.1.39.2.14.1.0,1000,100,1,0,1,\
             3126019.2,5459132.7,-1260434.5,0.5,-1.25,2.0,121.0,-14.5,3.75,1:4096:0.75|2:4097:-11.5",
            HEADER
        );
        let records = parse_fad_csv(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.event_id, EventIdentifier::new(1, 1, 1));
        assert!(record.munition_object.is_none());
        assert_eq!(record.munition_type.country, 39);
        assert_eq!(record.result, DetonationResult::EntityImpact);
        assert_eq!(record.articulated_parts.len(), 2);
        assert_eq!(record.articulated_parts[1].value, -11.5);
    }

    #[test]
    fn test_empty_articulated_column() {
        let csv = format!(
            "{}\n1.1.2,1.1.10,none,none,2.1.39.2.14.1.0,0,0,1,0,3,\
             0.0,0.0,0.0,0.0,0.0,0.0,0.0,0.0,0.0,",
            HEADER
        );
        let records = parse_fad_csv(csv.as_bytes()).unwrap();
        assert!(records[0].articulated_parts.is_empty());
    }

    #[test]
    fn test_bad_event_identifier_reports_row() {
        let csv = format!(
            "{}\n1.1,1.1.10,none,none,2.1.39.2.14.1.0,0,0,1,0,3,\
             0.0,0.0,0.0,0.0,0.0,0.0,0.0,0.0,0.0,",
            HEADER
        );
        match parse_fad_csv(csv.as_bytes()) {
            Err(FadError::Parse { row, .. }) => assert_eq!(row, 2),
            other => panic!("expected Parse error, got {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn test_tolerance_json() {
        let json = r#"{"worldLocation": 0.5, "relativePosition": 0.25, "velocity": 1.5}"#;
        let tolerance: SpatialToleranceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(tolerance, SpatialToleranceConfig::new(0.5, 0.25, 1.5));
    }
}
