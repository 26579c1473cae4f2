//! Wire codec for detonation interactions.
//!
//! Converts between a [`DetonationRecord`] and the bus wire form: a map of
//! named parameters to big-endian byte payloads. The parameter name table
//! is a codec-owned constant; the byte layout per field is the bus schema
//! contract (fixed-width identifier triplets, IEEE-754 vectors, big-endian
//! enumeration codes, length-prefixed articulated-part arrays).
//!
//! Encoding is total. Decoding is strict: a missing parameter or a payload
//! whose length or layout does not match fails with [`CodecError`], and
//! round-trips are bit-exact — tolerance belongs to the comparator, never
//! to this layer.

use std::collections::HashMap;
use thiserror::Error;

use crate::detonation::{
    ArticulatedPart, DetonationRecord, DetonationResult, EntityIdentifier, EntityTypeCode,
    EventIdentifier,
};

/// Logical name of the detonation interaction class on the bus.
pub const INTERACTION_CLASS: &str = "MunitionDetonation";

pub const ARTICULATED_PART_DATA: &str = "ArticulatedPartData";
pub const DETONATION_LOCATION: &str = "DetonationLocation";
pub const DETONATION_RESULT_CODE: &str = "DetonationResultCode";
pub const EVENT_IDENTIFIER: &str = "EventIdentifier";
pub const FIRING_OBJECT_IDENTIFIER: &str = "FiringObjectIdentifier";
pub const FINAL_VELOCITY_VECTOR: &str = "FinalVelocityVector";
pub const FUSE_TYPE: &str = "FuseType";
pub const MUNITION_OBJECT_IDENTIFIER: &str = "MunitionObjectIdentifier";
pub const MUNITION_TYPE: &str = "MunitionType";
pub const QUANTITY_FIRED: &str = "QuantityFired";
pub const RATE_OF_FIRE: &str = "RateOfFire";
pub const RELATIVE_DETONATION_LOCATION: &str = "RelativeDetonationLocation";
pub const TARGET_OBJECT_IDENTIFIER: &str = "TargetObjectIdentifier";
pub const WARHEAD_TYPE: &str = "WarheadType";

/// Ordered parameter name table for the detonation interaction class.
pub const PARAMETER_NAMES: [&str; 14] = [
    ARTICULATED_PART_DATA,
    DETONATION_LOCATION,
    DETONATION_RESULT_CODE,
    EVENT_IDENTIFIER,
    FIRING_OBJECT_IDENTIFIER,
    FINAL_VELOCITY_VECTOR,
    FUSE_TYPE,
    MUNITION_OBJECT_IDENTIFIER,
    MUNITION_TYPE,
    QUANTITY_FIRED,
    RATE_OF_FIRE,
    RELATIVE_DETONATION_LOCATION,
    TARGET_OBJECT_IDENTIFIER,
    WARHEAD_TYPE,
];

/// One encoded interaction instance: wire parameter name -> byte payload.
pub type EncodedInteraction = HashMap<String, Vec<u8>>;

/// Errors for the wire codec.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Missing parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Malformed {parameter}: {reason}")]
    Malformed {
        parameter: &'static str,
        reason: String,
    },
}

impl CodecError {
    fn malformed(parameter: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            parameter,
            reason: reason.into(),
        }
    }
}

/// Big-endian cursor over one parameter payload.
///
/// Every read is length-checked; `finish` rejects trailing bytes so a
/// payload with the wrong layout cannot decode silently.
struct Reader<'a> {
    parameter: &'static str,
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(parameter: &'static str, data: &'a [u8]) -> Self {
        Self {
            parameter,
            data,
            pos: 0,
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.pos + n > self.data.len() {
            return Err(CodecError::malformed(
                self.parameter,
                format!(
                    "expected {} more bytes at offset {}, payload is {} bytes",
                    n,
                    self.pos,
                    self.data.len()
                ),
            ));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, CodecError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn f32(&mut self) -> Result<f32, CodecError> {
        let bytes = self.take(4)?;
        Ok(f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn f64(&mut self) -> Result<f64, CodecError> {
        let bytes = self.take(8)?;
        Ok(f64::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }

    fn finish(self) -> Result<(), CodecError> {
        if self.pos != self.data.len() {
            return Err(CodecError::malformed(
                self.parameter,
                format!(
                    "{} trailing bytes after offset {}",
                    self.data.len() - self.pos,
                    self.pos
                ),
            ));
        }
        Ok(())
    }
}

fn encode_event_identifier(id: &EventIdentifier) -> Vec<u8> {
    let mut out = Vec::with_capacity(6);
    out.extend_from_slice(&id.site.to_be_bytes());
    out.extend_from_slice(&id.application.to_be_bytes());
    out.extend_from_slice(&id.number.to_be_bytes());
    out
}

fn decode_event_identifier(parameter: &'static str, data: &[u8]) -> Result<EventIdentifier, CodecError> {
    let mut reader = Reader::new(parameter, data);
    let id = EventIdentifier {
        site: reader.u16()?,
        application: reader.u16()?,
        number: reader.u16()?,
    };
    reader.finish()?;
    Ok(id)
}

fn encode_entity_identifier(id: &EntityIdentifier) -> Vec<u8> {
    let mut out = Vec::with_capacity(6);
    out.extend_from_slice(&id.site.to_be_bytes());
    out.extend_from_slice(&id.application.to_be_bytes());
    out.extend_from_slice(&id.entity.to_be_bytes());
    out
}

fn decode_entity_identifier(
    parameter: &'static str,
    data: &[u8],
) -> Result<EntityIdentifier, CodecError> {
    let mut reader = Reader::new(parameter, data);
    let id = EntityIdentifier {
        site: reader.u16()?,
        application: reader.u16()?,
        entity: reader.u16()?,
    };
    reader.finish()?;
    Ok(id)
}

fn encode_entity_type(code: &EntityTypeCode) -> Vec<u8> {
    let mut out = Vec::with_capacity(8);
    out.push(code.kind);
    out.push(code.domain);
    out.extend_from_slice(&code.country.to_be_bytes());
    out.push(code.category);
    out.push(code.subcategory);
    out.push(code.specific);
    out.push(code.extra);
    out
}

fn decode_entity_type(parameter: &'static str, data: &[u8]) -> Result<EntityTypeCode, CodecError> {
    let mut reader = Reader::new(parameter, data);
    let code = EntityTypeCode {
        kind: reader.u8()?,
        domain: reader.u8()?,
        country: reader.u16()?,
        category: reader.u8()?,
        subcategory: reader.u8()?,
        specific: reader.u8()?,
        extra: reader.u8()?,
    };
    reader.finish()?;
    Ok(code)
}

fn encode_u16(value: u16) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

fn decode_u16(parameter: &'static str, data: &[u8]) -> Result<u16, CodecError> {
    let mut reader = Reader::new(parameter, data);
    let value = reader.u16()?;
    reader.finish()?;
    Ok(value)
}

fn encode_vector3_f64(v: &nalgebra::Vector3<f64>) -> Vec<u8> {
    let mut out = Vec::with_capacity(24);
    out.extend_from_slice(&v.x.to_be_bytes());
    out.extend_from_slice(&v.y.to_be_bytes());
    out.extend_from_slice(&v.z.to_be_bytes());
    out
}

fn decode_vector3_f64(
    parameter: &'static str,
    data: &[u8],
) -> Result<nalgebra::Vector3<f64>, CodecError> {
    let mut reader = Reader::new(parameter, data);
    let v = nalgebra::Vector3::new(reader.f64()?, reader.f64()?, reader.f64()?);
    reader.finish()?;
    Ok(v)
}

fn encode_vector3_f32(v: &nalgebra::Vector3<f32>) -> Vec<u8> {
    let mut out = Vec::with_capacity(12);
    out.extend_from_slice(&v.x.to_be_bytes());
    out.extend_from_slice(&v.y.to_be_bytes());
    out.extend_from_slice(&v.z.to_be_bytes());
    out
}

fn decode_vector3_f32(
    parameter: &'static str,
    data: &[u8],
) -> Result<nalgebra::Vector3<f32>, CodecError> {
    let mut reader = Reader::new(parameter, data);
    let v = nalgebra::Vector3::new(reader.f32()?, reader.f32()?, reader.f32()?);
    reader.finish()?;
    Ok(v)
}

fn encode_articulated_parts(parts: &[ArticulatedPart]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + parts.len() * 14);
    out.extend_from_slice(&(parts.len() as u32).to_be_bytes());
    for part in parts {
        out.extend_from_slice(&part.part_id.to_be_bytes());
        out.extend_from_slice(&part.parameter_type.to_be_bytes());
        out.extend_from_slice(&part.value.to_be_bytes());
    }
    out
}

fn decode_articulated_parts(
    parameter: &'static str,
    data: &[u8],
) -> Result<Vec<ArticulatedPart>, CodecError> {
    let mut reader = Reader::new(parameter, data);
    let count = reader.u32()? as usize;

    // Reject absurd counts before allocating.
    let remaining = data.len().saturating_sub(4);
    if count * 14 != remaining {
        return Err(CodecError::malformed(
            parameter,
            format!("declared {} entries but payload carries {} bytes", count, remaining),
        ));
    }

    let mut parts = Vec::with_capacity(count);
    for _ in 0..count {
        parts.push(ArticulatedPart {
            part_id: reader.u16()?,
            parameter_type: reader.u32()?,
            value: reader.f64()?,
        });
    }
    reader.finish()?;
    Ok(parts)
}

/// Encodes a detonation record into its wire parameter map. Total.
pub fn encode(record: &DetonationRecord) -> EncodedInteraction {
    let mut parameters = EncodedInteraction::with_capacity(PARAMETER_NAMES.len());
    parameters.insert(
        ARTICULATED_PART_DATA.to_string(),
        encode_articulated_parts(&record.articulated_parts),
    );
    parameters.insert(
        DETONATION_LOCATION.to_string(),
        encode_vector3_f64(&record.detonation_location),
    );
    parameters.insert(
        DETONATION_RESULT_CODE.to_string(),
        vec![record.result.code()],
    );
    parameters.insert(
        EVENT_IDENTIFIER.to_string(),
        encode_event_identifier(&record.event_id),
    );
    parameters.insert(
        FIRING_OBJECT_IDENTIFIER.to_string(),
        encode_entity_identifier(&record.firing_object),
    );
    parameters.insert(
        FINAL_VELOCITY_VECTOR.to_string(),
        encode_vector3_f32(&record.final_velocity),
    );
    parameters.insert(FUSE_TYPE.to_string(), encode_u16(record.fuse_type));
    parameters.insert(
        MUNITION_OBJECT_IDENTIFIER.to_string(),
        encode_entity_identifier(&record.munition_object),
    );
    parameters.insert(
        MUNITION_TYPE.to_string(),
        encode_entity_type(&record.munition_type),
    );
    parameters.insert(QUANTITY_FIRED.to_string(), encode_u16(record.quantity_fired));
    parameters.insert(RATE_OF_FIRE.to_string(), encode_u16(record.rate_of_fire));
    parameters.insert(
        RELATIVE_DETONATION_LOCATION.to_string(),
        encode_vector3_f32(&record.relative_location),
    );
    parameters.insert(
        TARGET_OBJECT_IDENTIFIER.to_string(),
        encode_entity_identifier(&record.target_object),
    );
    parameters.insert(WARHEAD_TYPE.to_string(), encode_u16(record.warhead_type));
    parameters
}

fn require<'a>(
    parameters: &'a EncodedInteraction,
    name: &'static str,
) -> Result<&'a [u8], CodecError> {
    parameters
        .get(name)
        .map(Vec::as_slice)
        .ok_or(CodecError::MissingParameter(name))
}

/// Decodes a wire parameter map into a detonation record.
///
/// Unknown extra parameters are ignored; a missing required parameter or a
/// payload with the wrong layout fails. `decode(encode(x)) == x` holds
/// bit-exact for every valid record.
pub fn decode(parameters: &EncodedInteraction) -> Result<DetonationRecord, CodecError> {
    let result_payload = require(parameters, DETONATION_RESULT_CODE)?;
    let mut result_reader = Reader::new(DETONATION_RESULT_CODE, result_payload);
    let result = DetonationResult::from_code(result_reader.u8()?);
    result_reader.finish()?;

    Ok(DetonationRecord {
        event_id: decode_event_identifier(EVENT_IDENTIFIER, require(parameters, EVENT_IDENTIFIER)?)?,
        firing_object: decode_entity_identifier(
            FIRING_OBJECT_IDENTIFIER,
            require(parameters, FIRING_OBJECT_IDENTIFIER)?,
        )?,
        target_object: decode_entity_identifier(
            TARGET_OBJECT_IDENTIFIER,
            require(parameters, TARGET_OBJECT_IDENTIFIER)?,
        )?,
        munition_object: decode_entity_identifier(
            MUNITION_OBJECT_IDENTIFIER,
            require(parameters, MUNITION_OBJECT_IDENTIFIER)?,
        )?,
        munition_type: decode_entity_type(MUNITION_TYPE, require(parameters, MUNITION_TYPE)?)?,
        warhead_type: decode_u16(WARHEAD_TYPE, require(parameters, WARHEAD_TYPE)?)?,
        fuse_type: decode_u16(FUSE_TYPE, require(parameters, FUSE_TYPE)?)?,
        quantity_fired: decode_u16(QUANTITY_FIRED, require(parameters, QUANTITY_FIRED)?)?,
        rate_of_fire: decode_u16(RATE_OF_FIRE, require(parameters, RATE_OF_FIRE)?)?,
        result,
        detonation_location: decode_vector3_f64(
            DETONATION_LOCATION,
            require(parameters, DETONATION_LOCATION)?,
        )?,
        relative_location: decode_vector3_f32(
            RELATIVE_DETONATION_LOCATION,
            require(parameters, RELATIVE_DETONATION_LOCATION)?,
        )?,
        final_velocity: decode_vector3_f32(
            FINAL_VELOCITY_VECTOR,
            require(parameters, FINAL_VELOCITY_VECTOR)?,
        )?,
        articulated_parts: decode_articulated_parts(
            ARTICULATED_PART_DATA,
            require(parameters, ARTICULATED_PART_DATA)?,
        )?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detonation::{DetonationResult, EntityTypeCode};
    use nalgebra::Vector3;
    use proptest::prelude::*;

    fn sample_record() -> DetonationRecord {
        DetonationRecord {
            event_id: EventIdentifier::new(12, 3, 101),
            firing_object: EntityIdentifier::new(12, 3, 7),
            target_object: EntityIdentifier::new(14, 1, 22),
            munition_object: EntityIdentifier::none(),
            munition_type: EntityTypeCode {
                kind: 2,
                domain: 1,
                country: 39,
                category: 2,
                subcategory: 14,
                specific: 1,
                extra: 0,
            },
            warhead_type: 1000,
            fuse_type: 100,
            quantity_fired: 1,
            rate_of_fire: 0,
            result: DetonationResult::EntityImpact,
            detonation_location: Vector3::new(3_126_019.23, 5_459_132.77, -1_260_434.5),
            relative_location: Vector3::new(0.5, -1.25, 2.0),
            final_velocity: Vector3::new(121.0, -14.5, 3.75),
            articulated_parts: vec![
                ArticulatedPart::new(1, 4096, 0.75),
                ArticulatedPart::new(2, 4097, -11.5),
            ],
        }
    }

    #[test]
    fn test_roundtrip_sample_record() {
        let record = sample_record();
        let decoded = decode(&encode(&record)).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_roundtrip_empty_articulated_parts() {
        let mut record = sample_record();
        record.articulated_parts.clear();
        let decoded = decode(&encode(&record)).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_missing_parameter_fails() {
        let mut parameters = encode(&sample_record());
        parameters.remove(EVENT_IDENTIFIER);
        match decode(&parameters) {
            Err(CodecError::MissingParameter(name)) => assert_eq!(name, EVENT_IDENTIFIER),
            other => panic!("expected MissingParameter, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_payload_fails() {
        let mut parameters = encode(&sample_record());
        parameters.insert(EVENT_IDENTIFIER.to_string(), vec![0, 12, 0]);
        assert!(matches!(
            decode(&parameters),
            Err(CodecError::Malformed { parameter: EVENT_IDENTIFIER, .. })
        ));
    }

    #[test]
    fn test_trailing_bytes_fail() {
        let mut parameters = encode(&sample_record());
        let mut payload = parameters[WARHEAD_TYPE].clone();
        payload.push(0xFF);
        parameters.insert(WARHEAD_TYPE.to_string(), payload);
        assert!(matches!(
            decode(&parameters),
            Err(CodecError::Malformed { parameter: WARHEAD_TYPE, .. })
        ));
    }

    #[test]
    fn test_articulated_count_mismatch_fails() {
        let mut parameters = encode(&sample_record());
        let mut payload = parameters[ARTICULATED_PART_DATA].clone();
        // Claim one more entry than the payload carries.
        let declared = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) + 1;
        payload[0..4].copy_from_slice(&declared.to_be_bytes());
        parameters.insert(ARTICULATED_PART_DATA.to_string(), payload);
        assert!(matches!(
            decode(&parameters),
            Err(CodecError::Malformed { parameter: ARTICULATED_PART_DATA, .. })
        ));
    }

    #[test]
    fn test_extra_parameters_ignored() {
        let mut parameters = encode(&sample_record());
        parameters.insert("Padding".to_string(), vec![0xAB; 3]);
        assert_eq!(decode(&parameters).unwrap(), sample_record());
    }

    prop_compose! {
        fn arb_entity_id()(site in any::<u16>(), application in any::<u16>(), entity in any::<u16>())
            -> EntityIdentifier {
            EntityIdentifier::new(site, application, entity)
        }
    }

    prop_compose! {
        fn arb_part()(part_id in any::<u16>(), parameter_type in any::<u32>(), value in -1e9f64..1e9f64)
            -> ArticulatedPart {
            ArticulatedPart::new(part_id, parameter_type, value)
        }
    }

    prop_compose! {
        fn arb_event_id()(site in any::<u16>(), application in any::<u16>(), number in any::<u16>())
            -> EventIdentifier {
            EventIdentifier::new(site, application, number)
        }
    }

    prop_compose! {
        fn arb_type_code()(
            kind in any::<u8>(), domain in any::<u8>(), country in any::<u16>(),
            category in any::<u8>(), subcategory in any::<u8>(), specific in any::<u8>(),
            extra in any::<u8>(),
        ) -> EntityTypeCode {
            EntityTypeCode { kind, domain, country, category, subcategory, specific, extra }
        }
    }

    prop_compose! {
        fn arb_vec3_f64()(x in -1e7f64..1e7f64, y in -1e7f64..1e7f64, z in -1e7f64..1e7f64)
            -> Vector3<f64> {
            Vector3::new(x, y, z)
        }
    }

    prop_compose! {
        fn arb_vec3_f32()(x in -2e3f32..2e3f32, y in -2e3f32..2e3f32, z in -2e3f32..2e3f32)
            -> Vector3<f32> {
            Vector3::new(x, y, z)
        }
    }

    prop_compose! {
        fn arb_record()(
            event_id in arb_event_id(),
            firing_object in arb_entity_id(),
            target_object in arb_entity_id(),
            munition_object in arb_entity_id(),
            munition_type in arb_type_code(),
            codes in any::<(u16, u16, u16, u16, u8)>(),
            vectors in (arb_vec3_f64(), arb_vec3_f32(), arb_vec3_f32()),
            articulated_parts in proptest::collection::vec(arb_part(), 0..4),
        ) -> DetonationRecord {
            let (warhead_type, fuse_type, quantity_fired, rate_of_fire, result_code) = codes;
            let (detonation_location, relative_location, final_velocity) = vectors;
            DetonationRecord {
                event_id,
                firing_object,
                target_object,
                munition_object,
                munition_type,
                warhead_type,
                fuse_type,
                quantity_fired,
                rate_of_fire,
                result: DetonationResult::from_code(result_code),
                detonation_location,
                relative_location,
                final_velocity,
                articulated_parts,
            }
        }
    }

    proptest! {
        #[test]
        fn prop_roundtrip(record in arb_record()) {
            let decoded = decode(&encode(&record)).unwrap();
            prop_assert_eq!(decoded, record);
        }
    }
}
