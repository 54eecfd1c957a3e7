//! Decoding typed child-block values out of matched payloads
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use byteorder::{BigEndian, ByteOrder};
use eyre::WrapErr;
use itertools::Itertools;
use vidalog_defs::{ChildBlockSpec, DataType, DefinitionsStore};

use crate::bus::{DecodedReading, EcuBlockId, RawReading};
use crate::counter::Counter;
use crate::scaling::Num;

/// Why a reading or group of readings was left undecoded
///
/// Skips are recoverable; they are counted so "unsupported" is never
/// indistinguishable from "nothing to decode".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// No child specs defined for the parent block
    NoChildSpecs,
    /// Parent block with more than one child sub-field (not supported)
    MultiChildBlock,
    /// Child field length is not a whole number of bytes
    SubByteField,
    /// No decodable shape for the data type at this byte width
    UnsupportedWidth,
    /// Data type tag with no known decoding
    UnsupportedDataType,
    /// Payload shorter than the child-block field, or not valid hex
    TruncatedPayload,
}

/// Binary unpack shape resolved from a data type and byte length
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Width {
    I1,
    I2,
    I4,
    U1,
    U2,
    U4,
    F4,
}

/// Resolve the unpack shape for a field, or `None` if undecodable.
///
/// Returns the shape and the number of left-zero-pad bytes (unsigned fields
/// are padded up to the next power-of-two width, capped at 4 bytes).
fn unpack_shape(data_type: &DataType, len_bytes: usize) -> Option<(Width, usize)> {
    match data_type {
        DataType::Signed => match len_bytes {
            1 => Some((Width::I1, 0)),
            2 => Some((Width::I2, 0)),
            4 => Some((Width::I4, 0)),
            _ => None,
        },
        DataType::Unsigned => {
            if len_bytes == 0 {
                return None;
            }
            let padded = len_bytes.next_power_of_two();
            let padding = padded - len_bytes;
            match padded {
                1 => Some((Width::U1, padding)),
                2 => Some((Width::U2, padding)),
                4 => Some((Width::U4, padding)),
                _ => None,
            }
        }
        DataType::Float4 => (len_bytes == 4).then_some((Width::F4, 0)),
        DataType::Other(_) => None,
    }
}

/// Decode one big-endian value from an exactly-sized byte chunk
fn decode_one(width: Width, bytes: &[u8]) -> Num {
    match width {
        Width::I1 => Num::Int(i64::from(bytes[0] as i8)),
        Width::I2 => Num::Int(i64::from(BigEndian::read_i16(bytes))),
        Width::I4 => Num::Int(i64::from(BigEndian::read_i32(bytes))),
        Width::U1 => Num::Int(i64::from(bytes[0])),
        Width::U2 => Num::Int(i64::from(BigEndian::read_u16(bytes))),
        Width::U4 => Num::Int(i64::from(BigEndian::read_u32(bytes))),
        Width::F4 => Num::Float(f64::from(BigEndian::read_f32(bytes))),
    }
}

/// The hex slice of one field within a payload, if the payload covers it
fn hex_field(payload: &str, offset: usize, len: usize) -> Option<&str> {
    let slice = payload.get(offset..offset + len)?;
    slice.bytes().all(|b| b.is_ascii_hexdigit()).then_some(slice)
}

/// Decodes raw parameter readings into typed child-block values
///
/// Child specs are fetched from the definitions store the first time their
/// block identity is seen and cached for the rest of the session, the
/// empty "no children defined" answer included.
#[derive(Default)]
pub struct BlockExtractor {
    cache: HashMap<EcuBlockId, Vec<ChildBlockSpec>>,
    skips: Counter<SkipReason>,
}

impl BlockExtractor {
    pub fn new() -> BlockExtractor {
        BlockExtractor::default()
    }

    /// How many readings were skipped, by reason, over the extractor's life
    pub fn skip_counts(&self) -> &Counter<SkipReason> {
        &self.skips
    }

    /// Decode a batch of raw readings
    ///
    /// Readings are grouped by block identity; within a group input order is
    /// preserved and every decodable reading produces exactly one
    /// [DecodedReading]. Undecodable groups and readings are counted in
    /// [BlockExtractor::skip_counts] and do not stop the pass.
    pub fn extract<S: DefinitionsStore>(
        &mut self,
        store: &S,
        readings: Vec<RawReading>,
    ) -> eyre::Result<Vec<DecodedReading>> {
        let total = readings.len();
        let mut readings = readings;
        // Stable sort: readings sharing an id keep their relative order
        readings.sort_by_key(|r| r.id);

        let mut result = Vec::new();
        let groups = readings.into_iter().chunk_by(|r| r.id);
        for (id, chunk) in &groups {
            let group: Vec<RawReading> = chunk.collect();
            let n = group.len() as u64;

            let specs = match self.cache.entry(id) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let specs = store
                        .child_block_specs(id.ecu_variant_id, id.parent_block_id)
                        .wrap_err_with(|| format!("Failed to fetch child block specs for {id:?}"))?;
                    entry.insert(specs)
                }
            };

            if specs.is_empty() {
                self.skips[SkipReason::NoChildSpecs] += n;
                continue;
            }
            if specs.len() > 1 {
                tracing::warn!(
                    "Skipping {n} readings for {id:?}: parent block has {} child sub-fields, only single-child blocks are decodable",
                    specs.len()
                );
                self.skips[SkipReason::MultiChildBlock] += n;
                continue;
            }

            let spec = &specs[0];
            if spec.bit_length % 8 != 0 {
                self.skips[SkipReason::SubByteField] += n;
                continue;
            }
            let nibble_len = (spec.bit_length / 4) as usize;
            let nibble_off = (spec.bit_offset / 4) as usize;
            let len_bytes = nibble_len / 2;
            let Some((width, padding)) = unpack_shape(&spec.data_type, len_bytes) else {
                let reason = if matches!(spec.data_type, DataType::Other(_)) {
                    SkipReason::UnsupportedDataType
                } else {
                    SkipReason::UnsupportedWidth
                };
                self.skips[reason] += n;
                continue;
            };

            // Concatenate every field slice (left-padded as the shape
            // requires) and decode the whole group in one pass
            let stride = padding + len_bytes;
            let pad_hex = "00".repeat(padding);
            let mut kept = Vec::with_capacity(group.len());
            let mut hex_buf = String::with_capacity(group.len() * stride * 2);
            for reading in &group {
                match hex_field(&reading.payload, nibble_off, nibble_len) {
                    Some(slice) => {
                        hex_buf.push_str(&pad_hex);
                        hex_buf.push_str(slice);
                        kept.push(reading);
                    }
                    None => {
                        tracing::warn!(
                            "Skipping reading for block {}: payload too short or not hex: {:?}",
                            spec.id,
                            reading.payload
                        );
                        self.skips[SkipReason::TruncatedPayload] += 1;
                    }
                }
            }

            let bytes = hex::decode(&hex_buf).wrap_err("Failed to decode payload hex")?;
            for (reading, chunk) in kept.iter().zip(bytes.chunks_exact(stride)) {
                result.push(DecodedReading {
                    block_id: spec.id,
                    timestamp: reading.timestamp,
                    value: decode_one(width, chunk),
                });
            }
        }

        tracing::debug!("Decoded {} of {total} raw readings", result.len());
        Ok(result)
    }
}
