//! Raw-bus message matching and block decoding
pub mod extract;
pub mod matcher;

use chrono::NaiveTime;
use serde::ser::SerializeStruct;

use crate::scaling::Num;

/// One schema parent block as instantiated for one ECU variant
///
/// The ordering (variant first, then block) is what decode passes group on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EcuBlockId {
    pub ecu_variant_id: i64,
    pub parent_block_id: i64,
}

/// The undecoded remainder of a matched bus message
///
/// The payload is the hex text left after the message-type tag and the
/// compare value are stripped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawReading {
    pub id: EcuBlockId,
    pub payload: String,
    pub timestamp: NaiveTime,
}

/// One decoded child-block value
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecodedReading {
    pub block_id: i64,
    pub timestamp: NaiveTime,
    pub value: Num,
}

impl serde::Serialize for DecodedReading {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("DecodedReading", 3)?;
        state.serialize_field("block_id", &self.block_id)?;
        state.serialize_field(
            "timestamp",
            &self.timestamp.format("%H:%M:%S%.3f").to_string(),
        )?;
        state.serialize_field("value", &self.value)?;
        state.end()
    }
}

impl serde::Serialize for Num {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Num::Int(v) => serializer.serialize_i64(*v),
            Num::Float(v) => serializer.serialize_f64(*v),
        }
    }
}

#[cfg(test)]
mod tests {
    use csv::Writer;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_csv_format() {
        let readings = [
            DecodedReading {
                block_id: 1000,
                timestamp: NaiveTime::from_hms_milli_opt(10, 30, 0, 123).unwrap(),
                value: Num::Int(850),
            },
            DecodedReading {
                block_id: 1001,
                timestamp: NaiveTime::from_hms_milli_opt(10, 30, 0, 456).unwrap(),
                value: Num::Float(87.5),
            },
        ];

        let writer = Vec::<u8>::new();
        let mut writer = Writer::from_writer(writer);
        for reading in &readings {
            writer.serialize(reading).unwrap();
        }

        let bytes = writer.into_inner().unwrap();
        let csv_str = String::from_utf8(bytes).unwrap();
        let expected = "block_id,timestamp,value\n\
                        1000,10:30:00.123,850\n\
                        1001,10:30:00.456,87.5\n";
        assert_eq!(csv_str, expected);
    }

    #[test]
    fn test_block_id_ordering() {
        let a = EcuBlockId {
            ecu_variant_id: 1,
            parent_block_id: 9,
        };
        let b = EcuBlockId {
            ecu_variant_id: 2,
            parent_block_id: 1,
        };
        // Variant dominates the ordering
        assert!(a < b);
    }
}
