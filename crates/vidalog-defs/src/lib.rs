//! The definitions-store boundary of the vidalog decoder.
//!
//! The decoder core is a read-only consumer of a definitions database
//! describing, per ECU variant, which CAN receive addresses and compare
//! values identify each parameter block, and how each block's sub-fields are
//! laid out and scaled. That database lives elsewhere (it is populated from a
//! vendor CSV export by separate tooling); the core only ever issues the two
//! query shapes on [DefinitionsStore].
//!
//! [MemoryStore] is a complete in-memory implementation, used by tests and by
//! embedders who load definitions themselves.

use std::collections::HashMap;

/// How the raw bytes of a child block are to be interpreted.
///
/// The vendor data uses free-form tag strings; the three tags the decoder
/// supports get their own variants, everything else is preserved in
/// [DataType::Other] and skipped downstream as unsupported.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataType {
    Signed,
    Unsigned,
    Float4,
    Other(String),
}

impl From<&str> for DataType {
    fn from(tag: &str) -> DataType {
        match tag {
            "Signed" => DataType::Signed,
            "Unsigned" => DataType::Unsigned,
            "4-byte float" => DataType::Float4,
            other => DataType::Other(other.to_string()),
        }
    }
}

/// One parent-block match record: which compare value, on which CAN receive
/// address, identifies this block for this ECU variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParentBlockMatch {
    pub parent_block_id: i64,
    pub ecu_variant_id: i64,
    pub can_id_rx: String,
    /// `0x`-prefixed hex string. The prefix is validated and stripped by the
    /// matcher, not here.
    pub compare_value: String,
}

/// Decoding descriptor for one sub-field of a parent block.
///
/// The scaling definition strings are carried alongside their ids so a
/// consumer can feed them straight to the scaling engine without another
/// round-trip to the store.
#[derive(Clone, Debug, PartialEq)]
pub struct ChildBlockSpec {
    pub id: i64,
    /// Field length in bits. Only multiples of 8 are decodable.
    pub bit_length: u32,
    /// Field offset in bits from the start of the parent payload.
    pub bit_offset: u32,
    pub data_type: DataType,
    pub scaling_id: i64,
    pub scaling: String,
    pub ppe_scaling_id: i64,
    pub ppe_scaling: String,
    pub name: String,
    pub text: String,
    pub ppe_text: String,
    pub ppe_unit_text: String,
}

/// Read-only query surface of the definitions database.
///
/// Implementations answer with empty vectors, not errors, when nothing is
/// defined for the requested scope.
pub trait DefinitionsStore {
    /// All parent-block match records for the given ECU variant identifiers.
    fn parent_match_data(&self, ecu_identifiers: &[String]) -> eyre::Result<Vec<ParentBlockMatch>>;

    /// All child-block specs of one parent block as instantiated for one ECU
    /// variant. Zero children and multiple children are both legal answers.
    fn child_block_specs(
        &self,
        ecu_variant_id: i64,
        parent_block_id: i64,
    ) -> eyre::Result<Vec<ChildBlockSpec>>;
}

/// In-memory [DefinitionsStore].
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// ECU identifier -> variant id, as the identification phase resolves them
    variants: HashMap<String, i64>,
    matches: Vec<ParentBlockMatch>,
    children: HashMap<(i64, i64), Vec<ChildBlockSpec>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Register an ECU variant under the identifier the tool logs for it.
    pub fn add_variant(&mut self, identifier: impl Into<String>, variant_id: i64) -> &mut Self {
        self.variants.insert(identifier.into(), variant_id);
        self
    }

    pub fn add_parent_match(&mut self, record: ParentBlockMatch) -> &mut Self {
        self.matches.push(record);
        self
    }

    pub fn add_child_spec(
        &mut self,
        ecu_variant_id: i64,
        parent_block_id: i64,
        spec: ChildBlockSpec,
    ) -> &mut Self {
        self.children
            .entry((ecu_variant_id, parent_block_id))
            .or_default()
            .push(spec);
        self
    }
}

impl DefinitionsStore for MemoryStore {
    fn parent_match_data(&self, ecu_identifiers: &[String]) -> eyre::Result<Vec<ParentBlockMatch>> {
        let variant_ids: Vec<i64> = ecu_identifiers
            .iter()
            .filter_map(|id| self.variants.get(id).copied())
            .collect();
        Ok(self
            .matches
            .iter()
            .filter(|m| variant_ids.contains(&m.ecu_variant_id))
            .cloned()
            .collect())
    }

    fn child_block_specs(
        &self,
        ecu_variant_id: i64,
        parent_block_id: i64,
    ) -> eyre::Result<Vec<ChildBlockSpec>> {
        Ok(self
            .children
            .get(&(ecu_variant_id, parent_block_id))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn spec(id: i64) -> ChildBlockSpec {
        ChildBlockSpec {
            id,
            bit_length: 16,
            bit_offset: 0,
            data_type: DataType::Unsigned,
            scaling_id: 1,
            scaling: String::from("x"),
            ppe_scaling_id: 1,
            ppe_scaling: String::from("x"),
            name: String::from("Engine speed"),
            text: String::from("Engine speed"),
            ppe_text: String::from("Engine speed"),
            ppe_unit_text: String::from("rpm"),
        }
    }

    #[test]
    fn test_data_type_tags() {
        assert_eq!(DataType::from("Signed"), DataType::Signed);
        assert_eq!(DataType::from("Unsigned"), DataType::Unsigned);
        assert_eq!(DataType::from("4-byte float"), DataType::Float4);
        assert_eq!(
            DataType::from("ASCII"),
            DataType::Other(String::from("ASCII"))
        );
    }

    #[test]
    fn test_match_data_scoped_to_identified_variants() {
        let mut store = MemoryStore::new();
        store.add_variant("6A19E1", 7).add_variant("5F0CC2", 9);
        store.add_parent_match(ParentBlockMatch {
            parent_block_id: 100,
            ecu_variant_id: 7,
            can_id_rx: String::from("0x00800021"),
            compare_value: String::from("0xF0"),
        });
        store.add_parent_match(ParentBlockMatch {
            parent_block_id: 200,
            ecu_variant_id: 42,
            can_id_rx: String::from("0x00800099"),
            compare_value: String::from("0xF1"),
        });

        let records = store
            .parent_match_data(&[String::from("6A19E1"), String::from("unknown")])
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].parent_block_id, 100);
    }

    #[test]
    fn test_child_specs_empty_when_undefined() {
        let mut store = MemoryStore::new();
        store.add_child_spec(7, 100, spec(1000));

        assert_eq!(store.child_block_specs(7, 100).unwrap().len(), 1);
        assert_eq!(store.child_block_specs(7, 999).unwrap(), vec![]);
    }
}
