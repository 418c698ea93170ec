//! Shared domain types
//!
//! Wire-adjacent data structures parsed out of gateway JSON, plus the
//! hash helpers used by the caches and the polling loop.

use std::collections::HashMap;

use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors raised while picking apart gateway JSON
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("missing or malformed field `{0}`")]
    MissingField(&'static str),
}

/// Convert an unsigned 32-bit definition hash to the snapshot's signed id.
///
/// The snapshot stores record ids as signed 32-bit integers produced by
/// reinterpreting the unsigned hash in two's complement. Values at or above
/// 2^31 therefore map to negative ids, and the conversion must stay
/// bit-exact with the remote service's scheme.
pub fn hash_to_id(hash: u32) -> i32 {
    hash as i32
}

/// Stable content hash of a JSON value.
///
/// serde_json serializes object keys in sorted order, so equal values
/// always produce equal bytes regardless of how the response was ordered
/// on the wire. The hex SHA-256 of that canonical encoding is the change
/// detection key used by the polling loop.
pub fn content_hash(value: &Value) -> String {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}

/// One playable character as listed in the profile response
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterSummary {
    pub character_id: String,
    /// Remote route of the character's emblem image
    pub emblem_route: String,
    /// Power level shown on the info tile
    pub light: i64,
    pub race_hash: u32,
    pub class_hash: u32,
}

impl CharacterSummary {
    /// Parse a single character entry from the profile payload
    pub fn from_json(json: &Value) -> Result<Self, ModelError> {
        Ok(Self {
            character_id: json
                .get("characterId")
                .and_then(Value::as_str)
                .ok_or(ModelError::MissingField("characterId"))?
                .to_string(),
            emblem_route: json
                .get("emblemPath")
                .and_then(Value::as_str)
                .ok_or(ModelError::MissingField("emblemPath"))?
                .to_string(),
            light: json.get("light").and_then(Value::as_i64).unwrap_or(0),
            race_hash: json
                .get("raceHash")
                .and_then(Value::as_u64)
                .ok_or(ModelError::MissingField("raceHash"))? as u32,
            class_hash: json
                .get("classHash")
                .and_then(Value::as_u64)
                .ok_or(ModelError::MissingField("classHash"))? as u32,
        })
    }
}

/// An item the character owns, either equipped or carried
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedItem {
    pub item_hash: u32,
    pub item_instance_id: String,
    pub bucket_hash: u32,
}

impl OwnedItem {
    fn from_json(json: &Value) -> Result<Self, ModelError> {
        Ok(Self {
            item_hash: json
                .get("itemHash")
                .and_then(Value::as_u64)
                .ok_or(ModelError::MissingField("itemHash"))? as u32,
            item_instance_id: json
                .get("itemInstanceId")
                .and_then(Value::as_str)
                .ok_or(ModelError::MissingField("itemInstanceId"))?
                .to_string(),
            bucket_hash: json
                .get("bucketHash")
                .and_then(Value::as_u64)
                .ok_or(ModelError::MissingField("bucketHash"))? as u32,
        })
    }
}

/// Per-instance item state (rolls differ between copies of the same item)
#[derive(Debug, Clone, PartialEq)]
pub struct ItemInstance {
    /// Damage type index, 1-based on the wire
    pub damage_type: u8,
    /// Primary stat value shown on the tile badge
    pub primary_stat: i64,
}

/// Point-in-time view of a character's equipment and inventory.
///
/// Replaced wholesale on every successful poll cycle; two snapshots with
/// equal `content_hash` are treated as identical.
#[derive(Debug, Clone, Default)]
pub struct InventorySnapshot {
    pub content_hash: String,
    pub equipment: Vec<OwnedItem>,
    pub inventory: Vec<OwnedItem>,
    pub instances: HashMap<String, ItemInstance>,
}

impl InventorySnapshot {
    /// Build a snapshot from the gateway's character view payload
    pub fn from_view(view: &Value) -> Result<Self, ModelError> {
        let equipment = Self::item_list(view, "equipment")?;
        let inventory = Self::item_list(view, "inventory")?;

        let mut instances = HashMap::new();
        if let Some(data) = view
            .pointer("/itemComponents/instances/data")
            .and_then(Value::as_object)
        {
            for (instance_id, instance) in data {
                instances.insert(
                    instance_id.clone(),
                    ItemInstance {
                        damage_type: instance
                            .get("damageType")
                            .and_then(Value::as_u64)
                            .unwrap_or(0) as u8,
                        primary_stat: instance
                            .pointer("/primaryStat/value")
                            .and_then(Value::as_i64)
                            .unwrap_or(0),
                    },
                );
            }
        }

        Ok(Self {
            content_hash: content_hash(view),
            equipment,
            inventory,
            instances,
        })
    }

    fn item_list(view: &Value, section: &'static str) -> Result<Vec<OwnedItem>, ModelError> {
        view.pointer(&format!("/{}/data/items", section))
            .and_then(Value::as_array)
            .ok_or(ModelError::MissingField(section))?
            .iter()
            .map(OwnedItem::from_json)
            .collect()
    }

    /// The equipped item backing a bucket, if any
    pub fn equipped_in(&self, bucket_hash: u32) -> Option<&OwnedItem> {
        self.equipment.iter().find(|i| i.bucket_hash == bucket_hash)
    }

    /// All carried items belonging to a bucket
    pub fn carried_in(&self, bucket_hash: u32) -> Vec<&OwnedItem> {
        self.inventory
            .iter()
            .filter(|i| i.bucket_hash == bucket_hash)
            .collect()
    }

    /// Instance state for an owned item
    pub fn instance(&self, item: &OwnedItem) -> Option<&ItemInstance> {
        self.instances.get(&item.item_instance_id)
    }
}

/// A remote equipment category pinned to one of the three tracked
/// display slots. Derived once per character session from a manifest scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    pub hash: u32,
    pub slot_index: usize,
}
