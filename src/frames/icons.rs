//! Item and info tile composition
//!
//! Builds the composed tiles frames place on the grid: item icons with
//! their stat badge and ammo class indicator, character info tiles, and
//! the gray filler tile.

use anyhow::anyhow;
use serde_json::Value;

use crate::app::DeckContext;
use crate::device::Device;
use crate::model::{CharacterSummary, InventorySnapshot, ItemInstance, OwnedItem};
use crate::render::Overlay;

/// Badge colors per damage type, 0-indexed by `damage_type - 1`:
/// (background, text)
const DAMAGE_COLORS: [([u8; 4], [u8; 4]); 4] = [
    ([174, 174, 174, 180], [0, 0, 0, 255]),       // kinetic
    ([152, 208, 239, 180], [0, 0, 0, 255]),       // arc
    ([246, 133, 58, 180], [255, 255, 255, 255]),  // solar
    ([191, 151, 213, 180], [255, 255, 255, 255]), // void
];

/// Dark box behind the ammo class indicator
const AMMO_BOX_COLOR: [u8; 4] = [50, 50, 50, 255];

/// Font size for tile text
const BADGE_TEXT_SIZE: f32 = 12.0;

/// Ammo class icon routes, keyed by the definition's ammo type
fn ammo_icon_route(ammo_type: u64) -> Option<&'static str> {
    match ammo_type {
        1 => Some("/common/icons/ammo_primary.png"),
        2 => Some("/common/icons/ammo_special.png"),
        3 => Some("/common/icons/ammo_heavy.png"),
        _ => None,
    }
}

/// Compose the tile for an owned item: its icon, a damage-colored badge
/// with the primary stat, and the ammo class indicator.
pub fn item_tile(
    ctx: &DeckContext,
    snapshot: &InventorySnapshot,
    item: &OwnedItem,
) -> anyhow::Result<Vec<u8>> {
    let definition = ctx.manifest.get("InventoryItemDefinition", item.item_hash)?;

    let instance = snapshot.instance(item).cloned().unwrap_or(ItemInstance {
        damage_type: 0,
        primary_stat: 0,
    });

    let icon_route = definition
        .pointer("/displayProperties/icon")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("item {} has no icon", item.item_hash))?;
    let icon = ctx.pipeline.decode(&ctx.fetch_asset(icon_route)?)?;

    let damage_index = (instance.damage_type.saturating_sub(1) as usize).min(3);
    let (badge_bg, badge_fg) = DAMAGE_COLORS[damage_index];

    let mut overlays = vec![
        // Stat badge across the bottom-left
        Overlay::Rect {
            x: 0,
            y: 56,
            width: 50,
            height: 16,
            color: badge_bg,
        },
        Overlay::Text {
            x: 4,
            y: 54,
            size: BADGE_TEXT_SIZE,
            color: badge_fg,
            text: instance.primary_stat.to_string(),
        },
        // Ammo box in the bottom-right corner
        Overlay::Rect {
            x: 50,
            y: 56,
            width: 22,
            height: 16,
            color: AMMO_BOX_COLOR,
        },
    ];

    let ammo_route = definition
        .pointer("/equippingBlock/ammoType")
        .and_then(Value::as_u64)
        .and_then(ammo_icon_route);
    if let Some(route) = ammo_route {
        match ctx
            .fetch_asset(route)
            .map_err(anyhow::Error::from)
            .and_then(|bytes| ctx.pipeline.decode(&bytes).map_err(Into::into))
        {
            Ok(image) => overlays.push(Overlay::Icon {
                x: 52,
                y: 54,
                width: 20,
                height: 20,
                image,
            }),
            Err(e) => log::debug!("Ammo icon {} unavailable: {:#}", route, e),
        }
    }

    Ok(ctx
        .pipeline
        .compose(&icon, &overlays, ctx.device.image_spec()))
}

/// Character info tile: power level, race, class
pub fn info_tile(ctx: &DeckContext, character: &CharacterSummary) -> Vec<u8> {
    let race = definition_name(ctx, "RaceDefinition", character.race_hash);
    let class = definition_name(ctx, "ClassDefinition", character.class_hash);
    ctx.pipeline.text_tile(
        &[format!("lvl {}", character.light), race, class],
        BADGE_TEXT_SIZE,
        ctx.device.image_spec(),
    )
}

/// Dark gray filler for unused grid positions
pub fn filler_tile(ctx: &DeckContext) -> Vec<u8> {
    ctx.pipeline
        .solid_tile([50, 50, 50], &[], ctx.device.image_spec())
}

/// Display name of a definition record, degrading to a placeholder when
/// the lookup fails
fn definition_name(ctx: &DeckContext, table: &str, hash: u32) -> String {
    match ctx.manifest.get(table, hash) {
        Ok(definition) => definition
            .pointer("/displayProperties/name")
            .and_then(Value::as_str)
            .unwrap_or("?")
            .to_string(),
        Err(e) => {
            log::warn!("No display name for {} {}: {}", table, hash, e);
            "?".to_string()
        }
    }
}
