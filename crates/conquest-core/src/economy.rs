//! Coin income, barracks production, building prices and garrison decay.
//!
//! Everything here is a pure function of its inputs. The session decides when to pay out.

use std::collections::BTreeMap;

use conquest_protocol::{BuildingKind, Buildings, RegionId};

use crate::rules::CostProfile;

const COINS_PER_REGION: u32 = 10;
const FACTORY_FLAT_BONUS: u32 = 25;
const BANK_FLAT_BONUS: u32 = 50;
const FACTORY_MULTIPLIER_STEP: f64 = 0.5;
const SOLDIERS_PER_BARRACKS: u32 = 5;
const DECAY_RATE: f64 = 0.1;
const SOLDIERS_PER_THREAT: u32 = 5;

const REGION_BASE_VALUE: u32 = 10;
const REGION_VALUE_PER_BUILDING: u32 = 50;
const REGION_VALUE_PER_SOLDIER: u32 = 2;

/// Coins earned per turn for `owned_regions` regions and the player's summed buildings.
///
/// `(10 * regions + 25 * factories + 50 * banks) * (1 + 0.5 * factories)`, truncated.
pub fn income(owned_regions: usize, buildings: &Buildings) -> u32 {
    let base = COINS_PER_REGION as f64 * owned_regions as f64
        + f64::from(FACTORY_FLAT_BONUS * buildings.factory)
        + f64::from(BANK_FLAT_BONUS * buildings.bank);
    let multiplier = 1.0 + FACTORY_MULTIPLIER_STEP * f64::from(buildings.factory);
    (base * multiplier) as u32
}

/// Soldiers a region's barracks add to its garrison each turn.
pub fn soldier_production(buildings: &Buildings) -> u32 {
    SOLDIERS_PER_BARRACKS.saturating_mul(buildings.barracks)
}

pub fn building_cost(kind: BuildingKind, profile: CostProfile) -> u32 {
    profile.cost(kind)
}

/// Garrison after one decay tick: loses 10%, at least one soldier, never below zero.
pub fn apply_decay(soldiers: u32) -> u32 {
    let loss = ((f64::from(soldiers) * DECAY_RATE) as u32).max(1);
    soldiers.saturating_sub(loss)
}

/// Attractiveness of a region as an attack target.
pub fn region_value(soldiers: u32, buildings: &Buildings) -> u32 {
    REGION_BASE_VALUE
        + REGION_VALUE_PER_BUILDING * buildings.total()
        + REGION_VALUE_PER_SOLDIER * soldiers
}

/// Split `total` soldiers across `regions`, weighting threatened ones.
///
/// Each region starts at an even share and gains five per point of threat. The shares are then
/// scaled back so they add up to `total`, truncating each, so the sum may fall a few short.
pub fn soldier_allocation(
    total: u32,
    regions: &[RegionId],
    threats: &BTreeMap<RegionId, u32>,
) -> BTreeMap<RegionId, u32> {
    if regions.is_empty() {
        return BTreeMap::new();
    }
    let base = total / regions.len() as u32;
    let mut allocation: BTreeMap<RegionId, u32> = regions
        .iter()
        .map(|id| {
            let threat = threats.get(id).copied().unwrap_or(0);
            (id.clone(), base.saturating_add(threat.saturating_mul(SOLDIERS_PER_THREAT)))
        })
        .collect();

    let allocated: u64 = allocation.values().map(|&n| u64::from(n)).sum();
    if allocated > 0 {
        let scale = f64::from(total) / allocated as f64;
        for share in allocation.values_mut() {
            *share = (f64::from(*share) * scale) as u32;
        }
    }
    allocation
}
