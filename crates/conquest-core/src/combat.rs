use conquest_protocol::Buildings;
use serde::{Deserialize, Serialize};

use crate::rng::RandomSource;

const ATTACK_BARRACKS_BONUS: f64 = 0.1;
const DEFENSE_BARRACKS_BONUS: f64 = 0.15;
/// Inherent terrain advantage of the defender.
const DEFENDER_ADVANTAGE: f64 = 0.2;
const ATTACKER_LOSS_RATE: f64 = 0.3;
const DEFENDER_LOSS_RATE: f64 = 0.4;

/// Result of one battle between an attacking force and a region's garrison.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BattleOutcome {
    pub attacker_wins: bool,
    pub remaining_attackers: u32,
    pub remaining_defenders: u32,
    pub attack_power: f64,
    pub defense_power: f64,
}

/// Monte-Carlo estimate of a battle, for previews.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BattleOdds {
    pub win_probability: f64,
    pub avg_attacker_losses: f64,
    pub avg_defender_losses: f64,
}

/// `1 + U(-r, r)`. With `r == 0` no draw is taken.
fn swing<R: RandomSource + ?Sized>(randomness: f64, rng: &mut R) -> f64 {
    if randomness <= 0.0 {
        1.0
    } else {
        1.0 + rng.uniform(-randomness, randomness)
    }
}

/// Resolve one attack.
///
/// Power compares soldiers scaled by barracks bonuses, the defender's flat advantage and a
/// random swing of `+/- randomness`. Casualties are a fixed share of the opposing force plus a
/// random extra. A winning attacker keeps half of its survivors (at least one) and the garrison
/// is wiped out; a repelled attack is destroyed and the garrison keeps at least one soldier.
pub fn resolve<R: RandomSource + ?Sized>(
    attacking: u32,
    defending: u32,
    attacker_buildings: &Buildings,
    defender_buildings: &Buildings,
    randomness: f64,
    rng: &mut R,
) -> BattleOutcome {
    let attack_power = f64::from(attacking)
        * (1.0 + ATTACK_BARRACKS_BONUS * f64::from(attacker_buildings.barracks))
        * swing(randomness, rng);
    let defense_power = f64::from(defending)
        * (1.0 + DEFENSE_BARRACKS_BONUS * f64::from(defender_buildings.barracks) + DEFENDER_ADVANTAGE)
        * swing(randomness, rng);

    let attacker_casualties = (f64::from(defending) * ATTACKER_LOSS_RATE) as u32
        + rng.range_inclusive(0, defending / 4);
    let defender_casualties = (f64::from(attacking) * DEFENDER_LOSS_RATE) as u32
        + rng.range_inclusive(0, attacking / 3);

    let surviving_attackers = attacking.saturating_sub(attacker_casualties);
    let surviving_defenders = defending.saturating_sub(defender_casualties);

    let attacker_wins = attack_power > defense_power;
    let (remaining_attackers, remaining_defenders) = if attacker_wins {
        ((surviving_attackers / 2).max(1), 0)
    } else {
        (0, surviving_defenders.max(1))
    };

    BattleOutcome {
        attacker_wins,
        remaining_attackers,
        remaining_defenders,
        attack_power,
        defense_power,
    }
}

/// Run `simulations` battles without buildings and average the results.
pub fn simulate<R: RandomSource + ?Sized>(
    attacking: u32,
    defending: u32,
    simulations: u32,
    randomness: f64,
    rng: &mut R,
) -> BattleOdds {
    if simulations == 0 {
        return BattleOdds {
            win_probability: 0.0,
            avg_attacker_losses: 0.0,
            avg_defender_losses: 0.0,
        };
    }

    let none = Buildings::default();
    let mut wins = 0_u32;
    let mut attacker_losses = 0_u64;
    let mut defender_losses = 0_u64;

    for _ in 0..simulations {
        let outcome = resolve(attacking, defending, &none, &none, randomness, rng);
        if outcome.attacker_wins {
            wins += 1;
        }
        attacker_losses += u64::from(attacking - outcome.remaining_attackers.min(attacking));
        defender_losses += u64::from(defending - outcome.remaining_defenders.min(defending));
    }

    let n = f64::from(simulations);
    BattleOdds {
        win_probability: f64::from(wins) / n,
        avg_attacker_losses: attacker_losses as f64 / n,
        avg_defender_losses: defender_losses as f64 / n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{GameRng, ScriptedRng};

    #[test]
    fn deterministic_attacker_win_without_randomness() {
        // 10 vs 3 at r = 0: 10.0 > 3 * 1.2 = 3.6
        let mut rng = ScriptedRng::constant(0.0);
        let none = Buildings::default();
        let out = resolve(10, 3, &none, &none, 0.0, &mut rng);

        assert!(out.attacker_wins);
        assert_eq!(out.attack_power, 10.0);
        assert!((out.defense_power - 3.6).abs() < 1e-9);
        // casualties: floor(0.9) + 0 = 0 -> 10 survivors, halved
        assert_eq!(out.remaining_attackers, 5);
        assert_eq!(out.remaining_defenders, 0);
    }

    #[test]
    fn defender_holds_against_smaller_force() {
        let mut rng = ScriptedRng::constant(0.0);
        let none = Buildings::default();
        let out = resolve(4, 10, &none, &none, 0.0, &mut rng);

        assert!(!out.attacker_wins);
        assert_eq!(out.remaining_attackers, 0);
        // defender casualties: floor(1.6) + 0 = 1
        assert_eq!(out.remaining_defenders, 9);
    }

    #[test]
    fn winner_always_keeps_one_soldier() {
        let mut rng = ScriptedRng::constant(0.0);
        let none = Buildings::default();
        // 3 vs 2: casualties floor(0.6)=0, survivors 3 -> 3/2 = 1
        let out = resolve(3, 2, &none, &none, 0.0, &mut rng);
        assert!(out.attacker_wins);
        assert_eq!(out.remaining_attackers, 1);

        // 1 vs 1: defender holds, casualties floor(0.4) = 0 -> 1
        let out = resolve(1, 1, &none, &none, 0.0, &mut rng);
        assert!(!out.attacker_wins);
        assert_eq!(out.remaining_defenders, 1);
    }

    #[test]
    fn heavy_casualties_clamp_at_one() {
        // Top casualty rolls. 20 vs 30 at r = 0: 20 < 36, defender holds and loses
        // floor(8.0) + 6 = 14.
        let mut rng = ScriptedRng::constant(0.999);
        let none = Buildings::default();
        let out = resolve(20, 30, &none, &none, 0.0, &mut rng);
        assert!(!out.attacker_wins);
        assert_eq!(out.remaining_defenders, 16);

        // 17 vs 10 behind 4 barracks: 17 < 18, defender holds but loses 6 + 5 = 11 of 10.
        let fortified = Buildings {
            barracks: 4,
            ..Buildings::default()
        };
        let out = resolve(17, 10, &none, &fortified, 0.0, &mut rng);
        assert!(!out.attacker_wins);
        assert_eq!(out.remaining_defenders, 1);
    }

    #[test]
    fn barracks_tip_the_balance() {
        let mut rng = ScriptedRng::constant(0.0);
        let none = Buildings::default();
        let fortified = Buildings {
            barracks: 2,
            ..Buildings::default()
        };
        // 11 vs 10: 11 < 12; with two attacker barracks 11 * 1.2 = 13.2 > 12
        assert!(!resolve(11, 10, &none, &none, 0.0, &mut rng).attacker_wins);
        assert!(resolve(11, 10, &fortified, &none, 0.0, &mut rng).attacker_wins);
        // defender barracks: 10 * (1 + 0.3 + 0.2) = 15 > 13.2
        assert!(!resolve(11, 10, &fortified, &fortified, 0.0, &mut rng).attacker_wins);
    }

    #[test]
    fn swing_stays_within_randomness() {
        let mut rng = GameRng::seed_from_u64(5);
        let none = Buildings::default();
        for _ in 0..200 {
            let out = resolve(100, 50, &none, &none, 0.3, &mut rng);
            assert!(out.attack_power >= 70.0 && out.attack_power <= 130.0);
            assert!(out.defense_power >= 60.0 * 0.7 && out.defense_power <= 60.0 * 1.3);
            if out.attacker_wins {
                assert_eq!(out.remaining_defenders, 0);
                assert!(out.remaining_attackers >= 1);
            } else {
                assert_eq!(out.remaining_attackers, 0);
                assert!(out.remaining_defenders >= 1);
            }
        }
    }

    #[test]
    fn simulation_reflects_force_ratio() {
        let mut rng = GameRng::seed_from_u64(17);
        let strong = simulate(40, 5, 200, 0.3, &mut rng);
        let weak = simulate(5, 40, 200, 0.3, &mut rng);
        assert_eq!(strong.win_probability, 1.0);
        assert_eq!(weak.win_probability, 0.0);
        assert_eq!(weak.avg_attacker_losses, 5.0);

        let empty = simulate(10, 10, 0, 0.3, &mut rng);
        assert_eq!(empty.win_probability, 0.0);
    }
}
