//! Reward shaping for the decision loop.
//!
//! Sums survival, vital, threat, resource, milestone and social terms into a
//! single unclamped scalar. Rare milestone edges dominate on purpose.

use super::config::RewardWeights;
use super::observation::Observation;

/// Points represented by a full health or food bar.
const VITAL_POINTS: f64 = 20.0;

/// Computes shaped rewards from consecutive observations.
pub struct RewardShaper;

impl RewardShaper {
    /// Computes the reward for moving from `old` to `new`.
    ///
    /// # Components
    ///
    /// 1. **Survival**: constant bonus every tick.
    /// 2. **Vitals**: scaled health/food deltas, losses weighted harder below
    ///    the low-vital threshold.
    /// 3. **Death**: fixed penalty on the `just_died` 0→1 edge.
    /// 4. **Threats**: bonus when hostiles leave, penalty when they appear or close in.
    /// 5. **Resources**: positive count deltas weighted by tier.
    /// 6. **Milestones**: one-time bonus on each tool/progression 0→1 edge.
    /// 7. **Social**: bonus when an ally comes into range.
    /// 8. **Failure**: fixed penalty if the action did not succeed.
    pub fn compute(
        old: &Observation,
        new: &Observation,
        action_succeeded: bool,
        weights: &RewardWeights,
    ) -> f64 {
        let mut reward = weights.survival_bonus;

        reward += Self::vital_term(
            old.health,
            new.health,
            weights.health_gain,
            weights.health_loss,
            weights.health_loss_critical,
            weights.low_vital_threshold,
        );
        reward += Self::vital_term(
            old.food,
            new.food,
            weights.food_gain,
            weights.food_loss,
            weights.food_loss_critical,
            weights.low_vital_threshold,
        );

        if rose(old.just_died, new.just_died) {
            reward += weights.death_penalty;
        }

        reward += Self::threat_term(old, new, weights);

        let resources = [
            (old.wood, new.wood, weights.wood),
            (old.stone, new.stone, weights.stone),
            (old.coal, new.coal, weights.coal),
            (old.iron_ore, new.iron_ore, weights.iron_ore),
            (old.iron_ingot, new.iron_ingot, weights.iron_ingot),
            (old.obsidian, new.obsidian, weights.obsidian),
            (old.eye_of_ender, new.eye_of_ender, weights.eye_of_ender),
        ];
        for (before, after, weight) in resources {
            if after > before {
                reward += (after - before) * weight;
            }
        }

        let milestones = [
            (old.wooden_pickaxe, new.wooden_pickaxe, weights.wooden_pickaxe),
            (old.stone_pickaxe, new.stone_pickaxe, weights.stone_pickaxe),
            (old.iron_pickaxe, new.iron_pickaxe, weights.iron_pickaxe),
            (old.diamond_pickaxe, new.diamond_pickaxe, weights.diamond_pickaxe),
            (old.portal_built, new.portal_built, weights.portal_built),
            (old.entered_nether, new.entered_nether, weights.entered_nether),
            (old.entered_end, new.entered_end, weights.entered_end),
            (old.dragon_defeated, new.dragon_defeated, weights.dragon_defeated),
        ];
        for (before, after, weight) in milestones {
            if rose(before, after) {
                reward += weight;
            }
        }

        if rose(old.ally_nearby, new.ally_nearby) {
            reward += weights.ally_arrived;
        }

        if !action_succeeded {
            reward += weights.action_failed;
        }

        reward
    }

    fn vital_term(
        before: f64,
        after: f64,
        gain: f64,
        loss: f64,
        loss_critical: f64,
        threshold: f64,
    ) -> f64 {
        let delta_points = (after - before) * VITAL_POINTS;
        if delta_points > 0.0 {
            gain * delta_points
        } else if after < threshold {
            loss_critical * delta_points
        } else {
            loss * delta_points
        }
    }

    fn threat_term(old: &Observation, new: &Observation, weights: &RewardWeights) -> f64 {
        let was_near = old.enemy_nearby >= 1.0;
        let is_near = new.enemy_nearby >= 1.0;
        match (was_near, is_near) {
            (true, false) => weights.enemy_cleared,
            (false, true) => weights.enemy_appeared,
            (true, true) if new.enemy_proximity > old.enemy_proximity => weights.enemy_closer,
            _ => 0.0,
        }
    }
}

/// True on a 0→1 edge of a binary component.
fn rose(before: f64, after: f64) -> bool {
    before < 0.5 && after >= 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steady() -> Observation {
        Observation {
            health: 1.0,
            food: 1.0,
            in_overworld: 1.0,
            ..Observation::default()
        }
    }

    #[test]
    fn idle_tick_earns_survival_bonus() {
        let w = RewardWeights::default();
        let r = RewardShaper::compute(&steady(), &steady(), true, &w);
        assert!((r - w.survival_bonus).abs() < 1e-12);
    }

    #[test]
    fn failed_action_is_penalised() {
        let w = RewardWeights::default();
        let r = RewardShaper::compute(&steady(), &steady(), false, &w);
        assert!((r - (w.survival_bonus + w.action_failed)).abs() < 1e-12);
    }

    #[test]
    fn health_loss_is_harsher_when_critical() {
        let w = RewardWeights::default();
        let mut hurt = steady();
        hurt.health = 0.9;
        let mild = RewardShaper::compute(&steady(), &hurt, true, &w);

        let mut low = steady();
        low.health = 0.3;
        let mut lower = steady();
        lower.health = 0.2;
        let critical = RewardShaper::compute(&low, &lower, true, &w);

        assert!(mild < 0.0);
        assert!(critical < mild);
    }

    #[test]
    fn death_edge_dominates() {
        let w = RewardWeights::default();
        let mut dead = steady();
        dead.health = 0.0;
        dead.just_died = 1.0;
        let r = RewardShaper::compute(&steady(), &dead, true, &w);
        assert!(r <= w.death_penalty);

        // Staying dead is not a second edge.
        let again = RewardShaper::compute(&dead, &dead, true, &w);
        assert!(again > w.death_penalty);
    }

    #[test]
    fn enemy_edges() {
        let w = RewardWeights::default();
        let mut threatened = steady();
        threatened.enemy_nearby = 1.0;
        threatened.enemy_proximity = 0.2;
        let mut closer = threatened;
        closer.enemy_proximity = 0.6;

        let appear = RewardShaper::compute(&steady(), &threatened, true, &w);
        let clear = RewardShaper::compute(&threatened, &steady(), true, &w);
        let close = RewardShaper::compute(&threatened, &closer, true, &w);

        assert!((appear - (w.survival_bonus + w.enemy_appeared)).abs() < 1e-12);
        assert!((clear - (w.survival_bonus + w.enemy_cleared)).abs() < 1e-12);
        assert!((close - (w.survival_bonus + w.enemy_closer)).abs() < 1e-12);
    }

    #[test]
    fn resources_weighted_by_tier() {
        let w = RewardWeights::default();
        let one_item = 1.0 / 64.0;
        let mut wood = steady();
        wood.wood = one_item;
        let mut ingot = steady();
        ingot.iron_ingot = one_item;

        let r_wood = RewardShaper::compute(&steady(), &wood, true, &w);
        let r_ingot = RewardShaper::compute(&steady(), &ingot, true, &w);
        assert!(r_ingot > r_wood);
        assert!(r_wood > w.survival_bonus);
    }

    #[test]
    fn resource_loss_is_not_penalised() {
        let w = RewardWeights::default();
        let mut rich = steady();
        rich.stone = 0.5;
        let r = RewardShaper::compute(&rich, &steady(), true, &w);
        assert!((r - w.survival_bonus).abs() < 1e-12);
    }

    #[test]
    fn simultaneous_milestones_sum_without_cap() {
        let w = RewardWeights::default();
        let mut after = steady();
        after.portal_built = 1.0;
        after.entered_nether = 1.0;
        after.dragon_defeated = 1.0;
        let r = RewardShaper::compute(&steady(), &after, true, &w);
        let expected = w.survival_bonus + w.portal_built + w.entered_nether + w.dragon_defeated;
        assert!((r - expected).abs() < 1e-9);
    }

    #[test]
    fn ally_arrival_bonus() {
        let w = RewardWeights::default();
        let mut with_ally = steady();
        with_ally.ally_nearby = 1.0;
        let r = RewardShaper::compute(&steady(), &with_ally, true, &w);
        assert!((r - (w.survival_bonus + w.ally_arrived)).abs() < 1e-12);
    }
}
