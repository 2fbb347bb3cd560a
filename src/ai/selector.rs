//! Weighted behavior selection.

use rand::{Rng, RngCore};

use super::profile::{BehaviorId, BehaviorProfile, WeightedBehavior};

/// Pick one option with probability proportional to its weight.
///
/// Options with a non-positive or non-finite weight never win. Iteration
/// order is the slice order, so the same draw always yields the same pick.
pub fn choose_weighted<'a, T>(options: &'a [(T, f32)], rng: &mut dyn RngCore) -> Option<&'a T> {
    let usable = |weight: f32| weight.is_finite() && weight > 0.0;
    let total: f32 = options
        .iter()
        .map(|(_, weight)| *weight)
        .filter(|weight| usable(*weight))
        .sum();
    if total <= 0.0 {
        return None;
    }

    let draw = rng.gen_range(0.0..total);
    let mut cumulative = 0.0;
    let mut last = None;
    for (item, weight) in options {
        if !usable(*weight) {
            continue;
        }
        cumulative += weight;
        last = Some(item);
        if cumulative >= draw {
            return Some(item);
        }
    }
    // Rounding can leave the draw a hair above the final sum.
    last
}

/// Filter a profile down to the candidates allowed right now and draw one.
///
/// A candidate qualifies when its allowed-predecessor list is empty or names
/// `previous`, and `eligible` accepts it. Aggressive candidates have their
/// weight scaled by `aggression_multiplier` while `failed_attack` is set.
pub fn select_behavior(
    profile: &BehaviorProfile,
    previous: Option<BehaviorId>,
    failed_attack: bool,
    aggression_multiplier: f32,
    mut eligible: impl FnMut(BehaviorId, &WeightedBehavior) -> bool,
    rng: &mut dyn RngCore,
) -> Option<BehaviorId> {
    let previous_name = previous
        .and_then(|id| profile.entry(id))
        .map(|entry| entry.name.as_str());

    let candidates: Vec<(BehaviorId, f32)> = profile
        .entries()
        .filter(|(_, entry)| entry.may_follow(previous_name))
        .filter(|(id, entry)| eligible(*id, entry))
        .map(|(id, entry)| {
            let weight = if failed_attack && entry.is_aggressive() {
                entry.weight * aggression_multiplier
            } else {
                entry.weight
            };
            (id, weight)
        })
        .collect();

    choose_weighted(&candidates, rng).copied()
}
