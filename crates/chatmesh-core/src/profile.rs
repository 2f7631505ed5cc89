//! Pure profile-merge logic: folding one conversation's `ProfileUpdates`
//! into a user's accumulated `UserProfile`.
//!
//! Merge rules:
//! - Most list fields are set-unions (case-insensitive, order-preserving,
//!   first occurrence wins for display casing).
//! - A new `dislikes` entry removes any matching `interests` entry (and
//!   vice versa is NOT symmetric: a new interest does not clear an old
//!   dislike -- an explicit "I don't like X anymore, I love it now" should
//!   show up as a dislike-of-the-dislike, which this rule already handles
//!   on the next turn).
//! - `personal_preferences` is replace-on-conflict: a newer entry with the
//!   same normalized key text replaces the older one instead of
//!   accumulating contradictory preferences (e.g. "prefers tea" then later
//!   "prefers coffee" keeps only "prefers coffee"). Conflict is detected by
//!   shared leading words (a cheap content-free heuristic, not an LLM call).

use chatmesh_types::{ProfileUpdates, UserProfile};
use chrono::Utc;

fn normalize(entry: &str) -> String {
    entry.trim().to_lowercase()
}

fn union_insert(existing: &mut Vec<String>, new_items: &[String]) {
    for item in new_items {
        let key = normalize(item);
        if !existing.iter().any(|e| normalize(e) == key) {
            existing.push(item.clone());
        }
    }
}

fn remove_matching(existing: &mut Vec<String>, removed_items: &[String]) {
    for item in removed_items {
        let key = normalize(item);
        existing.retain(|e| normalize(e) != key);
    }
}

/// Two strings "conflict" if they share their first word -- a cheap proxy
/// for "about the same topic" without an LLM round trip.
fn shares_topic(a: &str, b: &str) -> bool {
    let first_word = |s: &str| normalize(s).split_whitespace().next().unwrap_or("").to_string();
    let wa = first_word(a);
    let wb = first_word(b);
    !wa.is_empty() && wa == wb
}

fn replace_on_conflict(existing: &mut Vec<String>, new_items: &[String]) {
    for item in new_items {
        existing.retain(|e| !shares_topic(e, item));
        if !existing.iter().any(|e| normalize(e) == normalize(item)) {
            existing.push(item.clone());
        }
    }
}

/// Fold `updates` into `profile`, returning the merged result. Pure and
/// deterministic: the same `(profile, updates)` pair always merges the
/// same way, which is what makes the document-store upsert idempotent
/// against completion-event redelivery.
pub fn merge_profile(mut profile: UserProfile, updates: ProfileUpdates) -> UserProfile {
    union_insert(&mut profile.output_preferences, &updates.output_preferences);
    replace_on_conflict(&mut profile.personal_preferences, &updates.personal_preferences);
    union_insert(&mut profile.assistant_preferences, &updates.assistant_preferences);
    union_insert(&mut profile.knowledge, &updates.knowledge);
    union_insert(&mut profile.family_and_friends, &updates.family_and_friends);
    union_insert(&mut profile.work_profile, &updates.work_profile);
    union_insert(&mut profile.goals, &updates.goals);

    // Interests/dislikes are mutually exclusive: a new dislike clears the
    // matching interest, and vice versa.
    remove_matching(&mut profile.interests, &updates.dislikes);
    union_insert(&mut profile.interests, &updates.interests);
    remove_matching(&mut profile.dislikes, &updates.interests);
    union_insert(&mut profile.dislikes, &updates.dislikes);

    profile.last_updated = Utc::now();
    profile
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> UserProfile {
        UserProfile::empty("u1")
    }

    fn updates_with_interests(interests: &[&str]) -> ProfileUpdates {
        ProfileUpdates {
            interests: interests.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn union_adds_new_items_without_duplicating() {
        let profile = merge_profile(empty(), updates_with_interests(&["hiking"]));
        let profile = merge_profile(profile, updates_with_interests(&["hiking", "cooking"]));
        assert_eq!(profile.interests, vec!["hiking".to_string(), "cooking".to_string()]);
    }

    #[test]
    fn dislike_removes_matching_interest() {
        let profile = merge_profile(empty(), updates_with_interests(&["cilantro"]));
        let updates = ProfileUpdates {
            dislikes: vec!["cilantro".to_string()],
            ..Default::default()
        };
        let profile = merge_profile(profile, updates);
        assert!(profile.interests.is_empty());
        assert_eq!(profile.dislikes, vec!["cilantro".to_string()]);
    }

    #[test]
    fn interest_removes_matching_dislike() {
        let updates = ProfileUpdates {
            dislikes: vec!["mushrooms".to_string()],
            ..Default::default()
        };
        let profile = merge_profile(empty(), updates);
        let profile = merge_profile(profile, updates_with_interests(&["mushrooms"]));
        assert!(profile.dislikes.is_empty());
        assert_eq!(profile.interests, vec!["mushrooms".to_string()]);
    }

    #[test]
    fn personal_preference_replaces_same_topic() {
        let updates1 = ProfileUpdates {
            personal_preferences: vec!["prefers tea in the morning".to_string()],
            ..Default::default()
        };
        let profile = merge_profile(empty(), updates1);
        let updates2 = ProfileUpdates {
            personal_preferences: vec!["prefers coffee in the morning".to_string()],
            ..Default::default()
        };
        let profile = merge_profile(profile, updates2);
        assert_eq!(profile.personal_preferences, vec!["prefers coffee in the morning".to_string()]);
    }

    #[test]
    fn unrelated_personal_preferences_accumulate() {
        let updates1 = ProfileUpdates {
            personal_preferences: vec!["prefers tea".to_string()],
            ..Default::default()
        };
        let profile = merge_profile(empty(), updates1);
        let updates2 = ProfileUpdates {
            personal_preferences: vec!["enjoys jazz music".to_string()],
            ..Default::default()
        };
        let profile = merge_profile(profile, updates2);
        assert_eq!(profile.personal_preferences.len(), 2);
    }

    #[test]
    fn merge_is_commutative_for_disjoint_updates() {
        let a = ProfileUpdates { goals: vec!["learn rust".into()], ..Default::default() };
        let b = ProfileUpdates { goals: vec!["run a marathon".into()], ..Default::default() };

        let ab = merge_profile(merge_profile(empty(), a.clone()), b.clone());
        let ba = merge_profile(merge_profile(empty(), b), a);

        let mut ab_goals = ab.goals.clone();
        let mut ba_goals = ba.goals.clone();
        ab_goals.sort();
        ba_goals.sort();
        assert_eq!(ab_goals, ba_goals);
    }

    #[test]
    fn merge_updates_last_updated_timestamp() {
        let profile = empty();
        let before = profile.last_updated;
        std::thread::sleep(std::time::Duration::from_millis(2));
        let merged = merge_profile(profile, ProfileUpdates::default());
        assert!(merged.last_updated >= before);
    }
}
