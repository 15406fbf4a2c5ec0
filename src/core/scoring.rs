use std::collections::HashSet;

use crate::core::distance::{distance_band, distance_km};
use crate::models::{Profile, ScoreBreakdown, ScoredCandidate};

/// Weight applied to the tag match score
const TAG_WEIGHT: u32 = 2;

/// Tag overlap between two profiles
#[derive(Debug, Clone, PartialEq)]
pub struct TagOverlap {
    /// Shared tags, in the order and spelling of the second list
    pub common_tags: Vec<String>,
    /// 0-100
    pub match_score: u32,
}

fn normalized_set(tags: &[String]) -> HashSet<String> {
    tags.iter().map(|t| t.trim().to_lowercase()).collect()
}

/// Case-insensitive tag overlap
///
/// `match_score = round(|A ∩ B| / max(|A|, |B|, 1) * 100)`, counting tags that only
/// differ by case once.
pub fn tag_overlap(tags_a: &[String], tags_b: &[String]) -> TagOverlap {
    let set_a = normalized_set(tags_a);
    let set_b = normalized_set(tags_b);

    let mut seen = HashSet::new();
    let common_tags: Vec<String> = tags_b
        .iter()
        .filter(|tag| {
            let key = tag.trim().to_lowercase();
            set_a.contains(&key) && seen.insert(key)
        })
        .cloned()
        .collect();

    let denominator = set_a.len().max(set_b.len()).max(1) as f64;
    let match_score = (common_tags.len() as f64 / denominator * 100.0).round() as u32;

    TagOverlap {
        common_tags,
        match_score,
    }
}

/// Interest overlap percentage: `round(|A ∩ B| / |A ∪ B| * 100)`, 0 for two empty sets
pub fn interest_overlap(interests_a: &[String], interests_b: &[String]) -> u8 {
    let set_a: HashSet<&str> = interests_a.iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = interests_b.iter().map(String::as_str).collect();

    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0;
    }
    let intersection = set_a.intersection(&set_b).count();

    (intersection as f64 / union as f64 * 100.0).round() as u8
}

/// Score a candidate from the viewer's point of view
///
/// `total = tag_match_score * 2 + distance_band(distance)`
pub fn score_candidate(viewer: &Profile, candidate: &Profile) -> ScoreBreakdown {
    let overlap = tag_overlap(&viewer.tags, &candidate.tags);
    let distance_km = distance_km(viewer.location, candidate.location);
    let distance_points = distance_band(distance_km);

    ScoreBreakdown {
        total: overlap.match_score * TAG_WEIGHT + distance_points,
        tag_match_score: overlap.match_score,
        distance_points,
        common_tags: overlap.common_tags,
        distance_km,
    }
}

/// Pick the highest-scoring candidate
///
/// Ties keep input order: the first candidate with the top score wins, so a window ordered
/// by recency prefers the most recent profile.
pub fn select_best(viewer: &Profile, candidates: Vec<Profile>) -> Option<ScoredCandidate> {
    let mut best: Option<ScoredCandidate> = None;

    for profile in candidates {
        let score = score_candidate(viewer, &profile);
        let replace = match &best {
            Some(current) => score.total > current.score.total,
            None => true,
        };
        if replace {
            best = Some(ScoredCandidate { profile, score });
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinates;
    use chrono::Utc;

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn create_test_profile(id: &str, tag_values: &[&str], location: Option<(f64, f64)>) -> Profile {
        Profile {
            user_id: id.to_string(),
            display_name: format!("User {}", id),
            age: 29,
            gender: None,
            gender_interests: vec![],
            tags: tags(tag_values),
            location: location.map(|(lat, lon)| Coordinates::new(lat, lon)),
            completion: 100,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_tag_overlap_reference_case() {
        let overlap = tag_overlap(&tags(&["#a", "#b"]), &tags(&["#b", "#c"]));
        assert_eq!(overlap.common_tags, vec!["#b"]);
        assert_eq!(overlap.match_score, 50);
    }

    #[test]
    fn test_tag_overlap_is_case_insensitive_and_keeps_b_order() {
        let overlap = tag_overlap(
            &tags(&["Hiking", "jazz", "Coffee"]),
            &tags(&["COFFEE", "chess", "hiking"]),
        );
        assert_eq!(overlap.common_tags, vec!["COFFEE", "hiking"]);
        assert_eq!(overlap.match_score, 67);
    }

    #[test]
    fn test_tag_overlap_empty_lists() {
        let overlap = tag_overlap(&[], &[]);
        assert!(overlap.common_tags.is_empty());
        assert_eq!(overlap.match_score, 0);
    }

    #[test]
    fn test_tag_overlap_duplicates_count_once() {
        let overlap = tag_overlap(&tags(&["a", "A"]), &tags(&["a", "a"]));
        assert_eq!(overlap.common_tags, vec!["a"]);
        assert_eq!(overlap.match_score, 100);
    }

    #[test]
    fn test_interest_overlap() {
        assert_eq!(interest_overlap(&tags(&["1", "2"]), &tags(&["2", "3"])), 33);
        assert_eq!(interest_overlap(&tags(&["1"]), &tags(&["1"])), 100);
        assert_eq!(interest_overlap(&[], &[]), 0);
    }

    #[test]
    fn test_score_weights_tags_double() {
        let viewer = create_test_profile("v", &["x", "y"], Some((0.0, 0.0)));
        let candidate = create_test_profile("c", &["x", "y"], Some((0.0, 0.01)));

        let score = score_candidate(&viewer, &candidate);
        assert_eq!(score.tag_match_score, 100);
        assert_eq!(score.distance_points, 50);
        assert_eq!(score.total, 250);
    }

    #[test]
    fn test_score_without_location() {
        let viewer = create_test_profile("v", &["x"], None);
        let candidate = create_test_profile("c", &["x"], Some((0.0, 0.0)));

        let score = score_candidate(&viewer, &candidate);
        assert_eq!(score.distance_km, None);
        assert_eq!(score.distance_points, 0);
        assert_eq!(score.total, 200);
    }

    #[test]
    fn test_select_best_prefers_first_on_tie() {
        let viewer = create_test_profile("v", &[], None);
        let candidates = vec![
            create_test_profile("newest", &[], None),
            create_test_profile("older", &[], None),
        ];

        let best = select_best(&viewer, candidates).unwrap();
        assert_eq!(best.profile.user_id, "newest");
    }

    #[test]
    fn test_select_best_picks_highest_score() {
        let viewer = create_test_profile("v", &["x"], Some((0.0, 0.0)));
        let candidates = vec![
            create_test_profile("far", &["x"], Some((10.0, 10.0))),
            create_test_profile("near", &["x"], Some((0.0, 0.01))),
        ];

        let best = select_best(&viewer, candidates).unwrap();
        assert_eq!(best.profile.user_id, "near");
    }

    #[test]
    fn test_select_best_empty() {
        let viewer = create_test_profile("v", &[], None);
        assert!(select_best(&viewer, vec![]).is_none());
    }
}
