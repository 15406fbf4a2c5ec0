// Unit tests for Kindred scoring and filtering

use chrono::{Duration, Utc};
use kindred::core::{
    distance::{distance_band, distance_km, format_distance, haversine_distance},
    filters::{matches_candidate_query, matches_reciprocal_interest, matches_viewer_preference},
    scoring::{interest_overlap, score_candidate, select_best, tag_overlap},
};
use kindred::models::{CandidateQuery, Coordinates, Profile};

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn create_test_profile(id: &str, gender: Option<&str>, interests: &[&str]) -> Profile {
    Profile {
        user_id: id.to_string(),
        display_name: format!("User {}", id),
        age: 30,
        gender: gender.map(str::to_string),
        gender_interests: strings(interests),
        tags: vec![],
        location: None,
        completion: 100,
        created_at: Utc::now(),
    }
}

#[test]
fn test_haversine_distance_zero() {
    let distance = haversine_distance(40.7128, -74.0060, 40.7128, -74.0060);
    assert!(distance < 0.01);
}

#[test]
fn test_haversine_distance_manhattan_to_brooklyn() {
    // Manhattan to Brooklyn is approximately 5-10 km
    let distance = haversine_distance(40.7580, -73.9855, 40.6782, -73.9442);
    assert!(distance > 5.0 && distance < 15.0);
}

#[test]
fn test_one_degree_at_equator_rounds_to_111_2() {
    let d = distance_km(Some(Coordinates::new(0.0, 0.0)), Some(Coordinates::new(0.0, 1.0)));
    assert_eq!(d, Some(111.2));
    assert_eq!(distance_band(d), 0);
}

#[test]
fn test_distance_labels() {
    assert_eq!(format_distance(0.0), "less than 1 km away");
    assert_eq!(format_distance(1.0), "1.0 km away");
    assert_eq!(format_distance(111.2), "111 km away");
}

#[test]
fn test_tag_overlap_reference_case() {
    let overlap = tag_overlap(&strings(&["#a", "#b"]), &strings(&["#b", "#c"]));
    assert_eq!(overlap.common_tags, vec!["#b".to_string()]);
    assert_eq!(overlap.match_score, 50);
}

#[test]
fn test_tag_overlap_is_symmetric_in_score() {
    let a = strings(&["x", "y", "z"]);
    let b = strings(&["Y"]);
    assert_eq!(tag_overlap(&a, &b).match_score, tag_overlap(&b, &a).match_score);
    assert_eq!(tag_overlap(&a, &b).match_score, 33);
}

#[test]
fn test_interest_overlap_bounds() {
    assert_eq!(interest_overlap(&strings(&["a"]), &strings(&["b"])), 0);
    assert_eq!(interest_overlap(&strings(&["a", "b"]), &strings(&["b", "a"])), 100);
}

#[test]
fn test_reciprocal_interest() {
    let open = create_test_profile("open", Some("female"), &["all"]);
    let picky = create_test_profile("picky", Some("female"), &["female"]);
    let unset = create_test_profile("unset", Some("female"), &[]);

    assert!(matches_reciprocal_interest(&open, Some("male")));
    assert!(!matches_reciprocal_interest(&picky, Some("male")));
    assert!(!matches_reciprocal_interest(&unset, Some("male")));
    // A viewer without a declared gender is not filtered by reciprocity
    assert!(matches_reciprocal_interest(&picky, None));
}

#[test]
fn test_viewer_preference() {
    let woman = create_test_profile("w", Some("Female"), &[]);
    let undeclared = create_test_profile("u", None, &[]);
    let preference = strings(&["female"]);

    assert!(matches_viewer_preference(&woman, Some(preference.as_slice())));
    assert!(!matches_viewer_preference(&undeclared, Some(preference.as_slice())));
    assert!(matches_viewer_preference(&undeclared, None));
}

#[test]
fn test_candidate_query_excludes_ids() {
    let candidate = create_test_profile("c", Some("female"), &["male"]);
    let mut query = CandidateQuery {
        viewer_gender: Some("male".to_string()),
        preferred_genders: Some(strings(&["female"])),
        exclude_user_ids: vec![],
        limit: 10,
    };
    assert!(matches_candidate_query(&candidate, &query));

    query.exclude_user_ids = strings(&["c"]);
    assert!(!matches_candidate_query(&candidate, &query));
}

#[test]
fn test_scoring_prefers_close_shared_interests() {
    let mut viewer = create_test_profile("v", None, &[]);
    viewer.tags = strings(&["#jazz", "#coffee"]);
    viewer.location = Some(Coordinates::new(52.52, 13.405));

    let mut near = create_test_profile("near", None, &[]);
    near.tags = strings(&["#coffee"]);
    near.location = Some(Coordinates::new(52.53, 13.41));

    let mut far = create_test_profile("far", None, &[]);
    far.tags = strings(&["#jazz", "#coffee"]);
    far.location = Some(Coordinates::new(48.137, 11.575));

    let near_score = score_candidate(&viewer, &near);
    let far_score = score_candidate(&viewer, &far);
    assert_eq!(near_score.total, 50 * 2 + 50);
    assert_eq!(far_score.total, 100 * 2);

    let best = select_best(&viewer, vec![near, far]).unwrap();
    assert_eq!(best.profile.user_id, "far");
}

#[test]
fn test_select_best_tie_keeps_window_order() {
    let viewer = create_test_profile("v", None, &[]);
    let mut newer = create_test_profile("newer", None, &[]);
    let mut older = create_test_profile("older", None, &[]);
    newer.created_at = Utc::now();
    older.created_at = Utc::now() - Duration::days(3);

    let best = select_best(&viewer, vec![newer, older]).unwrap();
    assert_eq!(best.profile.user_id, "newer");
}
