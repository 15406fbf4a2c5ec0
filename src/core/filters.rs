use crate::models::{CandidateQuery, Profile};

/// Reciprocal-interest filter
///
/// A viewer who declared a gender only sees profiles open to that gender (or to `all`).
/// A viewer without a declared gender sees everyone.
#[inline]
pub fn matches_reciprocal_interest(candidate: &Profile, viewer_gender: Option<&str>) -> bool {
    match viewer_gender {
        Some(gender) => candidate.is_interested_in(gender),
        None => true,
    }
}

/// Viewer's own gender preference, applied to the candidate's gender
///
/// `None` means the viewer has no preference (empty set or wildcard).
#[inline]
pub fn matches_viewer_preference(candidate: &Profile, preferred_genders: Option<&[String]>) -> bool {
    let Some(preferred) = preferred_genders else {
        return true;
    };

    match candidate.declared_gender() {
        Some(gender) => preferred.iter().any(|g| g.eq_ignore_ascii_case(gender)),
        None => false,
    }
}

/// Check if a profile satisfies every constraint of a candidate query
#[inline]
pub fn matches_candidate_query(profile: &Profile, query: &CandidateQuery) -> bool {
    if query.exclude_user_ids.iter().any(|id| id == &profile.user_id) {
        return false;
    }

    matches_reciprocal_interest(profile, query.viewer_gender.as_deref())
        && matches_viewer_preference(profile, query.preferred_genders.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn create_test_profile(id: &str, gender: Option<&str>, interests: &[&str]) -> Profile {
        Profile {
            user_id: id.to_string(),
            display_name: format!("User {}", id),
            age: 27,
            gender: gender.map(str::to_string),
            gender_interests: interests.iter().map(|s| s.to_string()).collect(),
            tags: vec![],
            location: None,
            completion: 100,
            created_at: Utc::now(),
        }
    }

    fn create_test_query(viewer_gender: Option<&str>, preferred: Option<&[&str]>) -> CandidateQuery {
        CandidateQuery {
            viewer_gender: viewer_gender.map(str::to_string),
            preferred_genders: preferred.map(|p| p.iter().map(|s| s.to_string()).collect()),
            exclude_user_ids: vec!["excluded".to_string()],
            limit: 10,
        }
    }

    #[test]
    fn test_reciprocal_interest_requires_viewer_gender() {
        let candidate = create_test_profile("c", Some("female"), &["female"]);
        assert!(!matches_reciprocal_interest(&candidate, Some("male")));
        assert!(matches_reciprocal_interest(&candidate, Some("female")));
    }

    #[test]
    fn test_reciprocal_interest_wildcard() {
        let candidate = create_test_profile("c", Some("female"), &["all"]);
        assert!(matches_reciprocal_interest(&candidate, Some("male")));
    }

    #[test]
    fn test_undeclared_viewer_sees_everyone() {
        let candidate = create_test_profile("c", Some("female"), &["female"]);
        assert!(matches_reciprocal_interest(&candidate, None));
    }

    #[test]
    fn test_viewer_preference() {
        let woman = create_test_profile("w", Some("female"), &["all"]);
        let unknown = create_test_profile("u", None, &["all"]);
        let preferred = vec!["female".to_string()];

        assert!(matches_viewer_preference(&woman, Some(preferred.as_slice())));
        assert!(!matches_viewer_preference(&unknown, Some(preferred.as_slice())));
        assert!(matches_viewer_preference(&unknown, None));
    }

    #[test]
    fn test_query_excludes_ids() {
        let query = create_test_query(None, None);
        let excluded = create_test_profile("excluded", Some("male"), &["all"]);
        let fine = create_test_profile("fine", Some("male"), &["all"]);

        assert!(!matches_candidate_query(&excluded, &query));
        assert!(matches_candidate_query(&fine, &query));
    }

    #[test]
    fn test_query_combines_both_directions() {
        let query = create_test_query(Some("male"), Some(&["female"]));
        let wants_men = create_test_profile("a", Some("female"), &["male"]);
        let wants_women = create_test_profile("b", Some("female"), &["female"]);
        let man = create_test_profile("c", Some("male"), &["male"]);

        assert!(matches_candidate_query(&wants_men, &query));
        assert!(!matches_candidate_query(&wants_women, &query));
        assert!(!matches_candidate_query(&man, &query));
    }
}
