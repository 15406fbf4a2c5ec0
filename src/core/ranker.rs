use std::sync::Arc;

use crate::core::{
    distance::format_distance,
    exclusion::ExclusionSet,
    filters::matches_candidate_query,
    scoring::{interest_overlap, select_best},
};
use crate::error::AppError;
use crate::models::{Candidate, CandidateQuery, PhotoRecord, Profile, ScoredCandidate};
use crate::services::{PhotoSource, Store};

/// Tunables for candidate selection
#[derive(Debug, Clone, Copy)]
pub struct RankerSettings {
    /// Minimum profile completion (percent) required to use discovery
    pub completion_threshold: u8,
    /// Number of candidates scored per request
    pub window_size: usize,
}

impl Default for RankerSettings {
    fn default() -> Self {
        Self {
            completion_threshold: 60,
            window_size: 10,
        }
    }
}

/// Result of a discovery request
#[derive(Debug, Clone)]
pub enum Discovery {
    Candidate(Candidate),
    NoProfiles,
}

/// Discovery orchestrator
///
/// # Pipeline Stages
/// 1. Completion gate on the viewer's profile
/// 2. Exclusion set (self, signalled, blocked), always fresh
/// 3. Reciprocal-interest and preference filtering in a bounded, recency-ordered window
/// 4. Scoring and selection of the single best candidate
/// 5. Best-effort enrichment (photos, interest overlap)
///
/// Stages 1-4 surface every dependency failure. Stage 5 never fails the request.
#[derive(Clone)]
pub struct CandidateRanker {
    store: Arc<dyn Store>,
    photos: Arc<dyn PhotoSource>,
    settings: RankerSettings,
}

impl CandidateRanker {
    pub fn new(store: Arc<dyn Store>, photos: Arc<dyn PhotoSource>, settings: RankerSettings) -> Self {
        Self {
            store,
            photos,
            settings,
        }
    }

    pub fn settings(&self) -> RankerSettings {
        self.settings
    }

    /// Select and enrich the next candidate for a viewer
    pub async fn next_candidate(&self, viewer_id: &str) -> Result<Discovery, AppError> {
        match self.select(viewer_id).await? {
            Some((viewer, scored)) => Ok(Discovery::Candidate(self.enrich(&viewer, scored).await)),
            None => {
                tracing::info!("No profiles left for user {}", viewer_id);
                Ok(Discovery::NoProfiles)
            }
        }
    }

    /// Selection stage
    ///
    /// Returns the viewer's profile with the chosen candidate, or `None` when nothing is
    /// eligible.
    pub async fn select(&self, viewer_id: &str) -> Result<Option<(Profile, ScoredCandidate)>, AppError> {
        let required = self.settings.completion_threshold;

        let viewer = match self.store.get_profile(viewer_id).await? {
            Some(profile) => profile,
            None => {
                return Err(AppError::ProfileIncomplete {
                    percentage: 0,
                    required,
                })
            }
        };

        if viewer.completion < required {
            return Err(AppError::ProfileIncomplete {
                percentage: viewer.completion,
                required,
            });
        }

        let excluded = ExclusionSet::compute(self.store.as_ref(), viewer_id).await?;

        let query = CandidateQuery {
            viewer_gender: viewer.declared_gender().map(str::to_lowercase),
            preferred_genders: viewer.gender_preference(),
            exclude_user_ids: excluded.to_vec(),
            limit: self.settings.window_size,
        };

        let mut window = self.store.candidate_window(&query).await?;
        let fetched = window.len();

        // The store already applied these filters; re-checking keeps an excluded id from
        // ever reaching the client even if a backend ignores part of the query.
        window.retain(|p| !excluded.contains(&p.user_id) && matches_candidate_query(p, &query));
        window.truncate(self.settings.window_size);

        if window.len() != fetched {
            tracing::warn!(
                "Store returned {} ineligible candidates for user {}",
                fetched - window.len(),
                viewer_id
            );
        }

        let best = select_best(&viewer, window);

        if let Some(chosen) = &best {
            tracing::info!(
                "Selected candidate {} for user {} (score {}, from {} in window)",
                chosen.profile.user_id,
                viewer_id,
                chosen.score.total,
                fetched
            );
        }

        Ok(best.map(|chosen| (viewer, chosen)))
    }

    /// Enrichment stage: failures degrade to empty values and are logged
    pub async fn enrich(&self, viewer: &Profile, scored: ScoredCandidate) -> Candidate {
        let candidate_id = scored.profile.user_id.as_str();
        let (photos, overlap) = tokio::join!(
            self.photos_or_empty(candidate_id),
            self.interest_overlap_or_zero(&viewer.user_id, candidate_id)
        );

        let ScoredCandidate { profile, score } = scored;
        let distance_label = score.distance_km.map(format_distance);

        Candidate {
            user_id: profile.user_id,
            display_name: profile.display_name,
            age: profile.age,
            gender: profile.gender,
            tags: profile.tags,
            score,
            distance_label,
            interest_overlap: overlap,
            photos,
        }
    }

    async fn photos_or_empty(&self, user_id: &str) -> Vec<PhotoRecord> {
        match self.photos.photos_for(user_id).await {
            Ok(photos) => photos,
            Err(e) => {
                tracing::warn!("Photo lookup failed for {}, returning none: {}", user_id, e);
                Vec::new()
            }
        }
    }

    async fn interest_overlap_or_zero(&self, viewer_id: &str, candidate_id: &str) -> u8 {
        let lookups = tokio::try_join!(
            self.store.interest_refs(viewer_id),
            self.store.interest_refs(candidate_id)
        );

        match lookups {
            Ok((mine, theirs)) => interest_overlap(&mine, &theirs),
            Err(e) => {
                tracing::warn!(
                    "Interest lookup failed for {} / {}, overlap set to 0: {}",
                    viewer_id,
                    candidate_id,
                    e
                );
                0
            }
        }
    }
}
