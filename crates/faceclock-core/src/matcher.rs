use crate::types::{Embedding, KnownFaces};

/// Default cosine-distance threshold for a positive match.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.4;

/// One enrolled user whose reference embedding lies within the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub name: String,
    /// Cosine distance to the probe, in [0, 2]. Lower = more similar.
    pub distance: f32,
}

/// Strategy for comparing a probe embedding against the enrolled faces.
pub trait Matcher {
    /// Every enrolled face strictly closer than `threshold`, in store order.
    fn match_all(&self, probe: &Embedding, gallery: &KnownFaces, threshold: f32) -> Vec<Match>;
}

/// Cosine-distance matcher over a linear scan of the gallery.
///
/// Results keep the gallery's insertion order; they are not sorted by
/// distance. Entries whose dimensionality differs from the probe are skipped.
pub struct CosineMatcher;

impl Matcher for CosineMatcher {
    fn match_all(&self, probe: &Embedding, gallery: &KnownFaces, threshold: f32) -> Vec<Match> {
        let mut matches = Vec::new();

        for user in gallery.iter() {
            if user.embedding.len() != probe.len() {
                tracing::warn!(
                    user = %user.name,
                    expected = probe.len(),
                    actual = user.embedding.len(),
                    "skipping enrolled face with mismatched dimension"
                );
                continue;
            }

            let distance = probe.cosine_distance(&user.embedding);
            tracing::trace!(user = %user.name, distance, "compared");
            if distance < threshold {
                matches.push(Match {
                    name: user.name.clone(),
                    distance,
                });
            }
        }

        matches
    }
}

/// [`CosineMatcher::match_all`] as a free function.
pub fn match_all(probe: &Embedding, gallery: &KnownFaces, threshold: f32) -> Vec<Match> {
    CosineMatcher.match_all(probe, gallery, threshold)
}
