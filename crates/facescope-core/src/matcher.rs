//! Identity matching of a probe encoding against the gallery.

use crate::types::{Embedding, KnownFace, MatchResult};
use serde::Deserialize;

/// Default maximum Euclidean distance for a match between unit-norm ArcFace
/// encodings (cosine similarity ≈ 0.395).
pub const DEFAULT_TOLERANCE: f32 = 1.10;

/// Boolean match of `probe` against each known encoding, in gallery order.
pub fn compare_faces(known: &[Embedding], probe: &Embedding, tolerance: f32) -> Vec<bool> {
    known
        .iter()
        .map(|k| k.euclidean_distance(probe) <= tolerance)
        .collect()
}

/// Strategy for resolving a probe encoding to a gallery identity.
pub trait Matcher {
    fn compare(&self, probe: &Embedding, gallery: &[KnownFace]) -> MatchResult;
}

/// Takes the first gallery entry within tolerance, in insertion order.
///
/// Two enrolled identities that both fall within tolerance resolve to
/// whichever was enrolled first, not to the closer one.
#[derive(Debug, Clone, Copy)]
pub struct FirstMatch {
    pub tolerance: f32,
}

impl Matcher for FirstMatch {
    fn compare(&self, probe: &Embedding, gallery: &[KnownFace]) -> MatchResult {
        gallery
            .iter()
            .enumerate()
            .map(|(i, known)| (i, known, known.encoding.euclidean_distance(probe)))
            .find(|(_, _, distance)| *distance <= self.tolerance)
            .map(|(index, known, distance)| MatchResult {
                name: known.name.clone(),
                index: Some(index),
                distance: Some(distance),
            })
            .unwrap_or_else(MatchResult::unknown)
    }
}

/// Takes the closest gallery entry within tolerance.
#[derive(Debug, Clone, Copy)]
pub struct BestMatch {
    pub tolerance: f32,
}

impl Matcher for BestMatch {
    fn compare(&self, probe: &Embedding, gallery: &[KnownFace]) -> MatchResult {
        let mut best: Option<(usize, f32)> = None;
        for (i, known) in gallery.iter().enumerate() {
            let distance = known.encoding.euclidean_distance(probe);
            if distance <= self.tolerance && best.map_or(true, |(_, d)| distance < d) {
                best = Some((i, distance));
            }
        }

        match best {
            Some((index, distance)) => MatchResult {
                name: gallery[index].name.clone(),
                index: Some(index),
                distance: Some(distance),
            },
            None => MatchResult::unknown(),
        }
    }
}

/// Selects the matcher implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    #[default]
    First,
    Best,
}

impl MatchPolicy {
    pub fn matcher(self, tolerance: f32) -> Box<dyn Matcher> {
        match self {
            MatchPolicy::First => Box::new(FirstMatch { tolerance }),
            MatchPolicy::Best => Box::new(BestMatch { tolerance }),
        }
    }
}

impl std::str::FromStr for MatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(MatchPolicy::First),
            "best" => Ok(MatchPolicy::Best),
            other => Err(format!("unknown match policy '{other}' (expected 'first' or 'best')")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UNKNOWN_NAME;

    fn known(name: &str, values: Vec<f32>) -> KnownFace {
        KnownFace { name: name.into(), encoding: Embedding::new(values), attributes: None }
    }

    #[test]
    fn test_compare_faces_flags() {
        let known = vec![
            Embedding::new(vec![1.0, 0.0]),
            Embedding::new(vec![0.0, 1.0]),
        ];
        let probe = Embedding::new(vec![1.0, 0.1]);
        assert_eq!(compare_faces(&known, &probe, 0.5), vec![true, false]);
    }

    #[test]
    fn test_identical_probe_matches() {
        let gallery = vec![
            known("bob", vec![0.0, 1.0, 0.0]),
            known("alice", vec![1.0, 0.0, 0.0]),
        ];
        let probe = Embedding::new(vec![1.0, 0.0, 0.0]);
        let result = FirstMatch { tolerance: DEFAULT_TOLERANCE }.compare(&probe, &gallery);
        assert_eq!(result.name, "alice");
        assert_eq!(result.index, Some(1));
        assert_eq!(result.distance, Some(0.0));
    }

    #[test]
    fn test_empty_gallery_is_unknown() {
        let probe = Embedding::new(vec![1.0, 0.0]);
        for policy in [MatchPolicy::First, MatchPolicy::Best] {
            let result = policy.matcher(DEFAULT_TOLERANCE).compare(&probe, &[]);
            assert_eq!(result.name, UNKNOWN_NAME);
            assert!(!result.is_match());
        }
    }

    #[test]
    fn test_no_entry_within_tolerance() {
        let gallery = vec![known("bob", vec![0.0, 1.0])];
        let probe = Embedding::new(vec![1.0, 0.0]);
        let result = FirstMatch { tolerance: 0.6 }.compare(&probe, &gallery);
        assert_eq!(result, MatchResult::unknown());
    }

    #[test]
    fn test_first_match_wins_over_closer_entry() {
        let gallery = vec![
            known("first", vec![0.5, 0.0]),
            known("closer", vec![0.9, 0.0]),
        ];
        let probe = Embedding::new(vec![1.0, 0.0]);
        let result = FirstMatch { tolerance: 0.6 }.compare(&probe, &gallery);
        assert_eq!(result.name, "first");
    }

    #[test]
    fn test_best_match_picks_closest() {
        let gallery = vec![
            known("first", vec![0.5, 0.0]),
            known("closer", vec![0.9, 0.0]),
        ];
        let probe = Embedding::new(vec![1.0, 0.0]);
        let result = BestMatch { tolerance: 0.6 }.compare(&probe, &gallery);
        assert_eq!(result.name, "closer");
        assert_eq!(result.index, Some(1));
    }

    #[test]
    fn test_duplicate_names_resolve_to_first_index() {
        let gallery = vec![
            known("twin", vec![1.0, 0.0]),
            known("twin", vec![1.0, 0.0]),
        ];
        let probe = Embedding::new(vec![1.0, 0.0]);
        assert_eq!(FirstMatch { tolerance: 0.1 }.compare(&probe, &gallery).index, Some(0));
    }

    #[test]
    fn test_match_policy_from_str() {
        assert_eq!("First".parse::<MatchPolicy>(), Ok(MatchPolicy::First));
        assert_eq!(" best ".parse::<MatchPolicy>(), Ok(MatchPolicy::Best));
        assert!("nearest".parse::<MatchPolicy>().is_err());
    }
}
