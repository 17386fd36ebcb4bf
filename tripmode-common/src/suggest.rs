//! Fuzzy "did you mean" suggestions for user-supplied names
//!
//! Used to point at the closest CSV header when a required column is missing,
//! and at the closest option value when a configuration string is unknown.

use strsim::{jaro_winkler, normalized_levenshtein};

/// Minimum combined similarity for a suggestion (0.0 to 1.0)
const MIN_SIMILARITY: f64 = 0.65;

/// Find the best fuzzy match among `candidates`
///
/// Score is Jaro-Winkler 70% + normalized Levenshtein 30%. Jaro-Winkler
/// dominates because header typos are mostly transpositions and truncations
/// ("Lattitude", "Timestmap"); Levenshtein catches dropped characters.
fn find_best_fuzzy_match<S: AsRef<str>>(input: &str, candidates: &[S]) -> Option<String> {
    let input_lower = input.to_lowercase();
    let mut best_match = None;
    let mut best_score = 0.0f64;

    for candidate in candidates {
        let candidate = candidate.as_ref();
        let candidate_lower = candidate.to_lowercase();

        let jw_score = jaro_winkler(&input_lower, &candidate_lower);
        let lev_score = normalized_levenshtein(&input_lower, &candidate_lower);
        let score = (jw_score * 0.7) + (lev_score * 0.3);

        if score >= MIN_SIMILARITY && score > best_score {
            best_score = score;
            best_match = Some(candidate.to_string());
        }
    }

    best_match
}

/// Suggest a correction for `name` among `candidates`
///
/// A case-insensitive exact match is returned as-is (the usual cause of a
/// "missing" header is `latitude` vs `Latitude`). An exact, case-sensitive
/// match needs no suggestion and yields `None`.
pub fn suggest_correction<S: AsRef<str>>(name: &str, candidates: &[S]) -> Option<String> {
    if candidates.iter().any(|c| c.as_ref() == name) {
        return None;
    }

    if let Some(c) = candidates
        .iter()
        .find(|c| c.as_ref().eq_ignore_ascii_case(name))
    {
        return Some(c.as_ref().to_string());
    }

    find_best_fuzzy_match(name, candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggest_correction_case_only() {
        let headers = ["deviceid", "timestamp", "latitude", "longitude"];
        assert_eq!(
            suggest_correction("DeviceID", &headers),
            Some("deviceid".to_string())
        );
        assert_eq!(
            suggest_correction("Timestamp", &headers),
            Some("timestamp".to_string())
        );
    }

    #[test]
    fn test_suggest_correction_typos() {
        let headers = ["RouteID", "Latitude", "Longitude", "Sequence"];
        assert_eq!(
            suggest_correction("Sequnce", &headers),
            Some("Sequence".to_string())
        );
        assert_eq!(
            suggest_correction("RouteId", &headers),
            Some("RouteID".to_string())
        );
    }

    #[test]
    fn test_suggest_correction_exact_match() {
        let headers = ["Latitude", "Longitude", "Type"];
        assert_eq!(suggest_correction("Type", &headers), None);
    }

    #[test]
    fn test_suggest_correction_no_match() {
        let headers = ["foo", "bar"];
        assert_eq!(suggest_correction("Longitude", &headers), None);
        let empty: [&str; 0] = [];
        assert_eq!(suggest_correction("Longitude", &empty), None);
    }

    #[test]
    fn test_option_value_suggestion() {
        let values = ["geodesic", "haversine"];
        assert_eq!(
            suggest_correction("geodesik", &values),
            Some("geodesic".to_string())
        );
    }
}
