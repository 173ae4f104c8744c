//! Approximate string matching on a 0-100 scale.
//!
//! Edit distance comes from `strsim`. On top of it sit the usual
//! fuzzy-ratio variants (plain, token-sorted, token-set and best-window
//! partial), combined into [`weighted_ratio`].
//!
//! Resolution helpers here are cutoff-agnostic: [`best_match`] always
//! reports the best score found so callers can log near misses, and each
//! caller applies its own acceptance threshold.

use std::collections::BTreeSet;

use serde::Serialize;

/// A scored candidate, identified by its position in the candidate list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyMatch {
    pub index: usize,
    pub score: f64,
}

/// An accepted resolution of a query to some entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult<T> {
    pub entity: T,
    pub score: f64,
    pub query: String,
}

/// Normalized Levenshtein similarity scaled to 100.
pub fn ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b) * 100.0
}

/// [`ratio`] after sorting whitespace-separated tokens of both sides.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sort_tokens(a), &sort_tokens(b))
}

fn sort_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Shared and one-sided token sets, each sorted.
struct TokenSets<'a> {
    shared: Vec<&'a str>,
    only_a: Vec<&'a str>,
    only_b: Vec<&'a str>,
}

fn token_sets<'a>(a: &'a str, b: &'a str) -> Option<TokenSets<'a>> {
    let ta: BTreeSet<&str> = a.split_whitespace().collect();
    let tb: BTreeSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() || tb.is_empty() {
        return None;
    }
    Some(TokenSets {
        shared: ta.intersection(&tb).copied().collect(),
        only_a: ta.difference(&tb).copied().collect(),
        only_b: tb.difference(&ta).copied().collect(),
    })
}

/// Compares the shared tokens against each side's full token set, so extra
/// words on one side cost little.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let Some(sets) = token_sets(a, b) else {
        return 0.0;
    };
    if !sets.shared.is_empty() && (sets.only_a.is_empty() || sets.only_b.is_empty()) {
        return 100.0;
    }

    let shared = sets.shared.join(" ");
    let with_a = [sets.shared.as_slice(), sets.only_a.as_slice()].concat().join(" ");
    let with_b = [sets.shared.as_slice(), sets.only_b.as_slice()].concat().join(" ");

    let mut best = ratio(&with_a, &with_b);
    if !shared.is_empty() {
        best = best.max(ratio(&shared, &with_a)).max(ratio(&shared, &with_b));
    }
    best
}

/// Best [`ratio`] of the shorter string against every equally long window
/// of the longer one, including windows clipped at either end.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    if short.is_empty() {
        return if long.is_empty() { 100.0 } else { 0.0 };
    }

    let needle: String = short.iter().collect();
    let width = short.len();
    let clipped = (1..width).flat_map(|k| [0..k, long.len() - k..long.len()]);
    let full = (0..=long.len() - width).map(|start| start..start + width);

    let mut best = 0.0f64;
    for window in full.chain(clipped) {
        let hay: String = long[window].iter().collect();
        best = best.max(ratio(&needle, &hay));
        if best >= 100.0 {
            break;
        }
    }
    best
}

/// Any shared token is a full hit; otherwise the best partial score of the
/// sorted tokens or of the tokens unique to each side.
pub fn partial_token_ratio(a: &str, b: &str) -> f64 {
    let Some(sets) = token_sets(a, b) else {
        return 0.0;
    };
    if !sets.shared.is_empty() {
        return 100.0;
    }
    partial_ratio(&sort_tokens(a), &sort_tokens(b))
        .max(partial_ratio(&sets.only_a.join(" "), &sets.only_b.join(" ")))
}

const TOKEN_SCALE: f64 = 0.95;

/// Combined scorer used for every resolution.
///
/// Similar-length strings take the best of the plain and token ratios.
/// Strings of very different length also consider partial windows, scaled
/// down so a short substring hit never outranks a full match.
pub fn weighted_ratio(a: &str, b: &str) -> f64 {
    let la = a.chars().count();
    let lb = b.chars().count();
    if la == 0 || lb == 0 {
        return 0.0;
    }

    let base = ratio(a, b);
    let len_ratio = la.max(lb) as f64 / la.min(lb) as f64;

    if len_ratio < 1.5 {
        let token = token_sort_ratio(a, b).max(token_set_ratio(a, b));
        return base.max(token * TOKEN_SCALE);
    }

    let partial_scale = if len_ratio < 8.0 { 0.9 } else { 0.6 };
    let partial = partial_ratio(a, b) * partial_scale;
    let partial_token = partial_token_ratio(a, b) * TOKEN_SCALE * partial_scale;

    base.max(partial).max(partial_token)
}

/// Score `query` against every candidate and return the best one.
///
/// Ties keep the earliest candidate. Returns `None` for an empty pool or a
/// blank query; otherwise the best score is returned whatever its value.
pub fn best_match<S: AsRef<str>>(query: &str, candidates: &[S]) -> Option<FuzzyMatch> {
    if query.trim().is_empty() {
        return None;
    }

    let mut best: Option<FuzzyMatch> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let score = weighted_ratio(query, candidate.as_ref());
        if best.is_none_or(|b| score > b.score) {
            best = Some(FuzzyMatch { index, score });
        }
    }
    best
}

/// Up to `limit` candidates scoring strictly above `cutoff`, best first.
/// Equal scores keep candidate order.
pub fn top_matches<S: AsRef<str>>(
    query: &str,
    candidates: &[S],
    limit: usize,
    cutoff: f64,
) -> Vec<FuzzyMatch> {
    if query.trim().is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut hits: Vec<FuzzyMatch> = candidates
        .iter()
        .enumerate()
        .map(|(index, c)| FuzzyMatch {
            index,
            score: weighted_ratio(query, c.as_ref()),
        })
        .filter(|m| m.score > cutoff)
        .collect();

    // Stable sort keeps store order among equal scores.
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(limit);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn test_ratio_basics() {
        assert!(approx(ratio("abc", "abc"), 100.0));
        assert!(approx(ratio("abc", ""), 0.0));
        assert!(approx(ratio("", ""), 100.0));
        // Three edits over seven characters.
        assert!(approx(ratio("kitten", "sitting"), 400.0 / 7.0));
    }

    #[test]
    fn test_token_sort_ignores_order() {
        assert!(approx(token_sort_ratio("doe jane", "jane doe"), 100.0));
        assert!(ratio("doe jane", "jane doe") < 100.0);
    }

    #[test]
    fn test_partial_ratio_finds_window() {
        assert!(approx(
            partial_ratio("dinner plans", "are we still on for dinner plans tonight"),
            100.0
        ));
        assert!(approx(partial_ratio("", "abc"), 0.0));
    }

    #[test]
    fn test_partial_ratio_windows_inside_words() {
        assert!(approx(partial_ratio("biol", "notecardbiology"), 100.0));
        // Best window is the clipped tail "ab".
        assert!(approx(partial_ratio("abcd", "xxxxxxab"), 50.0));
    }

    #[test]
    fn test_token_set_ratio() {
        assert!(approx(token_set_ratio("jane doe", "doe jane smith"), 100.0));
        assert!(approx(token_set_ratio("jane doe", "jane smith"), 50.0));
        assert!(approx(token_set_ratio("", "jane"), 0.0));
    }

    #[test]
    fn test_partial_token_ratio_shared_word() {
        assert!(approx(partial_token_ratio("dinner", "see you at dinner"), 100.0));
        assert!(partial_token_ratio("lunch", "see you at dinner") < 100.0);
    }

    #[test]
    fn test_weighted_ratio_scales_partial_hits() {
        let score = weighted_ratio("dinner plans", "are we still on for dinner plans tonight");
        // Partial hit of 100 scaled by 0.9 for a length ratio under 8.
        assert!(approx(score, 90.0));
        assert!(approx(weighted_ratio("", "abc"), 0.0));
    }

    #[test]
    fn test_weighted_ratio_filename_scenario() {
        let score = weighted_ratio("me biology notecard", "notecard biol");
        assert!(score > 40.0, "score was {score}");
        assert!(score > weighted_ratio("me biology notecard", "syllabus"));
    }

    #[test]
    fn test_best_match_empty_pool() {
        let empty: [&str; 0] = [];
        assert_eq!(best_match("anything", &empty), None);
        assert_eq!(best_match("", &empty), None);
    }

    #[test]
    fn test_best_match_blank_query() {
        assert_eq!(best_match("   ", &["a", "b"]), None);
    }

    #[test]
    fn test_best_match_ties_keep_first() {
        let m = best_match("alpha", &["alpha", "beta", "alpha"]).unwrap();
        assert_eq!(m.index, 0);
        assert!(approx(m.score, 100.0));
    }

    #[test]
    fn test_best_match_reports_low_scores() {
        let m = best_match("zzzz", &["abcd"]).unwrap();
        assert_eq!(m.index, 0);
        assert!(approx(m.score, 0.0));
    }

    #[test]
    fn test_top_matches_orders_and_cuts() {
        let candidates = ["lunch tomorrow", "dinner plans?", "dinner", "nothing here"];
        let hits = top_matches("dinner plans", &candidates, 5, 60.0);
        let order: Vec<usize> = hits.iter().map(|m| m.index).collect();
        assert_eq!(order[0], 1);
        assert!(order.contains(&2));
        assert!(!order.contains(&3));
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));

        let limited = top_matches("dinner plans", &candidates, 1, 60.0);
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_top_matches_equal_scores_keep_order() {
        let hits = top_matches("same", &["same", "other", "same"], 5, 60.0);
        let order: Vec<usize> = hits.iter().map(|m| m.index).collect();
        assert_eq!(order, vec![0, 2]);
    }
}
