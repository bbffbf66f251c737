//! Error suggestion utilities
//!
//! Edit-distance search over the names visible at an error site, backing the
//! "did you mean" notes on unknown-name errors.

/// Calculate Levenshtein edit distance between two strings.
///
/// Returns the minimum number of single-character edits (insertions,
/// deletions, or substitutions) required to transform `a` into `b`.
/// Wagner-Fischer dynamic programming, O(m*n) time and space.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let len_a = a.chars().count();
    let len_b = b.chars().count();

    if len_a == 0 {
        return len_b;
    }
    if len_b == 0 {
        return len_a;
    }

    let mut matrix = vec![vec![0; len_b + 1]; len_a + 1];

    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=len_b {
        matrix[0][j] = j;
    }

    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    for i in 1..=len_a {
        for j in 1..=len_b {
            let cost = if a_chars[i - 1] == b_chars[j - 1] { 0 } else { 1 };

            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[len_a][len_b]
}

/// Find the best matching identifier from a list of candidates.
///
/// Only candidates within a third of the target's length are considered, so
/// short names do not attract arbitrary suggestions.
///
/// Returns the best match together with a confidence score in `0.0..=1.0`.
pub fn find_similar(target: &str, candidates: &[String]) -> Option<(String, f32)> {
    let threshold = (target.chars().count() / 3).max(1);

    candidates
        .iter()
        .filter(|c| c.as_str() != target)
        .map(|c| (c, edit_distance(target, c)))
        .filter(|(_, d)| *d <= threshold)
        .min_by_key(|(_, d)| *d)
        .map(|(c, d)| {
            let confidence = 1.0 - d as f32 / target.chars().count().max(1) as f32;
            (c.clone(), confidence)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_of_equal_strings_is_zero() {
        assert_eq!(edit_distance("INTEGER", "INTEGER"), 0);
    }

    #[test]
    fn distance_counts_single_edits() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
    }

    #[test]
    fn similar_name_is_found() {
        let candidates = vec!["INTEGER".to_string(), "BOOLEAN".to_string()];
        let (suggestion, confidence) = find_similar("INTEGR", &candidates).unwrap();
        assert_eq!(suggestion, "INTEGER");
        assert!(confidence > 0.5);
    }

    #[test]
    fn distant_names_are_not_suggested() {
        let candidates = vec!["BOOLEAN".to_string()];
        assert!(find_similar("xyz", &candidates).is_none());
    }
}
