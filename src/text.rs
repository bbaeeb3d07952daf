#![forbid(unsafe_code)]

//! Title normalization and fuzzy comparison helpers.
//!
//! Titles coming from the dataset and from the catalog differ in casing,
//! punctuation and word order ("The Letter | Omeleto" vs "the letter short
//! film"). Everything here works on Unicode scalar values so non-Latin titles
//! compare the same way Latin ones do.

/// Lower-cases `text`, turns every character that is not a word character or
/// whitespace into a space, collapses whitespace runs and trims the result.
///
/// Word characters are alphanumerics plus `_`.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let replaced: String = lowered
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || ch == '_' || ch.is_whitespace() {
                ch
            } else {
                ' '
            }
        })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Similarity between `a` and `b` on a 0–100 scale that ignores word order.
///
/// Both inputs are split on whitespace, their tokens sorted and re-joined,
/// and the joined strings are compared with [`indel_ratio`].
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    indel_ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn sorted_tokens(text: &str) -> String {
    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Normalized Indel similarity: `100 * (1 - distance / (len_a + len_b))`,
/// where the distance only counts insertions and deletions.
pub fn indel_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    let lcs = longest_common_subsequence(&a, &b);
    let distance = total - 2 * lcs;
    100.0 * (1.0 - distance as f64 / total as f64)
}

fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    // Single rolling row over `b`; `diagonal` carries row[j - 1] from the
    // previous iteration of `a`.
    let mut row = vec![0usize; b.len() + 1];
    for &ca in a {
        let mut diagonal = 0;
        for (j, &cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == cb {
                diagonal + 1
            } else {
                above.max(row[j])
            };
            diagonal = above;
        }
    }
    row[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_punctuation_and_case() {
        assert_eq!(normalize("The Letter | Omeleto"), "the letter omeleto");
        assert_eq!(normalize("  Hello,   World!!  "), "hello world");
        assert_eq!(normalize("Don't-Stop"), "don t stop");
    }

    #[test]
    fn normalize_keeps_underscores_and_unicode_letters() {
        assert_eq!(normalize("snake_case Title"), "snake_case title");
        assert_eq!(normalize("Café — Noël"), "café noël");
    }

    #[test]
    fn normalize_is_idempotent() {
        let samples = [
            "",
            "   ",
            "The Letter | Omeleto",
            "A\tB\nC",
            "¿Qué pasa?",
            "!!!",
            "Short Film: \"Stay\" (2019)",
        ];
        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "sample {sample:?}");
        }
    }

    #[test]
    fn token_sort_ratio_ignores_word_order() {
        assert_eq!(token_sort_ratio("letter the", "the letter"), 100.0);
    }

    #[test]
    fn indel_ratio_matches_known_values() {
        // LCS("abcd", "abce") = 3, distance = 8 - 6 = 2.
        assert!((indel_ratio("abcd", "abce") - 75.0).abs() < 1e-9);
        assert_eq!(indel_ratio("", ""), 100.0);
        assert_eq!(indel_ratio("abc", ""), 0.0);
        assert_eq!(indel_ratio("abc", "xyz"), 0.0);
    }

    #[test]
    fn token_sort_ratio_scores_suffix_variants() {
        let score = token_sort_ratio("the letter omeleto", "the letter short film");
        assert!(score < 80.0, "unexpected score {score}");
        let close = token_sort_ratio("the letter short film", "the letter short film");
        assert_eq!(close, 100.0);
    }
}
