//! Token-set fuzzy matching.
//!
//! Word order and repeated words are ignored: both strings are split on
//! whitespace into token sets, and the shared tokens are compared against
//! each side's leftovers with an Indel (insert/delete) edit ratio. A string
//! whose tokens are a subset of the other's scores a perfect match.

use std::collections::BTreeSet;

/// Token-set ratio in `[0, 100]`.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersect: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let diff_ab: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let diff_ba: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    if !intersect.is_empty() && (diff_ab.is_empty() || diff_ba.is_empty()) {
        return 100.0;
    }

    let diff_ab_joined = diff_ab.join(" ");
    let diff_ba_joined = diff_ba.join(" ");
    let ab_len = diff_ab_joined.chars().count();
    let ba_len = diff_ba_joined.chars().count();
    let sect_len = intersect.join(" ").chars().count();

    let sep = usize::from(sect_len != 0);
    let sect_ab_len = sect_len + sep + ab_len;
    let sect_ba_len = sect_len + sep + ba_len;

    let dist = indel_distance(&diff_ab_joined, &diff_ba_joined);
    let result = norm_ratio(dist, sect_ab_len + sect_ba_len);

    if sect_len == 0 {
        return result;
    }

    // The intersection is a prefix of both "sect + diff" strings, so their
    // distance to the bare intersection is just the diff plus separator.
    let sect_ab_ratio = norm_ratio(sep + ab_len, sect_len + sect_ab_len);
    let sect_ba_ratio = norm_ratio(sep + ba_len, sect_len + sect_ba_len);

    result.max(sect_ab_ratio).max(sect_ba_ratio)
}

/// [`token_set_ratio`] scaled to `[0, 1]`.
pub fn normalized_token_set_ratio(a: &str, b: &str) -> f64 {
    token_set_ratio(a, b) / 100.0
}

fn norm_ratio(dist: usize, lensum: usize) -> f64 {
    if lensum == 0 {
        return 100.0;
    }
    100.0 * (1.0 - dist as f64 / lensum as f64)
}

/// Insertions plus deletions needed to turn `a` into `b` (no substitutions).
fn indel_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    a.len() + b.len() - 2 * lcs_len(&a, &b)
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subset_is_perfect() {
        assert_eq!(token_set_ratio("adder half", "explain the half adder"), 100.0);
    }

    #[test]
    fn test_word_order_ignored() {
        assert_eq!(token_set_ratio("state machine", "machine state"), 100.0);
    }

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(token_set_ratio("", "anything"), 0.0);
        assert_eq!(token_set_ratio("x", "   "), 0.0);
    }

    #[test]
    fn test_disjoint_uses_indel_ratio() {
        // "abc" vs "abd": LCS 2, indel distance 2, lensum 6.
        let r = token_set_ratio("abc", "abd");
        assert!((r - 100.0 * (1.0 - 2.0 / 6.0)).abs() < 1e-9);
    }

    #[test]
    fn test_partial_overlap() {
        // sect = "adder" (5), diff_ab = "full" (4), diff_ba = "circuit" (7)
        // sect_ab_ratio = 100 * (1 - 5/15) beats the diff-vs-diff ratio.
        let r = token_set_ratio("adder full", "adder circuit");
        assert!((r - 100.0 * (1.0 - 5.0 / 15.0)).abs() < 1e-9);
    }

    #[test]
    fn test_ocr_noise_tolerated() {
        assert!(token_set_ratio("multiplexer", "multiplexor") > 85.0);
    }

    #[test]
    fn test_normalized_range() {
        let r = normalized_token_set_ratio("counter ripple", "design a ripple counter");
        assert!((0.0..=1.0).contains(&r));
    }

    #[test]
    fn test_lcs() {
        let a: Vec<char> = "kitten".chars().collect();
        let b: Vec<char> = "sitting".chars().collect();
        assert_eq!(lcs_len(&a, &b), 4);
    }
}
