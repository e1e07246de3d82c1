// THEORY:
// OCR output is noisy, so text comparison offers two lenses:
// - a character-sequence similarity ratio (2 * matched / total characters),
//   found by recursively taking the longest common block and matching the
//   pieces on either side of it. No character is ever treated as junk, so on
//   long texts the ratio can be higher than a matcher that drops frequent
//   characters would report;
// - a symmetric difference of whitespace-separated words, for a readable list
//   of what appeared or disappeared.

use std::collections::{BTreeSet, HashMap};

/// Similarity of two strings in [0, 1]; 1.0 when both are empty.
///
/// Every character takes part in block matching: there is no popular-character
/// ("autojunk") pruning, whatever the length of `b`.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matched_characters(&a, &b) as f64 / total as f64
}

/// Number of characters covered by the matching blocks of `a` and `b`.
fn matched_characters(a: &[char], b: &[char]) -> usize {
    let mut positions: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, c) in b.iter().enumerate() {
        positions.entry(*c).or_default().push(j);
    }

    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(a, &positions, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            pending.push((i + size, ahi, j + size, bhi));
        }
    }
    matched
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]`, earliest in `a` on ties.
fn longest_match(
    a: &[char],
    positions: &HashMap<char, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    // Length of the match ending at (i - 1, j), keyed by j.
    let mut run_lengths: HashMap<usize, usize> = HashMap::new();

    for (i, c) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut next_run_lengths = HashMap::new();
        if let Some(js) = positions.get(c) {
            for &j in js {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let previous = j.checked_sub(1).and_then(|p| run_lengths.get(&p)).copied();
                let k = previous.unwrap_or(0) + 1;
                next_run_lengths.insert(j, k);
                if k > best_size {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_size = k;
                }
            }
        }
        run_lengths = next_run_lengths;
    }

    (best_i, best_j, best_size)
}

/// Words present in exactly one of the two texts, sorted.
pub fn token_difference(a: &str, b: &str) -> Vec<String> {
    let left: BTreeSet<&str> = a.split_whitespace().collect();
    let right: BTreeSet<&str> = b.split_whitespace().collect();
    left.symmetric_difference(&right).map(|s| s.to_string()).collect()
}

/// The first `max_chars` characters of `text`.
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_and_empty_texts_match_fully() {
        assert_eq!(sequence_ratio("Sign in", "Sign in"), 1.0);
        assert_eq!(sequence_ratio("", ""), 1.0);
        assert_eq!(sequence_ratio("abc", ""), 0.0);
    }

    #[test]
    fn ratio_counts_matching_blocks() {
        // "abcd" vs "bcde": one block "bcd" of 3 → 2 * 3 / 8.
        assert!((sequence_ratio("abcd", "bcde") - 0.75).abs() < 1e-12);
        // Two blocks on either side of a changed character.
        assert!((sequence_ratio("Total: 10", "Total: 19") - 16.0 / 18.0).abs() < 1e-12);
    }

    #[test]
    fn ratio_is_symmetric_for_simple_edits() {
        let a = "Welcome back, Alice";
        let b = "Welcome back, Alicia";
        assert!((sequence_ratio(a, b) - sequence_ratio(b, a)).abs() < 1e-12);
        assert!(sequence_ratio(a, b) > 0.9);
    }

    #[test]
    fn frequent_characters_in_long_texts_still_match() {
        let a = format!("{}b", "a".repeat(300));
        let b = format!("{}c", "a".repeat(300));
        assert!((sequence_ratio(&a, &b) - 600.0 / 602.0).abs() < 1e-12);
    }

    #[test]
    fn token_difference_is_symmetric_and_sorted() {
        let diff = token_difference("Home  About Contact", "Home About Pricing\nContact Blog");
        assert_eq!(diff, vec!["Blog".to_string(), "Pricing".to_string()]);
        assert!(token_difference("a b c", "c b a").is_empty());
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("héllo wörld", 4), "héll");
        assert_eq!(excerpt("short", 200), "short");
    }
}
