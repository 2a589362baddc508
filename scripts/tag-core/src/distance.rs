/// Levenshtein edit distance: the minimum number of single-character
/// insertions, deletions and substitutions turning `a` into `b`.
///
/// Counts Unicode scalar values, not bytes. The matrix is evaluated one row at
/// a time, so memory stays at two rows of `b.len() + 1`.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, &ch_a) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &ch_b) in b.iter().enumerate() {
            curr[j + 1] = if ch_a == ch_b {
                prev[j]
            } else {
                let substitution = prev[j] + 1;
                let insertion = curr[j] + 1;
                let deletion = prev[j + 1] + 1;
                substitution.min(insertion).min(deletion)
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
    fn identical_strings() {
        assert_eq!(levenshtein_distance("landscape", "landscape"), 0);
        assert_eq!(levenshtein_distance("", ""), 0);
    }

    #[test]
    fn single_edits() {
        assert_eq!(levenshtein_distance("landscape", "landscapes"), 1);
        assert_eq!(levenshtein_distance("portrait", "portait"), 1);
        assert_eq!(levenshtein_distance("cat", "bat"), 1);
        assert_eq!(levenshtein_distance("cat", "cart"), 1);
        assert_eq!(levenshtein_distance("cart", "cat"), 1);
    }

    #[test]
    fn multiple_edits() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("sunset", "sunrise"), 3);
    }

    #[test]
    fn empty_side_costs_full_length() {
        assert_eq!(levenshtein_distance("test", ""), 4);
        assert_eq!(levenshtein_distance("", "test"), 4);
    }

    #[test]
    fn symmetric() {
        let pairs = [
            ("kitten", "sitting"),
            ("photgraphy", "photography"),
            ("noir et blanc", "blanc noir"),
            ("a", "abc"),
        ];
        for (a, b) in pairs {
            assert_eq!(levenshtein_distance(a, b), levenshtein_distance(b, a));
        }
    }

    #[test]
    fn counts_characters_not_bytes() {
        assert_eq!(levenshtein_distance("café", "cafe"), 1);
        assert_eq!(levenshtein_distance("東京", ""), 2);
    }
}
