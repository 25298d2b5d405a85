use regex::Regex;
use std::sync::OnceLock;

const ARTICLES: [&str; 3] = ["the", "a", "an"];

/// Canonical form of a title used for comparisons.
///
/// "The Lord of the Rings: The Return of the King (2003)" and
/// "Lord of the Rings - The Return of the King" both become
/// `"lord of the rings the return of the king"`.
#[must_use]
pub fn normalize_title(title: &str) -> String {
    static YEAR_SUFFIX: OnceLock<Regex> = OnceLock::new();
    let re = YEAR_SUFFIX
        .get_or_init(|| Regex::new(r"\s*[\(\[]\d{4}[\)\]]\s*$").expect("Invalid regex"));

    let mut lower = re.replace(title, "").to_lowercase();

    // "Matrix, The" sorts like "The Matrix"
    for article in ARTICLES {
        let suffix = format!(", {article}");
        if lower.ends_with(&suffix) {
            lower.truncate(lower.len() - suffix.len());
            break;
        }
    }

    let mut cleaned = String::with_capacity(lower.len());
    for c in lower.chars() {
        match c {
            '&' => cleaned.push_str(" and "),
            '\'' | '\u{2019}' | '`' => {}
            c if c.is_alphanumeric() || c.is_whitespace() => cleaned.push(c),
            _ => cleaned.push(' '),
        }
    }

    let mut words: Vec<&str> = cleaned.split_whitespace().collect();
    if words.len() > 1 && ARTICLES.contains(&words[0]) {
        words.remove(0);
    }

    words.join(" ")
}

/// Minimum number of single-character edits turning `a` into `b`.
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut prev_row: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr_row: Vec<usize> = vec![0; b_chars.len() + 1];

    for (i, a_char) in a_chars.iter().enumerate() {
        curr_row[0] = i + 1;

        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = usize::from(a_char != b_char);
            curr_row[j + 1] = (prev_row[j + 1] + 1)
                .min(curr_row[j] + 1)
                .min(prev_row[j] + cost);
        }

        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[b_chars.len()]
}

/// Similarity of two titles in `[0, 1]`, computed on their normalized forms.
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    normalized_similarity(&normalize_title(a), &normalize_title(b))
}

/// [`similarity`] for titles that are already normalized.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn normalized_similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// Years are compatible when either is unknown or they differ by at most `tolerance`.
#[must_use]
pub fn years_compatible(a: Option<i32>, b: Option<i32>, tolerance: i32) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => (a - b).abs() <= tolerance,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("The Matrix"), "matrix");
        assert_eq!(normalize_title("Matrix, The"), "matrix");
        assert_eq!(normalize_title("The Matrix (1999)"), "matrix");
        assert_eq!(normalize_title("Law & Order"), "law and order");
        assert_eq!(normalize_title("Schindler's List"), "schindlers list");
        assert_eq!(normalize_title("Schindler\u{2019}s List"), "schindlers list");
        assert_eq!(
            normalize_title("Mission: Impossible - Fallout"),
            "mission impossible fallout"
        );
        assert_eq!(normalize_title("  WALL·E  "), "wall e");
        assert_eq!(normalize_title("The"), "the");
        assert_eq!(normalize_title("A Quiet Place"), "quiet place");
        assert_eq!(normalize_title(""), "");
        assert_eq!(normalize_title("Amélie"), "amélie");
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("flaw", "lawn"), 2);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn test_similarity() {
        assert!((similarity("", "") - 1.0).abs() < f64::EPSILON);
        assert!((similarity("The Matrix", "Matrix (1999)") - 1.0).abs() < f64::EPSILON);
        assert!(similarity("The Matrix Reloaded", "The Matrix Reloded") > 0.9);
        assert!(similarity("Alien", "Aliens") < 0.85);
        assert!(similarity("Heat", "Up") < 0.5);
    }

    #[test]
    fn test_years_compatible() {
        assert!(years_compatible(None, Some(2000), 0));
        assert!(years_compatible(Some(2000), None, 0));
        assert!(years_compatible(Some(2000), Some(2001), 1));
        assert!(!years_compatible(Some(2000), Some(2002), 1));
        assert!(years_compatible(Some(2000), Some(2000), 0));
    }
}
