//! Dotted-numeric version ordering.
//!
//! Versions compare segment-wise as integers, with the shorter sequence
//! padded with zeros: `"2.0" > "1.9.9"`, `"1.2" == "1.2.0"`, and
//! `"1.10" > "1.9"` (numeric, not lexicographic). Unparseable segments
//! count as zero so a malformed remote version can never outrank a real
//! one by accident.

use std::cmp::Ordering;

/// Compares two dotted-numeric version strings.
///
/// # Example
///
/// ```rust
/// use caplet_manifest::compare_versions;
/// use std::cmp::Ordering;
///
/// assert_eq!(compare_versions("2.0", "1.9.9"), Ordering::Greater);
/// assert_eq!(compare_versions("1.2", "1.2.0"), Ordering::Equal);
/// assert_eq!(compare_versions("1.10", "1.9"), Ordering::Greater);
/// ```
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left: Vec<u64> = segments(a);
    let right: Vec<u64> = segments(b);
    let len = left.len().max(right.len());

    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }

    Ordering::Equal
}

fn segments(version: &str) -> Vec<u64> {
    version
        .trim()
        .split('.')
        .map(|s| s.trim().parse::<u64>().unwrap_or(0))
        .collect()
}
