//! Version ordering for release version strings.
//!
//! Versions are compared segment by segment after splitting on `.`:
//! - two numeric segments compare as integers
//! - two text segments compare as text
//! - a numeric segment sorts before a text segment
//! - a missing trailing segment sorts before any present one
//!
//! Every segment kind is ordered on its own, so the ordering stays total
//! when numeric and pre-release segments are mixed in one release list.
//!
//! Unlike semver, strings such as `1.0` or `2.3.0.rc1` are accepted.

use std::cmp::Ordering;

/// Compare two version strings.
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    let mut left_segments = left.split('.');
    let mut right_segments = right.split('.');

    loop {
        match (left_segments.next(), right_segments.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ordering = compare_segment(l, r);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

fn compare_segment(left: &str, right: &str) -> Ordering {
    match (left.parse::<u64>(), right.parse::<u64>()) {
        (Ok(l), Ok(r)) => l.cmp(&r),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => left.cmp(right),
    }
}

/// Return the greater of two versions (the left one on a tie).
pub fn max_version<'a>(left: &'a str, right: &'a str) -> &'a str {
    if compare_versions(right, left) == Ordering::Greater {
        right
    } else {
        left
    }
}

/// Sort version-bearing items so that the latest version comes first.
pub fn sort_by_version_desc<T, F>(items: &mut [T], version_of: F)
where
    F: Fn(&T) -> &str,
{
    items.sort_by(|a, b| compare_versions(version_of(b), version_of(a)));
}
