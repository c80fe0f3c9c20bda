//! String distance kernels.
//!
//! Stateless numeric functions that smooth otherwise-discontinuous string
//! predicates (equality, containment, prefix, suffix) into continuous
//! distances, plus the inverse maps that squash a distance into a bounded
//! similarity contribution. All functions are total: an empty string stands
//! in for a missing one.

/// Classic insert/delete/substitute edit distance, computed with two rolling
/// rows of length `|s|+1` (O(|s|*|t|) time, O(|s|) space).
pub fn edit_distance(s: &str, t: &str) -> usize {
    let s: Vec<char> = s.chars().collect();
    let t: Vec<char> = t.chars().collect();
    edit_core(&s, &t)
}

fn edit_core(s: &[char], t: &[char]) -> usize {
    if s.is_empty() {
        return t.len();
    }
    if t.is_empty() {
        return s.len();
    }

    let mut previous: Vec<usize> = (0..=s.len()).collect();
    let mut current: Vec<usize> = vec![0; s.len() + 1];

    for (j, &tc) in t.iter().enumerate() {
        current[0] = j + 1;
        for (i, &sc) in s.iter().enumerate() {
            let substitution = if sc == tc { 0 } else { 1 };
            current[i + 1] = (current[i] + 1)
                .min(previous[i + 1] + 1)
                .min(previous[i] + substitution);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[s.len()]
}

/// Minimum edit distance between `sub` and any window of `sup` of length
/// `|sub|`. Degenerates to [`edit_distance`] when `|sup| <= |sub|`; an empty
/// `sub` is contained in anything, so its distance is 0. Deletions outside
/// the window are free: only the `|sup|-|sub|+1` windows are scored, each as
/// an independent edit-distance computation, minimized at the end.
pub fn containment_distance(sup: &str, sub: &str) -> usize {
    let sup: Vec<char> = sup.chars().collect();
    let sub: Vec<char> = sub.chars().collect();

    if sup.len() <= sub.len() {
        return edit_core(&sup, &sub);
    }
    if sub.is_empty() {
        return 0;
    }

    (0..=sup.len() - sub.len())
        .map(|k| edit_core(&sup[k..k + sub.len()], &sub))
        .min()
        .expect("at least one window")
}

/// Count of mismatching positions among the first `min(|prefix|,|s|)`
/// characters, plus the excess length of `prefix` beyond `|s|`. An empty
/// prefix is a prefix of anything.
pub fn prefix_distance(prefix: &str, s: &str) -> usize {
    let prefix: Vec<char> = prefix.chars().collect();
    let s: Vec<char> = s.chars().collect();

    if prefix.is_empty() {
        return 0;
    }

    let matching = prefix.iter().zip(s.iter()).filter(|(p, c)| p == c).count();
    prefix.len() - matching
}

/// [`prefix_distance`] over both strings reversed.
pub fn suffix_distance(suffix: &str, s: &str) -> usize {
    let suffix: String = suffix.chars().rev().collect();
    let s: String = s.chars().rev().collect();
    prefix_distance(&suffix, &s)
}

/// Length of `s` minus its common leading run with `t`; when the common run
/// covers all of `s`, the distance is `|t|-|s|` instead, so "t starts with s"
/// is a low distance. Used to softly penalize aliasing of the "wrong" object
/// by the lexical proximity of its origin string.
pub fn edge_distance(s: &str, t: &str) -> usize {
    let s: Vec<char> = s.chars().collect();
    let t: Vec<char> = t.chars().collect();

    if s.is_empty() {
        return t.len();
    }
    if t.is_empty() {
        return s.len();
    }

    let common = s.iter().zip(t.iter()).take_while(|(a, b)| a == b).count();
    if common < s.len() {
        s.len() - common
    } else {
        t.len() - s.len()
    }
}

/// Inverse-exponential map: `max * 2^(-distance)`. Monotone decreasing,
/// bounded in `(0, max]`, equal to `max` only at distance 0. Keeps the
/// fitness landscape smooth where a hard 0/1 cut would plateau the search.
pub fn inverse_distance_exp(distance: f64, max: f64) -> f64 {
    debug_assert!(distance >= 0.0);
    debug_assert!(max > 0.0);
    max * (-distance).exp2()
}

/// Inverse-ratio map: `max / (1 + distance)`. Same bounds as
/// [`inverse_distance_exp`] with a heavier tail; used to reward near-misses
/// of numeric and string predicates.
pub fn inverse_distance_ratio(distance: f64, max: f64) -> f64 {
    debug_assert!(distance >= 0.0);
    debug_assert!(max > 0.0);
    max / (1.0 + distance)
}
