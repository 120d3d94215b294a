//! Score-based fuzzy resolution, the fallback when exact lookup fails.
//!
//! The component weights (0.3 / 0.3 / 0.4) and the part-split character
//! class are tunable heuristics, not a contract.

/// Characters that separate reference parts: `[:. <->]`.
const PART_SEPARATORS: &[char] = &[':', '.', ' ', '<', '-', '>'];

/// Resolve a reference against the node table.
///
/// `xml:` references short-circuit to the first key with the reference as a
/// prefix. Everything else is scored: a key qualifies only when every query
/// part appears in it (case-insensitively), and the best composite of
/// Jaro–Winkler similarity, part-coverage ratio, and exact-part fraction
/// wins.
pub fn fuzzy_resolve<'a>(reference: &str, keys: &'a [String]) -> Option<&'a str> {
    if reference.starts_with("xml:") {
        if let Some(key) = keys.iter().find(|k| k.starts_with(reference)) {
            return Some(key);
        }
    }

    let reference_lower = reference.to_lowercase();
    let parts: Vec<&str> = reference_lower
        .split(PART_SEPARATORS)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        return None;
    }
    let parts_len_sum: usize = parts.iter().map(|p| p.len()).sum();

    let mut best: Option<(&'a str, f64)> = None;
    for key in keys {
        let key_lower = key.to_lowercase();
        if !parts.iter().all(|part| key_lower.contains(part)) {
            continue;
        }

        let similarity = strsim::jaro_winkler(&reference_lower, &key_lower) * 0.3;
        #[allow(clippy::cast_precision_loss)]
        let coverage = (parts_len_sum as f64 / key_lower.len() as f64).min(1.0) * 0.3;

        let key_parts: Vec<&str> = key_lower
            .split(PART_SEPARATORS)
            .filter(|p| !p.is_empty())
            .collect();
        let exact = parts
            .iter()
            .filter(|part| key_parts.contains(part))
            .count();
        #[allow(clippy::cast_precision_loss)]
        let exactness = (exact as f64 / parts.len() as f64) * 0.4;

        let total = similarity + coverage + exactness;
        if best.is_none_or(|(_, score)| total > score) {
            best = Some((key, total));
        }
    }

    best.map(|(key, _)| key)
}

// ── Tests ──────────────────────────────────────────────────────────
