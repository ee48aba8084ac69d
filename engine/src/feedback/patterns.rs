use std::collections::BTreeSet;

/// Jaccard similarity of two token sets: |A ∩ B| / |A ∪ B|.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Encode a signature as its sled key: the sorted tokens space-joined.
pub fn signature_key(signature: &BTreeSet<String>) -> String {
    signature.iter().cloned().collect::<Vec<_>>().join(" ")
}

pub fn parse_signature(key: &str) -> BTreeSet<String> {
    key.split(' ').map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn jaccard_of_identical_sets_is_one() {
        let a = set(&["timeout", "connect"]);
        assert_eq!(jaccard(&a, &a), 1.0);
    }

    #[test]
    fn jaccard_of_disjoint_sets_is_zero() {
        assert_eq!(jaccard(&set(&["a"]), &set(&["b"])), 0.0);
        assert_eq!(jaccard(&set(&[]), &set(&[])), 0.0);
    }

    #[test]
    fn jaccard_counts_overlap_over_union() {
        let a = set(&["a", "b", "c", "d"]);
        let b = set(&["a", "b", "c", "d", "e"]);
        assert!((jaccard(&a, &b) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn signature_key_round_trips() {
        let sig = set(&["databas", "connect", "timeout"]);
        assert_eq!(parse_signature(&signature_key(&sig)), sig);
    }
}
