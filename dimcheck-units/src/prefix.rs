//! SI prefixes accepted by the `unit: prefix prefix ...` rule shorthand
//!
//! `u` stands for micro; the Greek mu has several look-alike code points.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Prefix symbols with their scale factors, smallest first
pub const SI_PREFIXES: [(&str, f64); 20] = [
    ("y", 1e-24),
    ("z", 1e-21),
    ("a", 1e-18),
    ("f", 1e-15),
    ("p", 1e-12),
    ("n", 1e-9),
    ("u", 1e-6),
    ("m", 1e-3),
    ("c", 1e-2),
    ("d", 1e-1),
    ("da", 1e1),
    ("h", 1e2),
    ("k", 1e3),
    ("M", 1e6),
    ("G", 1e9),
    ("T", 1e12),
    ("P", 1e15),
    ("E", 1e18),
    ("Z", 1e21),
    ("Y", 1e24),
];

static PREFIXES: LazyLock<HashMap<&'static str, f64>> =
    LazyLock::new(|| SI_PREFIXES.iter().copied().collect());

/// Scale factor of an SI prefix symbol
pub fn prefix_scale(prefix: &str) -> Option<f64> {
    PREFIXES.get(prefix).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_prefixes() {
        assert_eq!(prefix_scale("k"), Some(1e3));
        assert_eq!(prefix_scale("c"), Some(1e-2));
        assert_eq!(prefix_scale("da"), Some(10.0));
        assert_eq!(prefix_scale("y"), Some(1e-24));
        assert_eq!(prefix_scale("Y"), Some(1e24));
    }

    #[test]
    fn test_prefixes_are_case_sensitive() {
        assert_eq!(prefix_scale("m"), Some(1e-3));
        assert_eq!(prefix_scale("M"), Some(1e6));
        assert_eq!(prefix_scale("K"), None);
    }

    #[test]
    fn test_unknown_prefix() {
        assert_eq!(prefix_scale("mu"), None);
        assert_eq!(prefix_scale(""), None);
    }

    #[test]
    fn test_table_is_ordered() {
        assert!(SI_PREFIXES.windows(2).all(|w| w[0].1 < w[1].1));
    }
}
