//! Entity name normalization
//!
//! Raw files spell the same state or union territory in several ways. Names are
//! upper-cased, trimmed and whitespace-collapsed, then resolved through a
//! static alias table. City names that leaked into the state column are
//! rejected.

/// Known aliases and their canonical names
const ENTITY_ALIASES: &[(&str, &str)] = &[
    ("ANDAMAN & NICOBAR ISLANDS", "ANDAMAN AND NICOBAR ISLANDS"),
    ("ANDAMAN & NICOBAR", "ANDAMAN AND NICOBAR ISLANDS"),
    (
        "DADRA & NAGAR HAVELI AND DAMAN AND DIU",
        "DADRA AND NAGAR HAVELI AND DAMAN AND DIU",
    ),
    (
        "THE DADRA AND NAGAR HAVELI AND DAMAN AND DIU",
        "DADRA AND NAGAR HAVELI AND DAMAN AND DIU",
    ),
    ("DADRA & NAGAR HAVELI", "DADRA AND NAGAR HAVELI AND DAMAN AND DIU"),
    ("DADRA AND NAGAR HAVELI", "DADRA AND NAGAR HAVELI AND DAMAN AND DIU"),
    ("DAMAN & DIU", "DADRA AND NAGAR HAVELI AND DAMAN AND DIU"),
    ("DAMAN AND DIU", "DADRA AND NAGAR HAVELI AND DAMAN AND DIU"),
    ("D & N HAVELI", "DADRA AND NAGAR HAVELI AND DAMAN AND DIU"),
    ("PONDICHERRY", "PUDUCHERRY"),
    ("WEST BANGAL", "WEST BENGAL"),
    ("WESTBENGAL", "WEST BENGAL"),
    ("WEST BENGLI", "WEST BENGAL"),
    ("JAMMU & KASHMIR", "JAMMU AND KASHMIR"),
    ("J & K", "JAMMU AND KASHMIR"),
    ("TELENGANA", "TELANGANA"),
    ("ORISSA", "ODISHA"),
    ("CHHATISGARH", "CHHATTISGARH"),
    ("CHATTISGARH", "CHHATTISGARH"),
    ("TAMILNADU", "TAMIL NADU"),
    ("UTTARANCHAL", "UTTARAKHAND"),
];

/// Entries that are cities rather than states or union territories
const INVALID_ENTITIES: &[&str] = &[
    "BALANAGAR",
    "DARBHANGA",
    "JAIPUR",
    "MADANAPALLE",
    "NAGPUR",
    "PUTTENAHALLI",
    "RAJA ANNAMALAI PURAM",
];

/// Canonical form of an entity name, or `None` when it must be discarded
pub fn normalize_entity(raw: &str) -> Option<String> {
    let cleaned = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase();

    if cleaned.is_empty() {
        return None;
    }

    let canonical = ENTITY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == cleaned)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(cleaned);

    if INVALID_ENTITIES.contains(&canonical.as_str()) {
        return None;
    }

    Some(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_resolve() {
        assert_eq!(normalize_entity("Orissa").as_deref(), Some("ODISHA"));
        assert_eq!(normalize_entity("  west   bengal ").as_deref(), Some("WEST BENGAL"));
        assert_eq!(normalize_entity("J & K").as_deref(), Some("JAMMU AND KASHMIR"));
        assert_eq!(
            normalize_entity("Daman & Diu").as_deref(),
            Some("DADRA AND NAGAR HAVELI AND DAMAN AND DIU")
        );
    }

    #[test]
    fn test_unknown_names_pass_through() {
        assert_eq!(normalize_entity("Kerala").as_deref(), Some("KERALA"));
    }

    #[test]
    fn test_invalid_entries_dropped() {
        assert_eq!(normalize_entity("Jaipur"), None);
        assert_eq!(normalize_entity("raja annamalai  puram"), None);
        assert_eq!(normalize_entity("   "), None);
    }
}
