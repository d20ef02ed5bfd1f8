//! Sibling name rules for device and I/O nodes.

use crate::consts::UNIQUE_NAME_SUFFIX;

/// Keep only `[A-Za-z0-9_-]`.
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Sanitize `raw`, then append the suffix until no sibling uses the name.
pub fn unique_name<'a>(raw: &str, siblings: impl Iterator<Item = &'a str> + Clone) -> String {
    let mut name = sanitize(raw);
    while siblings.clone().any(|s| s == name) {
        name.push_str(UNIQUE_NAME_SUFFIX);
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_disallowed_characters() {
        assert_eq!(sanitize("Gripper Jaw #1"), "GripperJaw1");
        assert_eq!(sanitize("limit-switch_2"), "limit-switch_2");
        assert_eq!(sanitize("ÄÖ."), "");
    }

    #[test]
    fn appends_suffix_until_unique() {
        let siblings = ["Limit", "Limit_new"];
        assert_eq!(unique_name("Limit", siblings.iter().copied()), "Limit_new_new");
        assert_eq!(unique_name("Output", siblings.iter().copied()), "Output");
        assert_eq!(unique_name("Lim it", siblings.iter().copied()), "Limit_new_new");
    }
}
