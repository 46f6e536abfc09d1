/// Derives the URL identifier of a club from its display name: lowercase,
/// every run of characters outside `[a-z0-9]` collapsed into one hyphen,
/// and no hyphen at either end.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::slugify;
    use rstest::rstest;

    #[rstest]
    #[case("GECP Robotics Society!!", "gecp-robotics-society")]
    #[case("AI & Data Club", "ai-data-club")]
    #[case("  --Leading and trailing--  ", "leading-and-trailing")]
    #[case("C++ / Rust Circle", "c-rust-circle")]
    #[case("Club 2026", "club-2026")]
    #[case("Café Lecteurs", "caf-lecteurs")]
    #[case("!!!", "")]
    #[case("", "")]
    fn derives_slug(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(slugify(name), expected);
    }

    #[rstest]
    #[case("GECP Robotics Society!!")]
    #[case("Music --- & Dance")]
    #[case("ÄÖÜ Society of 3D-Printing")]
    fn is_idempotent_and_well_formed(#[case] name: &str) {
        let once = slugify(name);
        assert_eq!(slugify(&once), once);
        assert!(once
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        assert!(!once.starts_with('-') && !once.ends_with('-'));
        assert!(!once.contains("--"));
    }
}
