use diacritics::remove_diacritics;

/// URL-friendly key derived from a name-like field.
///
/// Diacritics are folded to their base letter, everything is lowercased and each
/// run of non-alphanumeric characters collapses into a single `-`.
pub fn slugify(source: &str) -> String {
    let folded = remove_diacritics(source).to_lowercase();

    let mut slug = String::with_capacity(folded.len());
    let mut pending_dash = false;
    for c in folded.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_slugify_spaces() {
        assert_eq!(slugify("De Boogschutters"), "de-boogschutters");
    }

    #[test]
    fn test_slugify_diacritics() {
        assert_eq!(slugify("Hôtel Émile"), "hotel-emile");
    }

    #[test]
    fn test_slugify_collapses_and_trims_separators() {
        assert_eq!(slugify("  St. Sebastiaan -- Tilburg!  "), "st-sebastiaan-tilburg");
    }

    #[test]
    fn test_slugify_empty() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("---"), "");
    }
}
