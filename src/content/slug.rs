//! URL slugs for blog posts.

/// Longest slug produced by [`slugify`], before any de-duplication suffix.
pub const MAX_SLUG_LEN: usize = 80;

/// Slug used when a title has no usable characters.
pub const FALLBACK_SLUG: &str = "post";

/// Lowercases `title`, keeps ASCII letters and digits, and collapses every
/// other run of characters into a single `-`.
#[must_use]
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len().min(MAX_SLUG_LEN));
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

/// Candidate slug for the `n`-th de-duplication attempt. `n == 1` is the
/// base slug itself.
#[must_use]
pub fn numbered(base: &str, n: u32) -> String {
    if n <= 1 {
        base.to_string()
    } else {
        format!("{base}-{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_become_kebab_case() {
        assert_eq!(slugify("Top 10 Pop-Ups in Toronto!"), "top-10-pop-ups-in-toronto");
        assert_eq!(slugify("  --Hello,   World--  "), "hello-world");
    }

    #[test]
    fn empty_titles_fall_back() {
        assert_eq!(slugify(""), FALLBACK_SLUG);
        assert_eq!(slugify("¡¿!?"), FALLBACK_SLUG);
    }

    #[test]
    fn long_titles_are_capped() {
        let slug = slugify(&"word ".repeat(50));
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn numbered_candidates() {
        assert_eq!(numbered("a", 1), "a");
        assert_eq!(numbered("a", 2), "a-2");
        assert_eq!(numbered("a", 99), "a-99");
    }
}
