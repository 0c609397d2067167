//! URL slugs for products and categories.

use std::future::Future;

const FALLBACK: &str = "item";

/// Lowercase ASCII slug with single `-` separators.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for ch in name.chars().flat_map(fold_char) {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        FALLBACK.to_string()
    } else {
        slug
    }
}

fn fold_char(ch: char) -> Vec<char> {
    let folded: &str = match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => "a",
        'æ' | 'Æ' => "ae",
        'ç' | 'Ç' => "c",
        'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => "e",
        'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => "i",
        'ñ' | 'Ñ' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' => "o",
        'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' => "u",
        'ý' | 'ÿ' | 'Ý' => "y",
        'ß' => "ss",
        '&' => " and ",
        '@' => " at ",
        _ => return vec![ch],
    };
    folded.chars().collect()
}

/// Finds the first free slug for `name`: the base slug, then `base-1`, `base-2`, ...
///
/// `taken` must answer against every row of the entity, soft-deleted ones included,
/// and must ignore the row being updated.
pub async fn unique_slug<F, Fut, E>(name: &str, mut taken: F) -> Result<String, E>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    let base = slugify(name);
    if !taken(base.clone()).await? {
        return Ok(base);
    }

    let mut suffix = 1u32;
    loop {
        let candidate = format!("{}-{}", base, suffix);
        if !taken(candidate.clone()).await? {
            return Ok(candidate);
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::convert::Infallible;

    async fn pick(name: &str, existing: &HashSet<String>) -> String {
        unique_slug(name, |candidate| {
            let hit = existing.contains(&candidate);
            async move { Ok::<_, Infallible>(hit) }
        })
        .await
        .unwrap()
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Oak Dining Table"), "oak-dining-table");
        assert_eq!(slugify("  Sofa -- 3 Seater!! "), "sofa-3-seater");
        assert_eq!(slugify("Chaise Longue (Velvet)"), "chaise-longue-velvet");
    }

    #[test]
    fn slugify_folds_accents_and_symbols() {
        assert_eq!(slugify("Café Chair"), "cafe-chair");
        assert_eq!(slugify("Table & Bench"), "table-and-bench");
    }

    #[test]
    fn slugify_never_returns_empty() {
        assert_eq!(slugify("!!!"), "item");
        assert_eq!(slugify(""), "item");
    }

    #[tokio::test]
    async fn free_base_slug_is_used_as_is() {
        let existing = HashSet::new();
        assert_eq!(pick("Bar Stool", &existing).await, "bar-stool");
    }

    #[tokio::test]
    async fn collisions_get_incrementing_suffixes() {
        let mut existing: HashSet<String> =
            ["bar-stool".to_string(), "bar-stool-1".to_string()].into_iter().collect();
        let next = pick("Bar Stool", &existing).await;
        assert_eq!(next, "bar-stool-2");

        existing.insert(next);
        assert_eq!(pick("Bar Stool", &existing).await, "bar-stool-3");
    }

    #[tokio::test]
    async fn generated_slugs_stay_unique_across_many_inserts() {
        let mut existing = HashSet::new();
        for _ in 0..25 {
            let slug = pick("Armchair", &existing).await;
            assert!(existing.insert(slug), "duplicate slug generated");
        }
        assert_eq!(existing.len(), 25);
    }

    #[tokio::test]
    async fn lookup_errors_propagate() {
        let result: Result<String, &str> =
            unique_slug("Desk", |_| async { Err("db down") }).await;
        assert_eq!(result.unwrap_err(), "db down");
    }
}
