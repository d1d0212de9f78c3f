//! URL slugs for categories and blog posts.
//!
//! Cyrillic titles are transliterated so that slugs stay ASCII.

const MAX_SLUG_LEN: usize = 200;

fn transliterate(c: char) -> Option<&'static str> {
    let latin = match c {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "h",
        'ґ' => "g",
        'д' => "d",
        'е' => "e",
        'є' => "ye",
        'ж' => "zh",
        'з' => "z",
        'и' => "y",
        'і' => "i",
        'ї' => "yi",
        'й' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "kh",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "shch",
        'ь' | 'ъ' => "",
        'ю' => "yu",
        'я' => "ya",
        'ы' => "y",
        'э' => "e",
        'ё' => "yo",
        _ => return None,
    };
    Some(latin)
}

/// Build a slug: lowercase, transliterate, replace anything outside
/// `[a-z0-9-]` with `-`, collapse dashes, trim, cap at 200 chars.
/// Falls back to `"post"` when nothing usable remains.
pub fn slugify(input: &str) -> String {
    let mut raw = String::with_capacity(input.len());
    for c in input.to_lowercase().chars() {
        if let Some(latin) = transliterate(c) {
            raw.push_str(latin);
        } else if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
            raw.push(c);
        } else {
            raw.push('-');
        }
    }

    let mut slug = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == '-' && (slug.is_empty() || slug.ends_with('-')) {
            continue;
        }
        slug.push(c);
    }

    let mut slug = slug.trim_end_matches('-').to_string();
    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        slug = slug.trim_end_matches('-').to_string();
    }

    if slug.is_empty() {
        "post".to_string()
    } else {
        slug
    }
}

/// Slug typed by an admin: normalized like [`slugify`], but `None` when the
/// input has no letters or digits to keep.
pub fn parse_slug(input: &str) -> Option<String> {
    let usable = input
        .to_lowercase()
        .chars()
        .any(|c| c.is_ascii_alphanumeric() || transliterate(c).map_or(false, |l| !l.is_empty()));
    usable.then(|| slugify(input))
}

/// `base`, `base-2`, `base-3`, ... for uniqueness retries.
pub fn with_suffix(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        base.to_string()
    } else {
        format!("{}-{}", base, attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transliterates_ukrainian_titles() {
        assert_eq!(slugify("Як обрати смартфон"), "yak-obraty-smartfon");
        assert_eq!(slugify("Щоденник їжака"), "shchodennyk-yizhaka");
    }

    #[test]
    fn collapses_and_trims_separators() {
        assert_eq!(slugify("  Hello,   World!! "), "hello-world");
        assert_eq!(slugify("--a--b--"), "a-b");
    }

    #[test]
    fn falls_back_when_empty() {
        assert_eq!(slugify("!!!"), "post");
        assert_eq!(slugify(""), "post");
    }

    #[test]
    fn typed_slugs_need_letters_or_digits() {
        assert_eq!(parse_slug(" Phones & Tablets ").as_deref(), Some("phones-tablets"));
        assert_eq!(parse_slug("Смартфони").as_deref(), Some("smartfony"));
        assert_eq!(parse_slug("!!!"), None);
        assert_eq!(parse_slug("   "), None);
    }

    #[test]
    fn caps_length() {
        let long = "a".repeat(300);
        assert_eq!(slugify(&long).len(), 200);
    }

    #[test]
    fn suffixes_retries() {
        assert_eq!(with_suffix("news", 1), "news");
        assert_eq!(with_suffix("news", 3), "news-3");
    }
}
