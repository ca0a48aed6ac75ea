use itertools::Itertools;
use unicode_normalization::UnicodeNormalization;

pub trait StringExtensions {
    /// Convert a free-form label into a tag slug.
    /// Accented letters fold to their ASCII base, anything else outside ASCII is dropped.
    /// E.g. `slugify("Sci Fi & Fantasy") == "sci-fi-fantasy"`
    fn slugify(&self) -> String;
}

impl StringExtensions for str {
    fn slugify(&self) -> String {
        let kept = self
            .nfkd()
            .filter(|c| c.is_ascii())
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();

        kept
            .split(|c: char| c == '-' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .join("-")
            .trim_matches(|c| c == '-' || c == '_')
            .to_string()
    }
}

impl StringExtensions for String {
    fn slugify(&self) -> String {
        self.as_str().slugify()
    }
}

#[test]
fn test_slugify() {
    assert_eq!("Alpha".slugify(), "alpha");
    assert_eq!("  sci-fi ".slugify(), "sci-fi");
    assert_eq!("Sci Fi & Fantasy".slugify(), "sci-fi-fantasy");
    assert_eq!(
        "Why are DB Admins Always Shouting?".to_string().slugify(),
        "why-are-db-admins-always-shouting"
    );
    assert_eq!("It's as Easy as 1, 2, 3!".slugify(), "its-as-easy-as-1-2-3");
    assert_eq!("__snake_case__".slugify(), "snake_case");
    assert_eq!("--".slugify(), "");
}

#[test]
fn test_slugify_folds_accents() {
    assert_eq!("Café Crème".slugify(), "cafe-creme");
    assert_eq!("naïve".slugify(), "naive");
    assert_eq!("Ｆｕｌｌｗｉｄｔｈ ﬁle".slugify(), "fullwidth-file");
    assert_eq!("日本 books".slugify(), "books");
}
