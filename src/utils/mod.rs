pub mod hash_utils;
pub mod str_utils;

/// Splits a comma separated `tags` form value into trimmed, non-empty pieces.
pub fn split_tags(input: &str) -> Vec<String> {
    input.split(',')
        .map(|x| x.trim())
        .filter(|x| !x.is_empty())
        .map(|x| x.to_string())
        .collect()
}
