//! Utility functions and helpers.

pub mod http;
pub mod log;

use url::Url;

use crate::error::Result;

/// Split on `sep`, trim each part and drop the empty ones.
pub fn split_and_trim(input: &str, sep: char) -> Vec<String> {
    input
        .split(sep)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Join a relative path onto a base endpoint, treating the base as a directory.
pub fn join_endpoint(base: &str, path: &str) -> Result<Url> {
    let mut base = Url::parse(base)?;
    if !base.path().ends_with('/') {
        let dir = format!("{}/", base.path());
        base.set_path(&dir);
    }
    Ok(base.join(path.trim_start_matches('/'))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_and_trim() {
        assert_eq!(split_and_trim(" a / b //c ", '/'), vec!["a", "b", "c"]);
        assert!(split_and_trim(" / ", '/').is_empty());
    }

    #[test]
    fn test_join_endpoint() {
        assert_eq!(
            join_endpoint("http://catalog:8085/api", "asset/x").unwrap().as_str(),
            "http://catalog:8085/api/asset/x"
        );
        assert_eq!(
            join_endpoint("http://catalog:8085/api/", "/assets/").unwrap().as_str(),
            "http://catalog:8085/api/assets/"
        );
        assert_eq!(
            join_endpoint("http://catalog:8085", "asset/").unwrap().as_str(),
            "http://catalog:8085/asset/"
        );
    }

    #[test]
    fn test_join_endpoint_rejects_garbage() {
        assert!(join_endpoint("not a url", "asset/").is_err());
    }
}
