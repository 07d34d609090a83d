use std::path::{Path, PathBuf};
use url::Url;

/// Last path segment of `url_str`, ignoring the query string.
///
/// Falls back to plain string splitting when the URL does not parse.
pub fn get_filename_from_url(url_str: &str) -> Option<String> {
    let segment = match Url::parse(url_str) {
        Ok(url) => url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(str::to_string),
        Err(_) => {
            let without_query = url_str.split(['?', '#']).next().unwrap_or_default();
            without_query.rsplit('/').next().map(str::to_string)
        }
    };
    segment.filter(|s| !s.is_empty())
}

pub fn sanitize_filename(filename: &str) -> String {
    filename.replace(|c: char| !c.is_alphanumeric() && c != '.' && c != '-' && c != '_', "_")
}

/// Where a download at 1-based `position` in the list is saved inside `dir`.
pub fn destination_for(dir: &Path, url: &str, position: usize) -> PathBuf {
    let filename = get_filename_from_url(url)
        .map(|name| sanitize_filename(&name))
        .unwrap_or_else(|| format!("download_{}", position));
    dir.join(filename)
}
