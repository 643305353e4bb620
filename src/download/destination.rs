use regex::Regex;
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use super::{Category, DownloadError};

static UNSAFE_NAME_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[/\\\x00-\x1f\x7f]").expect("file name pattern is valid")
});

/// Maps categories onto directories under the configured output root
#[derive(Debug, Clone)]
pub struct DestinationResolver {
    root: PathBuf,
}

impl DestinationResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `other` lands in the root itself, every other category in
    /// `<root>/<category>`
    pub fn resolve(&self, category: Category) -> PathBuf {
        match category {
            Category::Other => self.root.clone(),
            category => self.root.join(category.as_str()),
        }
    }
}

/// Accept a user supplied file name only if it names a single entry
/// inside the destination directory.
pub fn sanitize_file_name(name: &str) -> Result<String, DownloadError> {
    let trimmed = name.trim();

    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        return Err(DownloadError::invalid_payload(format!(
            "unusable file name {:?}",
            name
        )));
    }

    if UNSAFE_NAME_CHARS.is_match(trimmed) {
        return Err(DownloadError::invalid_payload(format!(
            "file name {:?} contains path separators or control characters",
            name
        )));
    }

    Ok(trimmed.to_string())
}

/// Last non-empty path segment of an HTTP(S) URL
pub fn file_name_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .rev()
        .find(|segment| !segment.is_empty())
        .map(|segment| segment.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_directories() {
        let resolver = DestinationResolver::new("/srv/media");
        assert_eq!(resolver.resolve(Category::Movie), PathBuf::from("/srv/media/movie"));
        assert_eq!(resolver.resolve(Category::Tv), PathBuf::from("/srv/media/tv"));
        assert_eq!(resolver.resolve(Category::Music), PathBuf::from("/srv/media/music"));
        assert_eq!(resolver.resolve(Category::Other), PathBuf::from("/srv/media"));
    }

    #[test]
    fn test_destinations_stay_under_root() {
        let resolver = DestinationResolver::new("/srv/media");
        for category in Category::ALL {
            assert!(resolver.resolve(category).starts_with(resolver.root()));
        }
    }

    #[test]
    fn test_sanitize_accepts_plain_names() {
        assert_eq!(sanitize_file_name("file.mp4").unwrap(), "file.mp4");
        assert_eq!(sanitize_file_name("  Song (live).flac ").unwrap(), "Song (live).flac");
        assert_eq!(sanitize_file_name("..hidden").unwrap(), "..hidden");
    }

    #[test]
    fn test_sanitize_rejects_traversal() {
        for name in ["", "  ", ".", "..", "../etc/passwd", "a/b", "a\\b", "bad\0name", "tab\tname"] {
            let result = sanitize_file_name(name);
            assert!(
                matches!(result, Err(DownloadError::InvalidPayload { .. })),
                "{:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://host/videos/file.mp4?token=1"),
            Some("file.mp4".to_string())
        );
        assert_eq!(
            file_name_from_url("https://host/dir/"),
            Some("dir".to_string())
        );
        assert_eq!(file_name_from_url("https://host"), None);
        assert_eq!(file_name_from_url("not a url"), None);
    }
}
