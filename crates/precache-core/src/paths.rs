//! Mapping between the media server's view, the local source tree and the cache pool
//!
//! The media server reports files under its own library root (for example
//! `/data/tvshows`). This process sees the same tree under a local media root
//! (`/media/tvshows`) and mirrors it below the cache root, so a file ends up at
//! `<cache root><media root>/<relative path>`.

/// Prefix rewriting between library, source and cache locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapper {
    library_root: String,
    media_root: String,
    cache_root: String,
}

impl PathMapper {
    pub fn new(library_root: &str, media_root: &str, cache_root: &str) -> Self {
        Self {
            library_root: normalize_root(library_root),
            media_root: normalize_root(media_root),
            cache_root: normalize_root(cache_root),
        }
    }

    /// Local source path of a file reported by the media server
    pub fn to_source(&self, library_path: &str) -> Option<String> {
        let relative = strip_root(library_path, &self.library_root)?;
        Some(format!("{}{}", self.media_root, relative))
    }

    /// Cache pool path of a file reported by the media server
    pub fn to_cache(&self, library_path: &str) -> Option<String> {
        let source = self.to_source(library_path)?;
        Some(format!("{}{}", self.cache_root, source))
    }

    /// Local source path a cache pool file is copied from
    pub fn source_for_cached(&self, cache_path: &str) -> Option<String> {
        let source = strip_root(cache_path, &self.cache_root)?;
        strip_root(source, &self.media_root)?;
        Some(source.to_string())
    }
}

impl Default for PathMapper {
    fn default() -> Self {
        Self::new("/data/tvshows", "/media/tvshows", "/cache")
    }
}

/// Sidecar subtitle path for an episode file.
///
/// The container extension is swapped for `<language>.<format>`, so
/// `Show - S02E06.mkv` becomes `Show - S02E06.en.srt`.
pub fn subtitle_path(episode_path: &str, container: &str, language_tag: &str, format: &str) -> String {
    let suffix = if language_tag.is_empty() {
        format.to_string()
    } else {
        format!("{}.{}", language_tag, format)
    };

    let extension = format!(".{}", container);
    match episode_path.strip_suffix(&extension) {
        Some(stem) if !container.is_empty() => format!("{}.{}", stem, suffix),
        _ => format!("{}.{}", episode_path, suffix),
    }
}

fn normalize_root(root: &str) -> String {
    root.trim_end_matches('/').to_string()
}

/// Remainder of `path` below `root`, keeping its leading separator
fn strip_root<'a>(path: &'a str, root: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(root)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}
