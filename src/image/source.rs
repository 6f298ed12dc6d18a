use std::fmt;
use std::path::PathBuf;

/// Where an image can be loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    File(PathBuf),
    Url(String),
}

impl ImageSource {
    /// Interpret a user- or config-supplied location.
    ///
    /// `http://` and `https://` locations are URLs; anything else is a file path.
    pub fn parse(location: &str) -> Self {
        let location = location.trim();
        if location.starts_with("http://") || location.starts_with("https://") {
            ImageSource::Url(location.to_string())
        } else {
            ImageSource::File(PathBuf::from(location))
        }
    }

    /// Parse a comma-separated, ordered candidate list, skipping blank entries.
    pub fn parse_list(list: &str) -> Vec<Self> {
        list.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(Self::parse)
            .collect()
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::File(path) => write!(f, "{}", path.display()),
            ImageSource::Url(url) => write!(f, "{}", url),
        }
    }
}
