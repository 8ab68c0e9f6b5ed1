//! `<scheme>:<path>` splitting.

/// A URL split into its scheme prefix and native path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Url<'a> {
    /// Scheme token, if the URL has one.
    pub scheme: Option<&'a str>,
    /// Native filesystem path with the scheme stripped.
    pub path: &'a str,
}

impl<'a> Url<'a> {
    /// Split `url` at the first `:` if what precedes it looks like a scheme.
    ///
    /// A scheme starts with an ASCII letter, is at least two characters long,
    /// and contains only ASCII alphanumerics, `+`, `-` or `.`. Single-letter
    /// prefixes are kept as part of the path so `C:\foo` is not a scheme.
    pub fn parse(url: &'a str) -> Self {
        if let Some((scheme, path)) = url.split_once(':') {
            if is_scheme(scheme) {
                return Self {
                    scheme: Some(scheme),
                    path,
                };
            }
        }
        Self { scheme: None, path: url }
    }
}

fn is_scheme(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    s.len() >= 2
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Strip any scheme prefix and return the native path.
pub fn native_path(url: &str) -> &str {
    Url::parse(url).path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_scheme() {
        let url = Url::parse("cf:/tmp/test.bin");
        assert_eq!(url.scheme, Some("cf"));
        assert_eq!(url.path, "/tmp/test.bin");
    }

    #[test]
    fn test_parse_relative_path() {
        let url = Url::parse("cf:test.bin");
        assert_eq!(url.scheme, Some("cf"));
        assert_eq!(url.path, "test.bin");
    }

    #[test]
    fn test_parse_without_scheme() {
        let url = Url::parse("/var/data/file.bin");
        assert_eq!(url.scheme, None);
        assert_eq!(url.path, "/var/data/file.bin");
    }

    #[test]
    fn test_single_letter_is_not_a_scheme() {
        let url = Url::parse("C:\\data\\file.bin");
        assert_eq!(url.scheme, None);
        assert_eq!(url.path, "C:\\data\\file.bin");
    }

    #[test]
    fn test_colon_later_in_path() {
        // "./a" contains '.' and '/', so it is not a scheme
        let url = Url::parse("./a:b");
        assert_eq!(url.scheme, None);
        assert_eq!(native_path("file:/x:y"), "/x:y");
    }
}
