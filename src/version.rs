use semver::Version;

/// Parse a release tag into a `(major, minor, patch)` version. Never fails:
/// a leading `v`/`V` is stripped, anything after the first `+` or `-`
/// (pre-release / build metadata) is discarded, and missing or non-numeric
/// components become 0.
pub fn parse(text: &str) -> Version {
    let cleaned = text.trim();
    let cleaned = cleaned.strip_prefix(['v', 'V']).unwrap_or(cleaned);
    let cleaned = cleaned.split('+').next().unwrap_or("");
    let cleaned = cleaned.split('-').next().unwrap_or("");

    let mut numbers = cleaned
        .split('.')
        .map(|part| part.parse::<u64>().unwrap_or(0));

    Version::new(
        numbers.next().unwrap_or(0),
        numbers.next().unwrap_or(0),
        numbers.next().unwrap_or(0),
    )
}

/// True if `latest` is strictly newer than `current`.
pub fn is_newer(latest: &str, current: &str) -> bool {
    parse(latest) > parse(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_triple() {
        assert_eq!(parse("1.2.3"), Version::new(1, 2, 3));
    }

    #[test]
    fn parse_strips_v_prefix() {
        assert_eq!(parse("v1.2.3"), Version::new(1, 2, 3));
        assert_eq!(parse("V2.0.0"), Version::new(2, 0, 0));
    }

    #[test]
    fn parse_discards_prerelease_and_build() {
        assert_eq!(parse("v1.2.3-beta"), Version::new(1, 2, 3));
        assert_eq!(parse("1.2.3+build.7"), Version::new(1, 2, 3));
        assert_eq!(parse("1.2.3-rc.1+abc"), Version::new(1, 2, 3));
    }

    #[test]
    fn parse_pads_missing_components() {
        assert_eq!(parse("2"), Version::new(2, 0, 0));
        assert_eq!(parse("2.1"), Version::new(2, 1, 0));
    }

    #[test]
    fn parse_unparseable_components_become_zero() {
        assert_eq!(parse("bad"), Version::new(0, 0, 0));
        assert_eq!(parse("1.x.3"), Version::new(1, 0, 3));
        assert_eq!(parse(""), Version::new(0, 0, 0));
    }

    #[test]
    fn is_newer_lexicographic() {
        assert!(is_newer("2.0.0", "1.9.9"));
        assert!(is_newer("1.10.0", "1.9.0"));
        assert!(is_newer("1.0.1", "1.0.0"));
        assert!(!is_newer("1.0.0", "1.0.0"));
        assert!(!is_newer("1.0.0", "1.0.1"));
    }

    #[test]
    fn is_newer_with_tags_and_suffixes() {
        assert!(is_newer("v2.0.0", "1.9.0"));
        assert!(!is_newer("v1.9.0-beta", "1.9.0"));
    }
}
