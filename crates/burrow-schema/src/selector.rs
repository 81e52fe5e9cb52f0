use crate::platform::platform_aliases;
use crate::spec::SpecError;
use regex::Regex;
use std::sync::OnceLock;

/// Matches `<content> [<selector>]`, optionally with an inline `#` comment
/// before the bracket. Group 1 is the content, group 2 the selector token.
fn selector_pattern() -> &'static Regex {
    static PAT: OnceLock<Regex> = OnceLock::new();
    PAT.get_or_init(|| {
        Regex::new(r"^(.+?)\s*(?:#[^\[]*)?\[([^\[\]]+)\]\s*$").expect("selector pattern is valid")
    })
}

/// Evaluate platform-selector directives in raw specification text.
///
/// Lines that are plain comments (left-trimmed `#`) are dropped. Lines with a
/// trailing `[selector]` are kept, selector stripped, only when the selector
/// equals `platform` or one of its aliases. Lines without a selector are
/// always kept. Relative ordering is preserved.
///
/// An unknown target platform is a configuration error, never a silent
/// keep-everything or drop-everything.
pub fn filter_platform_selectors(content: &str, platform: &str) -> Result<Vec<String>, SpecError> {
    let aliases = platform_aliases(platform)
        .ok_or_else(|| SpecError::UnknownPlatform(platform.to_owned()))?;

    let mut kept = Vec::new();
    for line in content.lines() {
        if line.trim_start().starts_with('#') {
            continue;
        }
        if let Some(caps) = selector_pattern().captures(line) {
            let cond = &caps[2];
            if cond == platform || aliases.contains(&cond) {
                kept.push(caps[1].trim_end().to_owned());
            }
        } else {
            kept.push(line.to_owned());
        }
    }
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_kept_and_stripped_on_matching_platform() {
        let out = filter_platform_selectors("foo =1.0  # [linux64]", "linux-64").unwrap();
        assert_eq!(out, vec!["foo =1.0".to_owned()]);
    }

    #[test]
    fn selector_dropped_on_other_platform() {
        let out = filter_platform_selectors("foo =1.0  # [linux64]", "osx-64").unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn full_platform_id_matches_itself() {
        let out = filter_platform_selectors("bar >=2  # [osx-arm64]", "osx-arm64").unwrap();
        assert_eq!(out, vec!["bar >=2".to_owned()]);
    }

    #[test]
    fn unix_alias_matches_all_unix_platforms() {
        for platform in ["linux-64", "linux-aarch64", "osx-64", "osx-arm64"] {
            let out = filter_platform_selectors("z  # [unix]", platform).unwrap();
            assert_eq!(out, vec!["z".to_owned()], "failed for {platform}");
        }
        let out = filter_platform_selectors("z  # [unix]", "win-64").unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn line_without_selector_kept_for_every_platform() {
        for platform in crate::platform::PLATFORMS {
            let out = filter_platform_selectors("- python >=3.9", platform).unwrap();
            assert_eq!(out, vec!["- python >=3.9".to_owned()]);
        }
    }

    #[test]
    fn plain_comment_lines_dropped() {
        let content = "# a comment\n  # indented comment\nreal line\n";
        let out = filter_platform_selectors(content, "linux-64").unwrap();
        assert_eq!(out, vec!["real line".to_owned()]);
    }

    #[test]
    fn relative_order_preserved() {
        let content = "a\nb  # [linux]\nc\nd  # [win]\ne\n";
        let out = filter_platform_selectors(content, "linux-64").unwrap();
        assert_eq!(out, vec!["a", "b", "c", "e"]);
    }

    #[test]
    fn unknown_platform_is_a_configuration_error() {
        let err = filter_platform_selectors("foo", "solaris-64").unwrap_err();
        assert!(matches!(err, SpecError::UnknownPlatform(p) if p == "solaris-64"));
    }

    #[test]
    fn selector_without_inline_comment() {
        let out = filter_platform_selectors("foo [linux]", "linux-64").unwrap();
        assert_eq!(out, vec!["foo".to_owned()]);
    }
}
