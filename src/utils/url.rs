// src/utils/url.rs

//! URL manipulation utilities.

use url::Url;

/// Query parameters that vary between page loads without the target changing.
pub const VOLATILE_QUERY_PARAMS: [&str; 8] = [
    "forcedownload",
    "forceview",
    "time",
    "v",
    "t",
    "_",
    "sesskey",
    "redirect",
];

/// Check whether a query parameter name is volatile.
pub fn is_volatile_param(name: &str) -> bool {
    VOLATILE_QUERY_PARAMS.contains(&name)
}

/// Canonicalize a link so that cosmetic differences do not change its identity.
///
/// Relative links are resolved against `base`, volatile query parameters are
/// dropped (the remaining ones keep their order) and the fragment is cleared.
/// A link that cannot be parsed is returned unchanged.
///
/// # Examples
/// ```
/// use course_watch::utils::url::canonicalize;
/// use url::Url;
///
/// let base = Url::parse("https://elearning.example.edu").unwrap();
/// assert_eq!(
///     canonicalize(&base, "/mod/resource/view.php?id=5&sesskey=abc#top"),
///     "https://elearning.example.edu/mod/resource/view.php?id=5"
/// );
/// ```
pub fn canonicalize(base: &Url, href: &str) -> String {
    let mut url = match base.join(href) {
        Ok(url) => url,
        Err(_) => return href.to_string(),
    };

    strip_volatile_params(&mut url);
    url.set_fragment(None);
    url.to_string()
}

fn strip_volatile_params(url: &mut Url) {
    if url.query().is_none() {
        return;
    }

    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    if !pairs.iter().any(|(key, _)| is_volatile_param(key)) {
        // Leave untouched queries byte-identical
        return;
    }

    let kept: Vec<(String, String)> = pairs
        .into_iter()
        .filter(|(key, _)| !is_volatile_param(key))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
}

/// Extract a stable course identifier from a course URL.
///
/// Uses the `id` query parameter; falls back to the URL itself.
pub fn extract_course_id(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .query_pairs()
                .find(|(key, value)| key == "id" && !value.is_empty())
                .map(|(_, value)| value.into_owned())
        })
        .unwrap_or_else(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://elearning.univ-bejaia.dz").unwrap()
    }

    #[test]
    fn test_canonicalize_strips_sesskey_and_fragment() {
        let a = canonicalize(&base(), "https://elearning.univ-bejaia.dz/mod/page/view.php?id=5&sesskey=abc#top");
        let b = canonicalize(&base(), "https://elearning.univ-bejaia.dz/mod/page/view.php?id=5");
        assert_eq!(a, b);
        assert_eq!(a, "https://elearning.univ-bejaia.dz/mod/page/view.php?id=5");
    }

    #[test]
    fn test_canonicalize_resolves_relative_against_origin() {
        assert_eq!(
            canonicalize(&base(), "/pluginfile.php/123/mod_resource/content/1/td1.pdf?forcedownload=1"),
            "https://elearning.univ-bejaia.dz/pluginfile.php/123/mod_resource/content/1/td1.pdf"
        );
    }

    #[test]
    fn test_canonicalize_keeps_remaining_param_order() {
        assert_eq!(
            canonicalize(&base(), "/mod/forum/discuss.php?d=9&t=171&a=1&_=2&redirect=0"),
            "https://elearning.univ-bejaia.dz/mod/forum/discuss.php?d=9&a=1"
        );
    }

    #[test]
    fn test_canonicalize_only_volatile_params_drops_query() {
        assert_eq!(
            canonicalize(&base(), "/course/view.php?time=1700000000&v=3"),
            "https://elearning.univ-bejaia.dz/course/view.php"
        );
    }

    #[test]
    fn test_canonicalize_malformed_falls_back_to_raw() {
        let raw = "http://[not-an-ip/file.pdf";
        assert_eq!(canonicalize(&base(), raw), raw);
    }

    #[test]
    fn test_canonicalize_leaves_non_volatile_query_untouched() {
        assert_eq!(
            canonicalize(&base(), "https://other.example/view?id=1&mode=full"),
            "https://other.example/view?id=1&mode=full"
        );
    }

    #[test]
    fn test_extract_course_id() {
        assert_eq!(
            extract_course_id("https://elearning.univ-bejaia.dz/course/view.php?id=19984"),
            "19984"
        );
        assert_eq!(
            extract_course_id("https://elearning.univ-bejaia.dz/course/view.php"),
            "https://elearning.univ-bejaia.dz/course/view.php"
        );
        assert_eq!(extract_course_id("not a url"), "not a url");
    }
}
