//! Versioning & Distribution Parser (§4.7): internal-rebuild, internal-port
//! and external-port version string generation. Distribution identifier
//! parsing itself lives in `types::Distribution`; this module only concerns
//! the version-string transforms layered on top of it.

use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;

/// `rebuiltYYYYMMDDhhmmss`, UTC, matching `mini_buildd.daemon.DebianVersion.stamp`.
pub fn rebuild_stamp_now() -> String {
    Utc::now().format("%Y%m%d%H%M%S").to_string()
}

fn rebuild_suffix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\+rebuilt[0-9]{14}").expect("static regex is valid"))
}

/// Appends (or replaces an existing) `+rebuiltYYYYMMDDhhmmss` suffix on
/// `version`. Idempotent: re-running on an already-rebuilt version replaces
/// the old stamp rather than appending a second one.
pub fn gen_internal_rebuild(version: &str, stamp: &str) -> String {
    let suffix = format!("+rebuilt{stamp}");
    match rebuild_suffix_regex().find_iter(version).last() {
        Some(m) => format!("{}{}{}", &version[..m.start()], suffix, &version[m.end()..]),
        None => format!("{version}{suffix}"),
    }
}

/// Builds the per-distribution mandatory-version regex from a suite's
/// template (e.g. `~test{codeversion}+[1-9]`) and a codename's codeversion.
pub fn render_mandatory_version_regex(template: &str, codeversion: &str) -> Regex {
    let rendered = template.replace("{codeversion}", codeversion);
    Regex::new(&rendered).unwrap_or_else(|_| {
        Regex::new(&regex::escape(&rendered)).expect("escaped literal always compiles")
    })
}

/// A suite's default (lowest) revision version for a given codeversion,
/// e.g. template `~test{codeversion}+[1-9]` with codeversion `SID` yields
/// `~testSID+1`: the character class is resolved to its first member.
pub fn default_version_for_template(template: &str, codeversion: &str) -> String {
    let rendered = template.replace("{codeversion}", codeversion);
    let class_re = Regex::new(r"\[([^\]]+)\]").expect("static regex is valid");
    match class_re.captures(&rendered) {
        Some(caps) => {
            let class_body = &caps[1];
            let first = class_body.chars().next().unwrap_or('1');
            format!(
                "{}{}{}",
                &rendered[..caps.get(0).unwrap().start()],
                first,
                &rendered[caps.get(0).unwrap().end()..]
            )
        }
        None => rendered,
    }
}

/// Guesses a codename's `codeversion`: the first release number component
/// for a released suite, or `CODENAME` uppercased for a rolling one (sid,
/// testing) that carries no fixed release number (§4.7, grounded on
/// `original_source/src/mini_buildd/misc.py: guess_codeversion`, since the
/// core has no Release file to read from outside its own configuration).
pub fn guess_codeversion(codename: &str) -> String {
    const KNOWN: &[(&str, &str)] = &[
        ("woody", "30"),
        ("sarge", "31"),
        ("etch", "40"),
        ("lenny", "50"),
        ("squeeze", "60"),
        ("wheezy", "70"),
        ("jessie", "80"),
        ("stretch", "90"),
        ("buster", "100"),
        ("bullseye", "110"),
        ("bookworm", "120"),
        ("trixie", "130"),
    ];
    KNOWN
        .iter()
        .find(|(name, _)| *name == codename)
        .map(|(_, v)| v.to_string())
        .unwrap_or_else(|| codename.to_uppercase())
}

/// `\+[0-9]`, used to locate (and carry over) a single-digit revision number
/// inside a rendered mandatory-version tail.
fn revision_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\+[0-9]").expect("static regex is valid"))
}

fn rightmost<'a>(re: &Regex, haystack: &'a str) -> Option<regex::Match<'a>> {
    re.find_iter(haystack).last()
}

fn sub_rightmost(re: &Regex, replacement: &str, haystack: &str) -> String {
    match rightmost(re, haystack) {
        Some(m) => format!("{}{}{}", &haystack[..m.start()], replacement, &haystack[m.end()..]),
        None => format!("{haystack}{replacement}"),
    }
}

/// Internal port: rewrites the rightmost match of `from_mandatory_version_regex`
/// in `version` with `to_default_version`, preserving a `+N` revision digit
/// carried in the matched tail if one is present (§4.7).
pub fn gen_internal_port(version: &str, from_mandatory_version_regex: &Regex, to_default_version: &str) -> String {
    let from_match = rightmost(from_mandatory_version_regex, version);
    let actual_to_default_version = match from_match {
        Some(m) => {
            let matched_tail = &version[m.start()..m.end()];
            match rightmost(revision_regex(), matched_tail) {
                Some(rev) => {
                    let revision = &matched_tail[rev.start()..rev.end()];
                    sub_rightmost(revision_regex(), revision, to_default_version)
                }
                None => to_default_version.to_string(),
            }
        }
        None => to_default_version.to_string(),
    };
    sub_rightmost(from_mandatory_version_regex, &actual_to_default_version, version)
}

/// External port: appends the target suite's default version verbatim.
pub fn gen_external_port(version: &str, default_version: &str) -> String {
    format!("{version}{default_version}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_rebuild_appends_stamp_when_absent() {
        let result = gen_internal_rebuild("1.2.3", "20130215100453");
        let re = Regex::new(r"^1\.2\.3\+rebuilt\d{14}$").unwrap();
        assert!(re.is_match(&result), "{result}");
    }

    #[test]
    fn internal_rebuild_replaces_existing_stamp() {
        let result = gen_internal_rebuild("1.2.3+rebuilt20130215100453", "20130217120517");
        assert_eq!(result, "1.2.3+rebuilt20130217120517");
    }

    #[test]
    fn internal_rebuild_is_idempotent_in_shape() {
        let once = gen_internal_rebuild("1.2.3", "20130215100453");
        let twice = gen_internal_rebuild(&once, "20130215100453");
        assert_eq!(once, twice);
        assert_eq!(once.matches("+rebuilt").count(), 1);
    }

    #[test]
    fn sid_to_wheezy_internal_port() {
        let sid_regex = render_mandatory_version_regex(r"~test{codeversion}\+[1-9]", "SID");
        let wheezy_default = default_version_for_template(r"~test{codeversion}+[1-9]", "70");
        assert_eq!(wheezy_default, "~test70+1");

        let result = gen_internal_port("1.2.3-1~testSID+4", &sid_regex, &wheezy_default);
        assert_eq!(result, "1.2.3-1~test70+4");
    }

    #[test]
    fn internal_port_preserves_trailing_suffix_after_revision() {
        let sid_regex = render_mandatory_version_regex(r"~test{codeversion}\+[1-9]", "SID");
        let wheezy_default = "~test70+1";
        let result = gen_internal_port("1.2.3-1~testSID+4fud15", &sid_regex, wheezy_default);
        assert_eq!(result, "1.2.3-1~test70+4fud15");
    }

    #[test]
    fn internal_port_with_no_restriction_just_appends_default() {
        let any = Regex::new(r"$^").unwrap();
        let result = gen_internal_port("1.2.3-1", &any, "~port+1");
        assert_eq!(result, "1.2.3-1~port+1");
    }

    #[test]
    fn external_port_appends_default_version_verbatim() {
        assert_eq!(gen_external_port("1.2.3", "~test60+1"), "1.2.3~test60+1");
    }

    #[test]
    fn known_codename_resolves_numeric_codeversion() {
        assert_eq!(guess_codeversion("wheezy"), "70");
        assert_eq!(guess_codeversion("bookworm"), "120");
    }

    #[test]
    fn rolling_codename_falls_back_to_uppercase() {
        assert_eq!(guess_codeversion("sid"), "SID");
    }
}
