//! Per-file transforms: module registration and CSS url rewriting.
//!
//! Everything here is a pure function of one file's contents.

use cobble_pkg::AssetType;
use regex::{Captures, Regex};
use std::path::Path;
use std::sync::OnceLock;

/// Wrap `contents` as a module registered under `name`.
#[must_use]
pub fn register(name: &str, contents: &str) -> String {
    format!("require.register(\"{name}\", function(exports, require, module){{\n{contents}\n}});\n")
}

/// Like [`register`], but evaluates the source through `Function` with a
/// `sourceURL` annotation so debuggers show each module as its own file.
#[must_use]
pub fn register_with_source_url(name: &str, contents: &str) -> String {
    let annotated = format!("{contents}//@ sourceURL={name}");
    let quoted = serde_json::Value::String(annotated).to_string();
    format!("require.register(\"{name}\", Function(\"exports, require, module\",\n{quoted}\n));\n")
}

/// Module source for a JSON document.
#[must_use]
pub fn json_module(contents: &str) -> String {
    format!("module.exports = {contents}")
}

/// Module source exporting `contents` as a string literal.
#[must_use]
pub fn string_module(contents: &str) -> String {
    let mut escaped = String::with_capacity(contents.len());
    let mut chars = contents.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                escaped.push_str("\\n");
            }
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    format!("module.exports = '{escaped}';")
}

/// Module source for a file of `ty`, before registration.
#[must_use]
pub fn module_source(ty: AssetType, contents: &str) -> String {
    match ty {
        AssetType::Json => json_module(contents),
        AssetType::Templates => string_module(contents),
        _ => contents.to_string(),
    }
}

fn url_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\burl *\(([^)]+)\)").ok())
        .as_ref()
}

/// Rewrite relative `url(...)` references in a stylesheet.
///
/// Each relative url is resolved against
/// `<url_prefix>/<package_prefix>/<dir of filename>/`. Data URIs, absolute
/// paths and urls with a scheme are left untouched. A leading `/` or
/// `scheme://host` on `url_prefix` is kept as is; dot segments are folded
/// only in the path after it.
#[must_use]
pub fn rewrite_urls(css: &str, filename: &str, package_prefix: &str, url_prefix: &str) -> String {
    let Some(pattern) = url_pattern() else {
        return css.to_string();
    };

    let file_dir = Path::new(filename)
        .parent()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default();
    let (origin, prefix_path) = split_origin(url_prefix);
    let base = [prefix_path, package_prefix, file_dir.as_str()];

    pattern
        .replace_all(css, |caps: &Captures<'_>| {
            let raw = &caps[1];
            let url = strip_quotes(raw.trim());
            if url.starts_with("data:") || url.starts_with('/') || url.contains("://") {
                return caps[0].to_string();
            }
            format!("url(\"{}\")", join_origin(origin, &resolve(&base, url)))
        })
        .into_owned()
}

fn strip_quotes(url: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = url
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    url
}

/// Split a url prefix into the part kept verbatim (`/`, `//host` or
/// `scheme://host`) and the path after it.
fn split_origin(prefix: &str) -> (&str, &str) {
    let host_start = match prefix.find("://") {
        Some(i) => i + 3,
        None if prefix.starts_with("//") => 2,
        None if prefix.starts_with('/') => return prefix.split_at(1),
        None => return ("", prefix),
    };
    let end = prefix[host_start..]
        .find('/')
        .map_or(prefix.len(), |i| host_start + i);
    prefix.split_at(end)
}

fn join_origin(origin: &str, path: &str) -> String {
    if origin.is_empty() || origin.ends_with('/') {
        format!("{origin}{path}")
    } else {
        format!("{origin}/{path}")
    }
}

/// Join `url` onto the `base` directory segments, folding `.` and `..`.
fn resolve(base: &[&str], url: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in base.iter().flat_map(|s| s.split('/')).chain(url.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_wraps_in_function() {
        assert_eq!(
            register("hello/foo.js", "module.exports = 'foo';"),
            "require.register(\"hello/foo.js\", function(exports, require, module){\nmodule.exports = 'foo';\n});\n"
        );
    }

    #[test]
    fn source_url_registration_quotes_contents() {
        let out = register_with_source_url("hello/foo.js", "var a = \"x\";\n");
        assert_eq!(
            out,
            "require.register(\"hello/foo.js\", Function(\"exports, require, module\",\n\"var a = \\\"x\\\";\\n//@ sourceURL=hello/foo.js\"\n));\n"
        );
    }

    #[test]
    fn json_is_exported_verbatim() {
        assert_eq!(
            module_source(AssetType::Json, "{\n  \"key\": \"value\"\n}"),
            "module.exports = {\n  \"key\": \"value\"\n}"
        );
    }

    #[test]
    fn templates_become_string_literals() {
        assert_eq!(
            module_source(AssetType::Templates, "<p class='x'>\r\n  a\\b\n</p>"),
            "module.exports = '<p class=\\'x\\'>\\n  a\\\\b\\n</p>';"
        );
    }

    #[test]
    fn scripts_pass_through() {
        assert_eq!(module_source(AssetType::Scripts, "x"), "x");
    }

    #[test]
    fn rewrite_relative_urls() {
        let css = "a { background: url('images/logo.png'); }\nb { background: url(\"./images/npm.png\") }";
        let out = rewrite_urls(css, "index.css", "assets", "build");
        assert!(out.contains(r#"url("build/assets/images/logo.png")"#));
        assert!(out.contains(r#"url("build/assets/images/npm.png")"#));
    }

    #[test]
    fn rewrite_resolves_against_file_directory() {
        let out = rewrite_urls("a { src: url(../fonts/x.ttf) }", "css/index.css", "theme", "");
        assert_eq!(out, r#"a { src: url("theme/fonts/x.ttf") }"#);
    }

    #[test]
    fn rewrite_keeps_absolute_prefix() {
        let out = rewrite_urls("a { b: url(logo.png) }", "index.css", "assets", "/static");
        assert_eq!(out, r#"a { b: url("/static/assets/logo.png") }"#);

        let out = rewrite_urls("a { b: url(../../../x.png) }", "css/index.css", "assets", "/");
        assert_eq!(out, r#"a { b: url("/x.png") }"#);
    }

    #[test]
    fn rewrite_keeps_scheme_and_host() {
        let out = rewrite_urls(
            "a { b: url(logo.png) }",
            "index.css",
            "assets",
            "http://cdn.example.com/s",
        );
        assert_eq!(out, r#"a { b: url("http://cdn.example.com/s/assets/logo.png") }"#);

        let out = rewrite_urls("a { b: url(./img/a.png) }", "index.css", "assets", "//cdn.example.com");
        assert_eq!(out, r#"a { b: url("//cdn.example.com/assets/img/a.png") }"#);
    }

    #[test]
    fn rewrite_leaves_absolute_urls() {
        let css = "a { b: url(http://example.com/images/manny.png); c: url(/public/images/foo.png); d: url(data:image/png;base64,PNG DATA HERE) }";
        let out = rewrite_urls(css, "index.css", "assets", "build");
        assert_eq!(out, css);
    }
}
