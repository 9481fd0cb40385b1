//! Report branding: title, inlined CSS/JS, favicon.
//!
//! The generated report is patched textually against known marker literals,
//! not through a DOM. That keeps the patching a pure function over the HTML
//! string, testable against fixture HTML without running the generator.

use base64::Engine;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

use crate::error::Result;

/// Default title emitted by the generator; replaced when a custom title is
/// configured.
const DEFAULT_TITLE_TAG: &str = "<title>Allure Report</title>";

fn favicon_link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"<link[^>]*rel=["']icon["'][^>]*>"#).expect("favicon pattern is valid")
    })
}

/// Optional cosmetic customization, resolved once at finalize time. Empty
/// fields leave the default report unmodified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrandingConfig {
    pub title: String,
    /// Filesystem path to a stylesheet to inline.
    pub css_path: String,
    /// Filesystem path to a script to inline.
    pub js_path: String,
    /// Literal data URI, or a filesystem path to base64-encode.
    pub favicon: String,
}

impl BrandingConfig {
    /// Load from a java-style properties file. A missing file yields empty
    /// defaults rather than an error; any other read failure also falls back
    /// to defaults but is logged at warn so a present-but-broken file does
    /// not silently ship an unbranded report.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_properties(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No branding properties at {}", path.display());
                Self::default()
            }
            Err(e) => {
                log::warn!(
                    "Could not read branding properties at {}: {}",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    fn from_properties(text: &str) -> Self {
        let mut branding = Self::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().to_string();
            match key.trim() {
                "allure.report.title" => branding.title = value,
                "allure.report.css" => branding.css_path = value,
                "allure.report.js" => branding.js_path = value,
                "allure.report.favicon" => branding.favicon = value,
                other => log::debug!("Ignoring unknown branding key {:?}", other),
            }
        }
        branding
    }
}

/// Apply the branding substitutions in fixed order: title, CSS, JS, favicon.
/// Absent fields are no-ops; configured CSS/JS/favicon paths that cannot be
/// read abort finalization.
pub fn apply_branding(html: &str, branding: &BrandingConfig) -> Result<String> {
    let mut html = html.to_string();

    if !branding.title.is_empty() {
        html = html.replace(
            DEFAULT_TITLE_TAG,
            &format!("<title>{}</title>", branding.title),
        );
    }

    if !branding.css_path.is_empty() {
        let css = std::fs::read_to_string(&branding.css_path)?;
        html = html.replace("</head>", &format!("<style>\n{}\n</style>\n</head>", css));
    }

    if !branding.js_path.is_empty() {
        let js = std::fs::read_to_string(&branding.js_path)?;
        html = html.replace("</body>", &format!("<script>\n{}\n</script>\n</body>", js));
    }

    // Stale favicon tags are stripped even when no replacement is configured
    html = favicon_link_pattern().replace_all(&html, "").to_string();
    if let Some(tag) = favicon_tag(&branding.favicon)? {
        html = html.replace("</head>", &format!("{}\n</head>", tag));
    }

    Ok(html)
}

/// Build the favicon link tag. Data URIs are used verbatim; paths are read
/// and embedded as base64 with the MIME type inferred from the extension.
fn favicon_tag(favicon: &str) -> Result<Option<String>> {
    if favicon.is_empty() {
        return Ok(None);
    }
    if favicon.starts_with("data:image") {
        return Ok(Some(format!("<link rel=\"icon\" href=\"{}\"/>", favicon)));
    }

    let path = Path::new(favicon);
    let bytes = std::fs::read(path)?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    let mime_type = if favicon.ends_with(".png") {
        "image/png"
    } else {
        "image/x-icon"
    };
    Ok(Some(format!(
        "<link rel=\"icon\" type=\"{}\" href=\"data:{};base64,{}\"/>",
        mime_type, mime_type, encoded
    )))
}
