//! HTML rendering of a digest for the HTML message
//!
//! Produces a self-contained HTML email: title, a metadata block, an
//! optional AI summary, optional tag chips and finally the captured
//! article HTML. Missing optional fields either drop their section or
//! render as `unknown`; rendering never fails.

use crate::digest::DigestBundle;
use std::fmt;

const UNKNOWN: &str = "unknown";

const STYLE: &str = "\
    body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', Arial, sans-serif; line-height: 1.6; max-width: 800px; margin: 0 auto; padding: 20px; color: #333; }
    h1 { color: #2563eb; border-bottom: 2px solid #2563eb; padding-bottom: 10px; }
    .metadata { background: #f3f4f6; padding: 15px; border-radius: 5px; margin: 20px 0; }
    .metadata p { margin: 5px 0; }
    .content { margin-top: 30px; }
    .summary { background: #eff6ff; border-left: 4px solid #2563eb; padding: 15px; margin: 20px 0; }
    .tags { margin: 20px 0; }
    .tag { display: inline-block; background: #e5e7eb; padding: 5px 10px; border-radius: 3px; margin-right: 5px; font-size: 14px; }";

/// Render `bundle` as a complete HTML document.
#[must_use]
pub fn render_html(bundle: &DigestBundle) -> String {
    HtmlDocument(bundle).to_string()
}

struct HtmlDocument<'a>(&'a DigestBundle);

impl fmt::Display for HtmlDocument<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bundle = self.0;
        let title = escape(&bundle.title);
        let url = escape(&bundle.url);

        f.write_str("<!DOCTYPE html>\n<html>\n<head>\n  <meta charset=\"UTF-8\">\n")?;
        writeln!(f, "  <title>{title}</title>")?;
        writeln!(f, "  <style>\n{STYLE}\n  </style>")?;
        f.write_str("</head>\n<body>\n")?;
        writeln!(f, "  <h1>{title}</h1>")?;

        f.write_str("  <div class=\"metadata\">\n")?;
        writeln!(f, "    <p><strong>URL:</strong> <a href=\"{url}\">{url}</a></p>")?;
        writeln!(
            f,
            "    <p><strong>Author:</strong> {}</p>",
            or_unknown(bundle.author.as_deref())
        )?;
        writeln!(
            f,
            "    <p><strong>Site:</strong> {}</p>",
            or_unknown(bundle.site_name.as_deref())
        )?;
        writeln!(
            f,
            "    <p><strong>Created:</strong> {}</p>",
            or_unknown(Some(&bundle.created_at))
        )?;
        if let Some(published) = non_empty(bundle.metadata.published_time.as_deref()) {
            writeln!(f, "    <p><strong>Published:</strong> {}</p>", escape(published))?;
        }
        f.write_str("  </div>\n")?;

        if let Some(summary) = non_empty(bundle.summary.as_deref()) {
            writeln!(
                f,
                "  <div class=\"summary\">\n    <h3>AI Summary</h3>\n    <p>{}</p>\n  </div>",
                escape(summary)
            )?;
        }

        if let Some(tags) = bundle.tags.as_ref().filter(|t| !t.is_empty()) {
            f.write_str("  <div class=\"tags\">\n    ")?;
            for tag in tags {
                write!(f, "<span class=\"tag\">{}</span>", escape(tag))?;
            }
            f.write_str("\n  </div>\n")?;
        }

        f.write_str("  <div class=\"content\">\n")?;
        f.write_str(&bundle.html)?;
        f.write_str("\n  </div>\n</body>\n</html>")
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn or_unknown(value: Option<&str>) -> String {
    non_empty(value).map_or_else(|| UNKNOWN.to_string(), escape)
}

/// Escape text for use in HTML element content and quoted attributes.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
