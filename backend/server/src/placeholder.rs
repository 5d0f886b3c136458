//! # Placeholder
//!
//! Inline SVG served whenever a real image cannot be obtained.
//!
//! - Self-contained, no fonts or images are referenced so it can never fail to load
//! - Byte-identical for identical inputs
//! - Fixed neutral gray background and caption colors at every failure site
use bytes::Bytes;

use crate::config::PlaceholderConfig;

pub const PLACEHOLDER_CONTENT_TYPE: &str = "image/svg+xml";

const BACKGROUND: &str = "#f3f4f6";
const FOREGROUND: &str = "#9ca3af";

pub fn placeholder(width: u32, height: u32, caption: &str) -> Bytes {
    let width = width.max(1);
    let height = height.max(1);
    let font_size = (width.min(height) / 16).clamp(10, 32);

    let svg = format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            r#"<rect width="100%" height="100%" fill="{bg}"/>"#,
            r#"<text x="50%" y="50%" fill="{fg}" font-family="sans-serif" font-size="{fs}" "#,
            r#"text-anchor="middle" dominant-baseline="middle">{caption}</text>"#,
            "</svg>"
        ),
        w = width,
        h = height,
        bg = BACKGROUND,
        fg = FOREGROUND,
        fs = font_size,
        caption = escape(caption),
    );

    Bytes::from(svg)
}

pub fn from_config(config: &PlaceholderConfig) -> Bytes {
    placeholder(config.width, config.height, &config.caption)
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c if c.is_control() => {}
            c => escaped.push(c),
        }
    }

    escaped
}

#[cfg(test)]
mod tests {
    use super::placeholder;
    use crate::config::PlaceholderConfig;

    #[test]
    fn test_deterministic() {
        assert_eq!(
            placeholder(400, 300, "Image not available"),
            placeholder(400, 300, "Image not available")
        );
    }

    #[test]
    fn test_default_snapshot() {
        let defaults = PlaceholderConfig::default();
        let svg = super::from_config(&defaults);

        assert_eq!(
            std::str::from_utf8(&svg).unwrap(),
            concat!(
                r##"<svg xmlns="http://www.w3.org/2000/svg" width="400" height="300" viewBox="0 0 400 300">"##,
                r##"<rect width="100%" height="100%" fill="#f3f4f6"/>"##,
                r##"<text x="50%" y="50%" fill="#9ca3af" font-family="sans-serif" font-size="18" "##,
                r##"text-anchor="middle" dominant-baseline="middle">Image not available</text>"##,
                "</svg>"
            )
        );
    }

    #[test]
    fn test_caption_is_escaped() {
        let svg = placeholder(100, 100, "<script>alert('x')</script> & \"more\"");
        let svg = std::str::from_utf8(&svg).unwrap();

        assert!(!svg.contains("<script>"));
        assert!(svg.contains("&lt;script&gt;alert(&apos;x&apos;)&lt;/script&gt; &amp; &quot;more&quot;"));
    }

    #[test]
    fn test_self_contained() {
        let svg = placeholder(640, 480, "Missing");
        let svg = std::str::from_utf8(&svg).unwrap();

        assert!(!svg.contains("href"));
        assert!(!svg.contains("url("));
        assert!(svg.contains(r#"width="640" height="480""#));
    }

    #[test]
    fn test_zero_dimensions_are_clamped() {
        let svg = placeholder(0, 0, "x");

        assert!(std::str::from_utf8(&svg).unwrap().contains(r#"viewBox="0 0 1 1""#));
    }
}
