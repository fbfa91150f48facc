use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Width used when flattening single-line markup (titles) so html2text never wraps it.
const FLAT_WIDTH: usize = 10_000;

/// A WordPress-style rich-text field: server-rendered HTML plus its protection flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RenderedField {
    pub rendered: String,
    #[serde(default)]
    pub protected: bool,
}

impl RenderedField {
    pub fn new(rendered: impl Into<String>) -> Self {
        Self {
            rendered: rendered.into(),
            protected: false,
        }
    }
}

/// A single cached blog post, in the shape the list endpoint returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: RenderedField,
    pub content: RenderedField,
    pub excerpt: RenderedField,
    pub date: String,
    pub modified: String,
    pub author: i64,
    #[serde(default)]
    pub featured_media: i64,
    #[serde(default)]
    pub link: String,
}

impl Post {
    pub fn has_featured_media(&self) -> bool {
        self.featured_media != 0
    }

    /// Title with entities decoded and any inline markup stripped.
    pub fn title_text(&self) -> String {
        flatten_html(&self.title.rendered, FLAT_WIDTH)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Plain-text excerpt for list cards.
    pub fn excerpt_text(&self) -> String {
        flatten_html(&self.excerpt.rendered, FLAT_WIDTH).trim().to_string()
    }

    /// Post body rendered as wrapped plain text for the terminal reader.
    pub fn content_text(&self, width: usize) -> String {
        flatten_html(&self.content.rendered, width.max(20))
    }

    /// Standalone HTML document for an embedded web renderer.
    ///
    /// `content.rendered` is inserted verbatim: the blog is the single trusted
    /// origin and no sanitization happens here, so any embedding context must
    /// treat the result as trusted markup from that origin.
    pub fn content_document(&self) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
        body {{
            font-family: system-ui;
            padding: 16px;
            margin: 0;
            line-height: 1.6;
        }}
        img {{
            max-width: 100%;
            height: auto;
        }}
        pre {{
            overflow-x: auto;
            background: #f5f5f5;
            padding: 16px;
            border-radius: 4px;
        }}
    </style>
</head>
<body>
    {}
</body>
</html>"#,
            self.content.rendered
        )
    }

    /// Publication date formatted for display, falling back to the raw value.
    pub fn published_display(&self) -> String {
        // WordPress sends local time without an offset, e.g. "2024-03-01T09:30:00"
        if let Ok(naive) = NaiveDateTime::parse_from_str(&self.date, "%Y-%m-%dT%H:%M:%S") {
            return naive.format("%b %-d, %Y").to_string();
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(&self.date) {
            return dt.format("%b %-d, %Y").to_string();
        }
        self.date.clone()
    }
}

fn flatten_html(html: &str, width: usize) -> String {
    match html2text::from_read(html.as_bytes(), width) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!("Failed to render html: {}", e);
            html.to_string()
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_post(id: i64, date: &str) -> Post {
    Post {
        id,
        title: RenderedField::new(format!("Post {id}")),
        content: RenderedField::new(format!("<p>Body of post {id}</p>")),
        excerpt: RenderedField::new(format!("<p>Excerpt {id}</p>")),
        date: date.to_string(),
        modified: date.to_string(),
        author: 1,
        featured_media: 0,
        link: format!("https://blog.example.com/?p={id}"),
    }
}
