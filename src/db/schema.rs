pub const SCHEMA: &str = r#"
-- posts table (mirror of the remote list endpoint)
-- title/content/excerpt hold the rich-text fields as JSON: {"rendered": "...", "protected": false}
CREATE TABLE IF NOT EXISTS posts (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    excerpt TEXT NOT NULL,
    date TEXT NOT NULL,
    modified TEXT NOT NULL,
    author INTEGER NOT NULL,
    featured_media INTEGER NOT NULL DEFAULT 0,
    link TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_posts_date ON posts(date DESC);
"#;
