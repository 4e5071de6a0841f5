//! Blog export to Markdown, standalone HTML and WordPress (WXR) XML.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::content::{strip_tags, strip_tags_except};
use crate::db::models::{BlogStatus, BlogWithSeo, SeoMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Markdown,
    Html,
    Wordpress,
}

/// Tags that survive the first Markdown pass.
const MARKDOWN_ALLOWED_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "a", "strong", "em", "ul", "ol", "li",
    "blockquote", "code", "pre",
];

lazy_static::lazy_static! {
    static ref MARKDOWN_RULES: Vec<(Regex, &'static str)> = vec![
        (Regex::new(r"(?is)<h1\b[^>]*>(.*?)</h1>").unwrap(), "# ${1}\n\n"),
        (Regex::new(r"(?is)<h2\b[^>]*>(.*?)</h2>").unwrap(), "## ${1}\n\n"),
        (Regex::new(r"(?is)<h3\b[^>]*>(.*?)</h3>").unwrap(), "### ${1}\n\n"),
        (Regex::new(r"(?is)<p\b[^>]*>(.*?)</p>").unwrap(), "${1}\n\n"),
        (Regex::new(r"(?is)<strong\b[^>]*>(.*?)</strong>").unwrap(), "**${1}**"),
        (Regex::new(r"(?is)<em\b[^>]*>(.*?)</em>").unwrap(), "*${1}*"),
    ];
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Wrap `s` in a CDATA section, splitting any embedded terminator.
fn cdata(s: &str) -> String {
    format!("<![CDATA[{}]]>", s.replace("]]>", "]]]]><![CDATA[>"))
}

fn joined_keywords(seo: &SeoMetadata) -> String {
    seo.keywords.join(", ")
}

/// Convert stored HTML to simple Markdown.
pub fn html_to_markdown(html: &str) -> String {
    let mut text = strip_tags_except(html, MARKDOWN_ALLOWED_TAGS);
    for (pattern, replacement) in MARKDOWN_RULES.iter() {
        text = pattern.replace_all(&text, *replacement).into_owned();
    }
    strip_tags(&text)
}

pub fn to_markdown(post: &BlogWithSeo) -> String {
    let mut out = format!("# {}\n\n", post.blog.title);

    if let Some(seo) = &post.seo_metadata {
        out.push_str("---\n");
        out.push_str(&format!(
            "meta_title: {}\n",
            seo.meta_title.as_deref().unwrap_or_default()
        ));
        out.push_str(&format!(
            "meta_description: {}\n",
            seo.meta_description.as_deref().unwrap_or_default()
        ));
        out.push_str(&format!("keywords: {}\n", joined_keywords(seo)));
        out.push_str("---\n\n");
    }

    out.push_str(&html_to_markdown(&post.blog.content));
    out
}

pub fn to_html(post: &BlogWithSeo) -> String {
    let blog = &post.blog;
    let mut out = String::from("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    out.push_str("  <meta charset=\"UTF-8\">\n");
    out.push_str(
        "  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
    );

    match &post.seo_metadata {
        Some(seo) => {
            let title = seo.meta_title.as_deref().unwrap_or(&blog.title);
            out.push_str(&format!("  <title>{}</title>\n", escape_html(title)));
            out.push_str(&format!(
                "  <meta name=\"description\" content=\"{}\">\n",
                escape_html(seo.meta_description.as_deref().unwrap_or_default())
            ));
            out.push_str(&format!(
                "  <meta name=\"keywords\" content=\"{}\">\n",
                escape_html(&joined_keywords(seo))
            ));
        }
        None => out.push_str(&format!("  <title>{}</title>\n", escape_html(&blog.title))),
    }

    out.push_str("</head>\n<body>\n  <article>\n");
    out.push_str(&format!("    <h1>{}</h1>\n", escape_html(&blog.title)));
    out.push_str(&format!("    {}\n", blog.content));
    out.push_str("  </article>\n</body>\n</html>");
    out
}

/// WordPress post status for a blog status string.
fn wordpress_status(status: &str) -> &'static str {
    if status == BlogStatus::Published.as_str() {
        "publish"
    } else {
        "draft"
    }
}

pub fn to_wordpress(post: &BlogWithSeo) -> String {
    let blog = &post.blog;
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(
        "<rss version=\"2.0\"\n  \
         xmlns:content=\"http://purl.org/rss/1.0/modules/content/\"\n  \
         xmlns:wp=\"http://wordpress.org/export/1.2/\">\n",
    );
    out.push_str("<channel>\n<item>\n");
    out.push_str(&format!("  <title>{}</title>\n", cdata(&blog.title)));
    out.push_str(&format!(
        "  <content:encoded>{}</content:encoded>\n",
        cdata(&blog.content)
    ));
    out.push_str("  <wp:post_type>post</wp:post_type>\n");
    out.push_str(&format!(
        "  <wp:status>{}</wp:status>\n",
        wordpress_status(&blog.status)
    ));

    for tag in &blog.tags {
        out.push_str(&format!(
            "  <category domain=\"post_tag\">{}</category>\n",
            cdata(tag)
        ));
    }
    if let Some(category) = blog.category.as_deref().filter(|c| !c.is_empty()) {
        out.push_str(&format!(
            "  <category domain=\"category\">{}</category>\n",
            cdata(category)
        ));
    }

    out.push_str("</item>\n</channel>\n</rss>");
    out
}

pub fn export(post: &BlogWithSeo, format: ExportFormat) -> String {
    match format {
        ExportFormat::Markdown => to_markdown(post),
        ExportFormat::Html => to_html(post),
        ExportFormat::Wordpress => to_wordpress(post),
    }
}
