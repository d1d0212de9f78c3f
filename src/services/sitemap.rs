//! sitemap.xml and robots.txt for the public storefront.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::fmt::Write;
use uuid::Uuid;

use crate::domain::blog::PostStatus;

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
const IMAGE_NS: &str = "http://www.google.com/schemas/sitemap-image/1.1";

/// Storefront pages always listed: path, priority, change frequency.
const STATIC_PAGES: &[(&str, &str, &str)] = &[
    ("/", "1.0", "daily"),
    ("/shop", "0.9", "daily"),
    ("/blog", "0.8", "daily"),
    ("/about", "0.7", "weekly"),
    ("/contact", "0.7", "monthly"),
    ("/ai-assistant", "0.8", "weekly"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<DateTime<Utc>>,
    pub changefreq: &'static str,
    pub priority: &'static str,
    pub image: Option<String>,
}

impl SitemapEntry {
    fn page(loc: String, priority: &'static str, changefreq: &'static str) -> Self {
        Self {
            loc,
            lastmod: None,
            changefreq,
            priority,
            image: None,
        }
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render(entries: &[SitemapEntry]) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(xml, "<urlset xmlns=\"{}\" xmlns:image=\"{}\">", SITEMAP_NS, IMAGE_NS);
    for entry in entries {
        xml.push_str("  <url>\n");
        let _ = writeln!(xml, "    <loc>{}</loc>", escape(&entry.loc));
        if let Some(lastmod) = entry.lastmod {
            let _ = writeln!(xml, "    <lastmod>{}</lastmod>", lastmod.format("%Y-%m-%d"));
        }
        let _ = writeln!(xml, "    <changefreq>{}</changefreq>", entry.changefreq);
        let _ = writeln!(xml, "    <priority>{}</priority>", entry.priority);
        if let Some(image) = entry.image.as_deref().filter(|s| !s.is_empty()) {
            let _ = writeln!(
                xml,
                "    <image:image><image:loc>{}</image:loc></image:image>",
                escape(image)
            );
        }
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

pub fn static_entries(base_url: &str) -> Vec<SitemapEntry> {
    STATIC_PAGES
        .iter()
        .map(|&(path, priority, freq)| SitemapEntry::page(format!("{}{}", base_url, path), priority, freq))
        .collect()
}

/// Every public page: static pages, active categories and products, and
/// published posts.
pub async fn build(db: &PgPool, base_url: &str) -> sqlx::Result<String> {
    let mut entries = static_entries(base_url);

    let categories: Vec<(String, DateTime<Utc>)> = sqlx::query_as(
        "SELECT slug, created_at FROM categories WHERE is_active ORDER BY sort_order, name",
    )
    .fetch_all(db)
    .await?;
    entries.extend(categories.into_iter().map(|(slug, created)| SitemapEntry {
        lastmod: Some(created),
        ..SitemapEntry::page(format!("{}/category/{}", base_url, slug), "0.8", "weekly")
    }));

    let products: Vec<(Uuid, DateTime<Utc>, Option<String>)> = sqlx::query_as(
        "SELECT id, updated_at, image_url FROM products WHERE is_active ORDER BY created_at DESC",
    )
    .fetch_all(db)
    .await?;
    entries.extend(products.into_iter().map(|(id, updated, image)| SitemapEntry {
        lastmod: Some(updated),
        image,
        ..SitemapEntry::page(format!("{}/product/{}", base_url, id), "0.9", "weekly")
    }));

    let posts: Vec<(String, DateTime<Utc>, Option<String>)> = sqlx::query_as(
        r#"
        SELECT slug, updated_at, featured_image FROM blog_posts
        WHERE status = $1 AND (publish_date IS NULL OR publish_date <= NOW())
        ORDER BY publish_date DESC NULLS LAST
        "#,
    )
    .bind(PostStatus::Published.to_string())
    .fetch_all(db)
    .await?;
    entries.extend(posts.into_iter().map(|(slug, updated, image)| SitemapEntry {
        lastmod: Some(updated),
        image,
        ..SitemapEntry::page(format!("{}/blog/{}", base_url, slug), "0.7", "monthly")
    }));

    Ok(render(&entries))
}

pub fn robots_txt(base_url: &str) -> String {
    let mut out = String::from("User-agent: *\nAllow: /\n");
    for path in ["/admin", "/cabinet", "/cart", "/checkout", "/api/"] {
        let _ = writeln!(out, "Disallow: {}", path);
    }
    let _ = write!(out, "\nSitemap: {}/sitemap.xml\n", base_url);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn renders_entries_with_escaping() {
        let entries = vec![SitemapEntry {
            loc: "https://shop.example/blog/a&b".into(),
            lastmod: Some(Utc.with_ymd_and_hms(2025, 2, 1, 10, 0, 0).unwrap()),
            changefreq: "monthly",
            priority: "0.7",
            image: Some("https://img.example/x.png?w=1&h=2".into()),
        }];
        let xml = render(&entries);
        assert!(xml.starts_with("<?xml version=\"1.0\""));
        assert!(xml.contains("<loc>https://shop.example/blog/a&amp;b</loc>"));
        assert!(xml.contains("<lastmod>2025-02-01</lastmod>"));
        assert!(xml.contains("<image:loc>https://img.example/x.png?w=1&amp;h=2</image:loc>"));
        assert!(xml.trim_end().ends_with("</urlset>"));
    }

    #[test]
    fn static_pages_start_with_home() {
        let entries = static_entries("https://shop.example");
        assert_eq!(entries[0].loc, "https://shop.example/");
        assert_eq!(entries[0].priority, "1.0");
        assert!(entries.iter().all(|e| e.lastmod.is_none()));
    }

    #[test]
    fn robots_points_to_sitemap_and_hides_private_areas() {
        let robots = robots_txt("https://shop.example");
        assert!(robots.contains("Disallow: /admin\n"));
        assert!(robots.contains("Disallow: /cabinet\n"));
        assert!(robots.ends_with("Sitemap: https://shop.example/sitemap.xml\n"));
    }
}
