//! Client-side pagination over cached result lists.
//!
//! Pages are 1-based. Slicing never touches the network: result pages are recomputed
//! from the [`ResultCache`] filled by the last scan list refresh.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cache::ResultCache;
use crate::html::{display_value, escape, is_web_url};

/// Items per page for long scan result lists.
pub const RESULT_PAGE_SIZE: usize = 20;
/// Rows per page in the admin user table.
pub const USER_PAGE_SIZE: usize = 5;

/// Result lists that are rendered page by page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PagedKind {
    Subdomain,
    Sherlock,
}

impl PagedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PagedKind::Subdomain => "subdomain",
            PagedKind::Sherlock => "sherlock",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "subdomain" => Some(PagedKind::Subdomain),
            "sherlock" => Some(PagedKind::Sherlock),
            _ => None,
        }
    }

    /// DOM id of the element a page of this list is rendered into.
    pub fn container_id(&self, scan_id: i64) -> String {
        format!("{}-result-{}", self.as_str(), scan_id)
    }
}

impl fmt::Display for PagedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a pagination button sends the user.
pub trait PageLink {
    fn href(&self, page: usize) -> String;
}

/// Page of a cached result list, addressed by `(kind, scan id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultPageRef {
    pub kind: PagedKind,
    pub scan_id: i64,
}

impl PageLink for ResultPageRef {
    fn href(&self, page: usize) -> String {
        format!("/ui/scans/{}/{}/page/{}", self.kind, self.scan_id, page)
    }
}

/// Fixed-size page arithmetic plus the shared Previous/Next control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    page_size: usize,
}

impl Paginator {
    /// A zero page size is bumped to 1.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_pages(&self, total_items: usize) -> usize {
        total_items.div_ceil(self.page_size)
    }

    /// Number of items before `page` (the backend's `skip`). Page 0 counts as page 1.
    pub fn offset(&self, page: usize) -> usize {
        page.max(1).saturating_sub(1).saturating_mul(self.page_size)
    }

    /// `items[(page-1)*size .. page*size]`, clamped to the list; past the end is empty.
    pub fn slice<'a, T>(&self, items: &'a [T], page: usize) -> &'a [T] {
        let start = self.offset(page).min(items.len());
        let end = start.saturating_add(self.page_size).min(items.len());
        &items[start..end]
    }

    /// Previous/Next control for `page` of a list with `total_items` entries.
    ///
    /// Empty when everything fits on one page.
    pub fn controls(&self, link: &dyn PageLink, page: usize, total_items: usize) -> String {
        let total_pages = self.total_pages(total_items);
        if total_pages <= 1 {
            return String::new();
        }
        let page = page.max(1);
        let prev = (page > 1).then(|| link.href(page - 1));
        let next = (page < total_pages).then(|| link.href(page + 1));
        format!(
            r#"<div class="pagination-controls">{}<span class="page-indicator">Page {} of {}</span>{}</div>"#,
            nav_button("Previous", prev),
            page,
            total_pages,
            nav_button("Next", next),
        )
    }
}

fn nav_button(label: &str, target: Option<String>) -> String {
    match target {
        Some(href) => format!(
            r#"<button type="button" class="btn-page" data-href="{}">{}</button>"#,
            escape(&href),
            label
        ),
        None => format!(r#"<button type="button" class="btn-page" disabled>{label}</button>"#),
    }
}

/// Re-render one page of a cached result list.
///
/// Returns `None` when the scan is not cached or its payload lacks the list for `kind`.
pub fn render_page(cache: &ResultCache, kind: PagedKind, scan_id: i64, page: usize) -> Option<String> {
    let data = cache.get(scan_id)?;
    let pager = Paginator::new(RESULT_PAGE_SIZE);
    let link = ResultPageRef { kind, scan_id };

    match kind {
        PagedKind::Subdomain => {
            let items: Vec<String> = data
                .get("subdomains")?
                .as_array()?
                .iter()
                .map(display_value)
                .collect();
            let list: String = pager
                .slice(&items, page)
                .iter()
                .map(|d| format!("<li>{}</li>", escape(d)))
                .collect();
            Some(format!(
                r#"<div class="subdomain-count">Found {} subdomains:</div><ul class="subdomain-list">{}</ul>{}"#,
                items.len(),
                list,
                pager.controls(&link, page, items.len())
            ))
        }
        PagedKind::Sherlock => {
            let entries: Vec<(String, String)> = data
                .get("sherlock_data")?
                .as_object()?
                .iter()
                .map(|(site, url)| (site.clone(), display_value(url)))
                .collect();
            let mut html = String::from(r#"<div class="card-grid">"#);
            for (site, url) in pager.slice(&entries, page) {
                let card = format!(
                    r#"<div class="card"><strong>{}</strong><div class="card-detail">{}</div></div>"#,
                    escape(site),
                    escape(url)
                );
                // Only web links are clickable.
                if is_web_url(url) {
                    html.push_str(&format!(
                        r#"<a href="{}" target="_blank" rel="noopener">{card}</a>"#,
                        escape(url)
                    ));
                } else {
                    html.push_str(&card);
                }
            }
            html.push_str("</div>");
            html.push_str(&pager.controls(&link, page, entries.len()));
            Some(html)
        }
    }
}
