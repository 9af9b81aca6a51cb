use reconhub_dash::cache::ResultCache;
use reconhub_dash::paginate::{render_page, PagedKind, Paginator, RESULT_PAGE_SIZE};
use reconhub_dash::types::{ScanKind, ScanRecord};
use serde_json::json;

fn subdomain_cache(count: usize) -> ResultCache {
    let subdomains: Vec<String> = (0..count).map(|i| format!("host{i}.example.com")).collect();
    ResultCache::from_records(&[ScanRecord {
        id: 7,
        target: "example.com".into(),
        scan_type: ScanKind::Subdomain,
        created_at: "2024-05-01T10:00:00".into(),
        result: json!(json!({ "subdomains": subdomains }).to_string()),
    }])
}

#[test]
fn pages_concatenate_back_to_the_list() {
    for len in [0usize, 1, 5, 19, 20, 21, 47, 100] {
        let items: Vec<usize> = (0..len).collect();
        for size in [1usize, 3, 20] {
            let p = Paginator::new(size);
            let pages = p.total_pages(len);
            let joined: Vec<usize> = (1..=pages).flat_map(|n| p.slice(&items, n).to_vec()).collect();
            assert_eq!(joined, items, "len={len} size={size}");
        }
    }
}

#[test]
fn third_page_of_47_subdomains() {
    let cache = subdomain_cache(47);
    let html = render_page(&cache, PagedKind::Subdomain, 7, 3).expect("cached");
    assert_eq!(html.matches("<li>").count(), 7);
    assert!(html.contains("Found 47 subdomains:"));
    assert!(html.contains("host40.example.com"));
    assert!(html.contains(r#"data-href="/ui/scans/subdomain/7/page/2">Previous"#));
    assert!(html.contains("disabled>Next"));
    assert!(html.contains("Page 3 of 3"));
}

#[test]
fn single_page_has_no_controls() {
    let cache = subdomain_cache(RESULT_PAGE_SIZE);
    let html = render_page(&cache, PagedKind::Subdomain, 7, 1).expect("cached");
    assert!(!html.contains("pagination-controls"));
    assert_eq!(html.matches("<li>").count(), RESULT_PAGE_SIZE);
}

#[test]
fn rerender_is_idempotent() {
    let cache = subdomain_cache(47);
    let a = render_page(&cache, PagedKind::Subdomain, 7, 2);
    let b = render_page(&cache, PagedKind::Subdomain, 7, 2);
    assert!(a.is_some());
    assert_eq!(a, b);
}

#[test]
fn wrong_kind_for_payload_is_none() {
    let cache = subdomain_cache(3);
    assert!(render_page(&cache, PagedKind::Sherlock, 7, 1).is_none());
}
