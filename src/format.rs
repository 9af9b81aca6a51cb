//! Per-scan-type rendering of result payloads into HTML fragments.
//!
//! Payloads are first projected into a typed [`ScanPayload`] (one variant per scan kind),
//! then rendered with an exhaustive match. Any shape the projection does not recognize
//! ends up as [`ScanPayload::Raw`], so formatting never fails.
use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::cache::{decode_result, Decoded, ResultCache};
use crate::html::{display_value, escape, is_truthy, raw_box};
use crate::paginate::{render_page, PagedKind};
use crate::types::{ScanKind, ScanRecord};

/// `ip_lookup` fields that only echo the request.
const IP_LOOKUP_EXCLUDED: &[&str] = &["query", "status"];
/// Prefixes shown per ASN row before summarizing the rest.
const ASN_PREFIX_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub state: String,
    pub service: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PortSection {
    Table(BTreeMap<u16, PortInfo>),
    /// No `tcp` map in the host record; shown pretty-printed.
    Raw(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NmapHost {
    pub hostnames: Vec<String>,
    pub ports: PortSection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsAnswer {
    Message(String),
    /// Record type with its non-empty answers, in payload order.
    Records(Vec<(String, Vec<String>)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhishVerdict {
    Disposition(String),
    Pending(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsnEntry {
    pub ip: Option<String>,
    pub asn: Option<String>,
    pub org: Option<String>,
    pub prefixes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Technology {
    pub versions: Vec<String>,
    pub categories: Vec<String>,
}

/// A scan payload projected onto the shape its kind is expected to have.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanPayload {
    /// The payload reported an error; overrides every kind.
    Failed(String),
    /// Flat key/value attributes (`ip_lookup`, `whois`).
    Attributes(Vec<(String, String)>),
    Nmap(NmapHost),
    /// A `subdomains` list; its pages are rendered from the cache.
    Subdomains,
    Dns(DnsAnswer),
    Phish(PhishVerdict),
    Asn(Vec<AsnEntry>),
    Technologies(Vec<(String, Technology)>),
    Accounts(usize),
    /// Unknown kind or unexpected shape.
    Raw(Value),
    /// `result` was a string that is not JSON.
    Undecodable(String),
}

impl ScanPayload {
    pub fn from_record(rec: &ScanRecord) -> Self {
        match decode_result(&rec.result) {
            Decoded::Value(v) => Self::project(&rec.scan_type, v),
            Decoded::Undecodable(raw) => ScanPayload::Undecodable(raw),
        }
    }

    /// Project a decoded payload for `kind`.
    pub fn project(kind: &ScanKind, data: Value) -> Self {
        let Some(obj) = data.as_object() else {
            return ScanPayload::Raw(data);
        };
        if let Some(err) = obj.get("error").filter(|e| is_truthy(e)) {
            return ScanPayload::Failed(display_value(err));
        }
        let projected = match kind {
            ScanKind::IpLookup => Some(ScanPayload::Attributes(
                obj.iter()
                    .filter(|(k, _)| !IP_LOOKUP_EXCLUDED.contains(&k.as_str()))
                    .map(|(k, v)| (k.clone(), display_value(v)))
                    .collect(),
            )),
            ScanKind::Whois => Some(ScanPayload::Attributes(whois_attributes(obj))),
            ScanKind::Nmap => Some(ScanPayload::Nmap(nmap_host(obj, &data))),
            ScanKind::Subdomain => obj
                .get("subdomains")
                .filter(|list| list.is_array())
                .map(|_| ScanPayload::Subdomains),
            ScanKind::DnsLookup => Some(ScanPayload::Dns(dns_answer(obj))),
            ScanKind::CheckPhish => phish_verdict(obj).map(ScanPayload::Phish),
            ScanKind::AsnLookup => obj
                .get("asn_data")
                .and_then(Value::as_array)
                .map(|list| ScanPayload::Asn(list.iter().map(asn_entry).collect())),
            ScanKind::Wappalyzer => obj
                .get("technologies")
                .and_then(Value::as_object)
                .map(|techs| ScanPayload::Technologies(technologies(techs))),
            ScanKind::Sherlock => obj
                .get("sherlock_data")
                .and_then(Value::as_object)
                .map(|hits| ScanPayload::Accounts(hits.len())),
            ScanKind::Other(_) => None,
        };
        projected.unwrap_or(ScanPayload::Raw(data))
    }
}

fn whois_attributes(obj: &Map<String, Value>) -> Vec<(String, String)> {
    obj.iter()
        .filter_map(|(k, v)| {
            let shown = match v {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Array(items) => items.iter().map(display_value).collect::<Vec<_>>().join(", "),
                _ => return None,
            };
            Some((k.clone(), shown))
        })
        .collect()
}

fn nmap_host(obj: &Map<String, Value>, data: &Value) -> NmapHost {
    let hostnames = obj
        .get("hostnames")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .map(|h| h.get("name").map(display_value).unwrap_or_else(|| display_value(h)))
                .collect()
        })
        .unwrap_or_default();

    let ports = match obj.get("tcp").and_then(Value::as_object) {
        Some(tcp) => {
            let mut table = BTreeMap::new();
            for (port, info) in tcp {
                let Ok(port) = port.parse::<u16>() else { continue };
                let field = |name: &str| info.get(name).map(display_value).unwrap_or_default();
                table.insert(
                    port,
                    PortInfo {
                        state: field("state"),
                        service: field("name"),
                    },
                );
            }
            PortSection::Table(table)
        }
        None => PortSection::Raw(data.clone()),
    };

    NmapHost { hostnames, ports }
}

fn dns_answer(obj: &Map<String, Value>) -> DnsAnswer {
    if let Some(msg) = obj.get("message").filter(|m| is_truthy(m)) {
        return DnsAnswer::Message(display_value(msg));
    }
    DnsAnswer::Records(
        obj.iter()
            .filter_map(|(rtype, records)| {
                let list = records.as_array().filter(|l| !l.is_empty())?;
                Some((rtype.clone(), list.iter().map(display_value).collect()))
            })
            .collect(),
    )
}

fn phish_verdict(obj: &Map<String, Value>) -> Option<PhishVerdict> {
    if let Some(d) = obj.get("disposition").filter(|d| is_truthy(d)) {
        return Some(PhishVerdict::Disposition(display_value(d)));
    }
    obj.get("status")
        .filter(|s| is_truthy(s))
        .map(|s| PhishVerdict::Pending(display_value(s)))
}

fn asn_entry(item: &Value) -> AsnEntry {
    let text = |name: &str| item.get(name).filter(|v| is_truthy(v)).map(display_value);
    AsnEntry {
        ip: text("ip"),
        asn: text("asn"),
        org: text("org"),
        prefixes: item
            .get("prefixes")
            .and_then(Value::as_array)
            .map(|p| p.iter().map(display_value).collect()),
    }
}

fn technologies(techs: &Map<String, Value>) -> Vec<(String, Technology)> {
    techs
        .iter()
        .map(|(name, details)| {
            let tech = Technology {
                versions: text_list(details.get("versions")),
                categories: text_list(details.get("categories")),
            };
            (name.clone(), tech)
        })
        .collect()
}

/// Entries of a list field as display text. A lone scalar counts as a one-item list.
fn text_list(field: Option<&Value>) -> Vec<String> {
    match field {
        Some(Value::Array(items)) => items.iter().map(display_value).collect(),
        Some(v) if is_truthy(v) => vec![display_value(v)],
        _ => Vec::new(),
    }
}

/// Rendered HTML plus an optional page render to run once the container exists.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub html: String,
    pub deferred: Option<DeferredPage>,
}

impl Fragment {
    fn done(html: String) -> Self {
        Self { html, deferred: None }
    }

    /// Resolve the deferred page (if any) against `cache` and return the final markup.
    pub fn into_html(self, cache: &ResultCache) -> String {
        match self.deferred {
            Some(page) => page.attach(cache),
            None => self.html,
        }
    }
}

/// First page of a paginated result list, rendered into its container after insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredPage {
    pub kind: PagedKind,
    pub scan_id: i64,
}

impl DeferredPage {
    /// Container element with page 1 rendered inside it. An uncached scan keeps the
    /// loading placeholder.
    pub fn attach(&self, cache: &ResultCache) -> String {
        let inner = render_page(cache, self.kind, self.scan_id, 1).unwrap_or_else(|| "Loading...".to_string());
        container(self.kind, self.scan_id, &inner)
    }
}

fn container(kind: PagedKind, scan_id: i64, inner: &str) -> String {
    format!(r#"<div id="{}">{}</div>"#, kind.container_id(scan_id), inner)
}

/// Format a scan record. Pure in `(kind, payload)` apart from the scan id used for
/// paginated containers.
pub fn format_result(rec: &ScanRecord) -> Fragment {
    render(&ScanPayload::from_record(rec), rec.id)
}

/// Render a projected payload.
pub fn render(payload: &ScanPayload, scan_id: i64) -> Fragment {
    match payload {
        ScanPayload::Failed(msg) => Fragment::done(format!(r#"<div class="result-error">Error: {}</div>"#, escape(msg))),
        ScanPayload::Attributes(rows) => Fragment::done(attribute_table(rows)),
        ScanPayload::Nmap(host) => Fragment::done(nmap_html(host)),
        ScanPayload::Subdomains => deferred(PagedKind::Subdomain, scan_id),
        ScanPayload::Dns(DnsAnswer::Message(msg)) => Fragment::done(format!("<div>{}</div>", escape(msg))),
        ScanPayload::Dns(DnsAnswer::Records(records)) => Fragment::done(dns_html(records)),
        ScanPayload::Phish(verdict) => Fragment::done(phish_html(verdict)),
        ScanPayload::Asn(entries) if entries.is_empty() => Fragment::done("<div>No ASN data found</div>".to_string()),
        ScanPayload::Asn(entries) => Fragment::done(asn_html(entries)),
        ScanPayload::Technologies(techs) if techs.is_empty() => {
            Fragment::done("<div>No technologies detected</div>".to_string())
        }
        ScanPayload::Technologies(techs) => Fragment::done(technologies_html(techs)),
        ScanPayload::Accounts(0) => Fragment::done("<div>No accounts found</div>".to_string()),
        ScanPayload::Accounts(_) => deferred(PagedKind::Sherlock, scan_id),
        ScanPayload::Raw(v) => Fragment::done(raw_box(v)),
        ScanPayload::Undecodable(raw) => Fragment::done(format!(r#"<div class="result-box">{}</div>"#, escape(raw))),
    }
}

fn deferred(kind: PagedKind, scan_id: i64) -> Fragment {
    Fragment {
        html: container(kind, scan_id, "Loading..."),
        deferred: Some(DeferredPage { kind, scan_id }),
    }
}

fn attribute_table(rows: &[(String, String)]) -> String {
    let mut html = String::from(r#"<table class="result-table"><tbody>"#);
    for (k, v) in rows {
        html.push_str(&format!("<tr><td>{}</td><td>{}</td></tr>", escape(k), escape(v)));
    }
    html.push_str("</tbody></table>");
    html
}

fn nmap_html(host: &NmapHost) -> String {
    let mut html = String::new();
    if !host.hostnames.is_empty() {
        html.push_str(&format!(
            "<div><strong>Hostnames:</strong> {}</div>",
            escape(&host.hostnames.join(", "))
        ));
    }
    match &host.ports {
        PortSection::Table(ports) => {
            html.push_str(
                r#"<table class="result-table"><thead><tr><th>Port</th><th>State</th><th>Service</th></tr></thead><tbody>"#,
            );
            for (port, info) in ports {
                html.push_str(&format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                    port,
                    escape(&info.state),
                    escape(&info.service)
                ));
            }
            html.push_str("</tbody></table>");
        }
        PortSection::Raw(v) => html.push_str(&raw_box(v)),
    }
    html
}

fn dns_html(records: &[(String, Vec<String>)]) -> String {
    let mut html = String::from(r#"<div class="dns-results card-grid">"#);
    for (rtype, answers) in records {
        let items: String = answers
            .iter()
            .map(|r| format!("<li>{}</li>", escape(r)))
            .collect();
        html.push_str(&format!(
            r#"<div class="card"><strong>{}</strong><ul class="record-list">{}</ul></div>"#,
            escape(rtype),
            items
        ));
    }
    html.push_str("</div>");
    html
}

fn phish_html(verdict: &PhishVerdict) -> String {
    let (label, class, value) = match verdict {
        PhishVerdict::Disposition(d) if d == "clean" => ("Verdict", "verdict-clean", d),
        PhishVerdict::Disposition(d) => ("Verdict", "verdict-bad", d),
        PhishVerdict::Pending(s) => ("Status", "verdict-pending", s),
    };
    format!(
        r#"<div class="verdict"><strong>{label}:</strong> <span class="{class}">{}</span></div>"#,
        escape(value)
    )
}

fn asn_html(entries: &[AsnEntry]) -> String {
    let first_count = entries
        .first()
        .and_then(|e| e.prefixes.as_ref())
        .map(Vec::len)
        .unwrap_or(0);
    let mut html = format!(
        r#"<div class="table-scroll"><table class="result-table"><thead><tr><th>IP/Target</th><th>ASN</th><th>Org</th><th>Prefixes (Count: {first_count})</th></tr></thead><tbody>"#
    );
    for entry in entries {
        let cell = |v: &Option<String>| escape(v.as_deref().unwrap_or("-"));
        let prefixes = match &entry.prefixes {
            Some(list) => {
                let mut shown = list.iter().take(ASN_PREFIX_LIMIT).cloned().collect::<Vec<_>>().join(", ");
                if list.len() > ASN_PREFIX_LIMIT {
                    shown.push_str(&format!(" ... (+{} more)", list.len() - ASN_PREFIX_LIMIT));
                }
                shown
            }
            None => "-".to_string(),
        };
        html.push_str(&format!(
            r#"<tr><td>{}</td><td>{}</td><td>{}</td><td class="prefixes">{}</td></tr>"#,
            cell(&entry.ip),
            cell(&entry.asn),
            cell(&entry.org),
            escape(&prefixes)
        ));
    }
    html.push_str("</tbody></table></div>");
    html
}

fn technologies_html(techs: &[(String, Technology)]) -> String {
    let mut html = String::from(r#"<div class="card-grid">"#);
    for (name, tech) in techs {
        html.push_str(&format!(r#"<div class="card"><strong>{}</strong>"#, escape(name)));
        if !tech.versions.is_empty() {
            html.push_str(&format!(
                r#"<div class="card-detail">Ver: {}</div>"#,
                escape(&tech.versions.join(", "))
            ));
        }
        if !tech.categories.is_empty() {
            html.push_str(&format!(
                r#"<div class="card-tag">{}</div>"#,
                escape(&tech.categories.join(", "))
            ));
        }
        html.push_str("</div>");
    }
    html.push_str("</div>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn project(kind: ScanKind, v: Value) -> ScanPayload {
        ScanPayload::project(&kind, v)
    }

    #[test]
    fn ip_lookup_drops_echo_fields() {
        let p = project(
            ScanKind::IpLookup,
            json!({"status": "success", "country": "US", "query": "8.8.8.8", "isp": "Google"}),
        );
        assert_eq!(
            p,
            ScanPayload::Attributes(vec![
                ("country".into(), "US".into()),
                ("isp".into(), "Google".into())
            ])
        );
    }

    #[test]
    fn whois_skips_nested_and_null_values() {
        let p = project(
            ScanKind::Whois,
            json!({"domain_name": ["EXAMPLE.COM", "example.com"], "registrar": "IANA", "dnssec": null, "raw": {"x": 1}, "privacy": false}),
        );
        assert_eq!(
            p,
            ScanPayload::Attributes(vec![
                ("domain_name".into(), "EXAMPLE.COM, example.com".into()),
                ("registrar".into(), "IANA".into())
            ])
        );
    }

    #[test]
    fn nmap_ports_sorted_numerically() {
        let p = project(
            ScanKind::Nmap,
            json!({"hostnames": [{"name": "scanme.nmap.org", "type": "user"}], "tcp": {"443": {"state": "open", "name": "https"}, "22": {"state": "open", "name": "ssh"}}}),
        );
        let html = render(&p, 1).html;
        assert!(html.contains("<strong>Hostnames:</strong> scanme.nmap.org"));
        let ssh = html.find("<td>22</td>").unwrap();
        let https = html.find("<td>443</td>").unwrap();
        assert!(ssh < https);
    }

    #[test]
    fn nmap_without_tcp_falls_back_to_raw() {
        let p = project(ScanKind::Nmap, json!({"status": {"state": "down"}}));
        assert!(matches!(p, ScanPayload::Nmap(NmapHost { ports: PortSection::Raw(_), .. })));
        assert!(render(&p, 1).html.contains("result-box"));
    }

    #[test]
    fn phish_verdict_colors() {
        let clean = render(&project(ScanKind::CheckPhish, json!({"disposition": "clean"})), 1).html;
        assert!(clean.contains("verdict-clean"));
        let bad = render(&project(ScanKind::CheckPhish, json!({"disposition": "phish"})), 1).html;
        assert!(bad.contains("verdict-bad"));
        let pending = render(&project(ScanKind::CheckPhish, json!({"status": "PENDING"})), 1).html;
        assert!(pending.contains("<strong>Status:</strong>"));
        assert!(matches!(project(ScanKind::CheckPhish, json!({"jobID": "x"})), ScanPayload::Raw(_)));
    }

    #[test]
    fn asn_prefixes_are_capped() {
        let prefixes: Vec<String> = (0..53).map(|i| format!("10.{i}.0.0/16")).collect();
        let p = project(
            ScanKind::AsnLookup,
            json!({"asn_data": [{"ip": "8.8.8.8", "asn": "AS15169", "org": "GOOGLE", "prefixes": prefixes}, {"asn": "AS1"}]}),
        );
        let html = render(&p, 1).html;
        assert!(html.contains("Prefixes (Count: 53)"));
        assert!(html.contains(" ... (+3 more)"));
        assert!(html.contains("<tr><td>-</td><td>AS1</td><td>-</td>"));
    }

    #[test]
    fn wappalyzer_cards_and_empty_map() {
        let empty = render(&project(ScanKind::Wappalyzer, json!({"technologies": {}})), 1).html;
        assert_eq!(empty, "<div>No technologies detected</div>");
        let html = render(
            &project(
                ScanKind::Wappalyzer,
                json!({"technologies": {"Nginx": {"versions": ["1.25"], "categories": ["Web servers"]}, "React": {}}}),
            ),
            1,
        )
        .html;
        assert!(html.contains("Ver: 1.25"));
        assert!(html.contains(r#"<div class="card-tag">Web servers</div>"#));
        assert!(html.contains("<strong>React</strong></div>"));
    }

    #[test]
    fn wappalyzer_shows_non_string_versions() {
        let html = render(
            &project(
                ScanKind::Wappalyzer,
                json!({"technologies": {"PHP": {"versions": [8], "categories": ["Programming languages"]}}}),
            ),
            1,
        )
        .html;
        assert!(html.contains("Ver: 8"));
        assert!(html.contains(r#"<div class="card-tag">Programming languages</div>"#));
    }

    #[test]
    fn non_object_payload_is_raw() {
        assert!(matches!(project(ScanKind::Whois, json!([1, 2])), ScanPayload::Raw(_)));
        assert!(matches!(project(ScanKind::DnsLookup, json!(null)), ScanPayload::Raw(_)));
    }

    #[test]
    fn payload_text_is_escaped() {
        let html = render(&project(ScanKind::IpLookup, json!({"org": "<script>"})), 1).html;
        assert!(html.contains("&lt;script&gt;"));
    }
}
