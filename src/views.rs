//! Dashboard and admin page fragments built on top of the formatter and paginator.
use reqwest::Url;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::cache::ResultCache;
use crate::format::format_result;
use crate::html::escape;
use crate::paginate::{PageLink, Paginator, USER_PAGE_SIZE};
use crate::types::{ScanConfig, ScanKind, ScanRecord, TwoFactorEnrollment, UserPage, UserSummary};

/// The scan list: one collapsible item per record, paginated lists resolved against `cache`.
pub fn scan_list(records: &[ScanRecord], cache: &ResultCache) -> String {
    records.iter().map(|rec| scan_item(rec, cache)).collect()
}

fn scan_item(rec: &ScanRecord, cache: &ResultCache) -> String {
    let result = format_result(rec).into_html(cache);
    format!(
        concat!(
            r#"<div class="scan-item"><div class="scan-header"><div><strong>{target}</strong> <span class="badge">{kind}</span></div>"#,
            r#"<div class="scan-meta"><a class="btn-export" href="/ui/export/csv?scan_id={id}" title="Export CSV">CSV</a> <small>{when}</small></div></div>"#,
            r#"<details><summary>View Results</summary><div class="scan-result">{result}</div></details></div>"#
        ),
        target = escape(&rec.target),
        kind = escape(rec.scan_type.as_str()),
        id = rec.id,
        when = escape(&display_time(&rec.created_at)),
        result = result,
    )
}

/// Render a backend timestamp as `YYYY-MM-DD HH:MM:SS UTC`.
///
/// Accepts RFC 3339 and the naive ISO form the backend stores; anything else is shown as is.
pub fn display_time(raw: &str) -> String {
    let out_fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC");
    parse_timestamp(raw)
        .and_then(|t| t.format(out_fmt).ok())
        .unwrap_or_else(|| raw.to_string())
}

fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(t) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(t.to_offset(time::UtcOffset::UTC));
    }
    // Naive timestamps are UTC; the fractional part is irrelevant for display.
    let whole = raw.split('.').next()?.trim_end_matches('Z');
    let naive = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    PrimitiveDateTime::parse(whole, naive).ok().map(PrimitiveDateTime::assume_utc)
}

/// `<option>`s for the scan type selector: enabled kinds only, in menu order.
pub fn scan_type_options(config: &ScanConfig) -> String {
    let mut kinds: Vec<ScanKind> = ScanKind::ALL
        .into_iter()
        .filter(|k| config.get(k.as_str()).copied().unwrap_or(false))
        .collect();
    // Kinds the backend knows about but this dashboard does not.
    kinds.extend(
        config
            .iter()
            .filter(|(name, enabled)| **enabled && matches!(ScanKind::parse(name), ScanKind::Other(_)))
            .map(|(name, _)| ScanKind::parse(name)),
    );

    if kinds.is_empty() {
        return "<option disabled>No scans enabled</option>".to_string();
    }
    kinds
        .iter()
        .map(|k| {
            format!(
                r#"<option value="{}" data-placeholder="{}">{}</option>"#,
                escape(k.as_str()),
                escape(k.placeholder()),
                escape(k.label())
            )
        })
        .collect()
}

/// Admin toggles for every scan kind. Kinds missing from the config count as enabled.
pub fn config_list(config: &ScanConfig) -> String {
    ScanKind::ALL
        .iter()
        .map(|kind| {
            let enabled = config.get(kind.as_str()).copied().unwrap_or(true);
            format!(
                r#"<div class="config-item"><span>{}</span><label class="switch"><input type="checkbox" data-scan-type="{}"{}><span class="slider"></span></label></div>"#,
                escape(kind.label()),
                kind.as_str(),
                if enabled { " checked" } else { "" }
            )
        })
        .collect()
}

/// Page link of the admin user list, carrying the active search.
#[derive(Debug, Clone, Default)]
pub struct UserPageRef {
    pub search: Option<String>,
}

impl PageLink for UserPageRef {
    fn href(&self, page: usize) -> String {
        let page = page.to_string();
        let mut params = vec![("page", page.as_str())];
        if let Some(q) = self.search.as_deref().filter(|q| !q.is_empty()) {
            params.push(("search", q));
        }
        match Url::parse_with_params("http://dashboard/ui/admin/users", &params) {
            Ok(url) => format!("{}?{}", url.path(), url.query().unwrap_or_default()),
            Err(_) => format!("/ui/admin/users?page={page}"),
        }
    }
}

/// The admin user table with its pagination control.
///
/// `me` is the signed-in user's id; that row gets no actions.
pub fn user_table(users: &UserPage, page: usize, search: Option<&str>, me: Option<i64>) -> String {
    let mut html = String::from(concat!(
        r#"<div class="user-table-container"><table class="user-table"><thead><tr>"#,
        r#"<th>User</th><th>Role</th><th>Status</th><th>2FA</th><th class="actions">Actions</th>"#,
        r#"</tr></thead><tbody>"#
    ));
    for user in &users.items {
        html.push_str(&user_row(user, me == Some(user.id)));
    }
    html.push_str("</tbody></table></div>");

    let pager = Paginator::new(USER_PAGE_SIZE);
    let link = UserPageRef {
        search: search.map(str::to_string),
    };
    html.push_str(&pager.controls(&link, page, users.total as usize));
    html
}

fn user_row(user: &UserSummary, is_me: bool) -> String {
    let actions = if is_me {
        r#"<span class="self-marker">(You)</span>"#.to_string()
    } else {
        let id = user.id;
        format!(
            concat!(
                r#"<div id="actions-{id}" class="action-dropdown">"#,
                r#"<button class="dropdown-item" data-action="role" data-user="{id}" data-role="{role}">Edit User</button>"#,
                r#"<button class="dropdown-item {toggle_class}" data-action="toggle" data-user="{id}">{toggle_label}</button>"#,
                r#"<button class="dropdown-item" data-action="reset-password" data-user="{id}">Reset Password</button>"#,
                r#"<button class="dropdown-item" data-action="2fa" data-user="{id}" data-enable="{enable_2fa}">{twofa_label}</button>"#,
                "</div>"
            ),
            id = id,
            role = escape(user.role.as_str()),
            toggle_class = if user.is_active { "text-danger" } else { "text-success" },
            toggle_label = if user.is_active { "Disable Account" } else { "Enable Account" },
            enable_2fa = !user.has_2fa,
            twofa_label = if user.has_2fa { "Disable 2FA" } else { "Enable 2FA" },
        )
    };

    format!(
        concat!(
            "<tr>",
            r#"<td><div class="user-cell"><div class="user-avatar">{initials}</div><div class="user-info"><div class="user-name">{name}</div><div class="user-meta">ID: {id} • Joined {joined}</div></div></div></td>"#,
            r#"<td><span class="role-pill">{role}</span></td>"#,
            "<td>{status}</td><td>{twofa}</td>",
            r#"<td class="actions">{actions}</td>"#,
            "</tr>"
        ),
        initials = escape(&initials(&user.username)),
        name = escape(&user.username),
        id = user.id,
        joined = escape(display_time(&user.created_at).split(' ').next().unwrap_or_default()),
        role = escape(user.role.as_str()),
        status = status_badge(user.is_active, "Active", "Disabled"),
        twofa = status_badge(user.has_2fa, "Enabled", "Disabled"),
        actions = actions,
    )
}

fn status_badge(on: bool, on_label: &str, off_label: &str) -> String {
    let (class, label) = if on {
        ("status-active", on_label)
    } else {
        ("status-disabled", off_label)
    };
    format!(r#"<span class="status-badge {class}">{label}</span>"#)
}

/// First two characters of the username, upper-cased.
pub fn initials(username: &str) -> String {
    username.chars().take(2).collect::<String>().to_uppercase()
}

/// QR code and secret shown after registration or when an admin enables 2FA.
pub fn enrollment(e: &TwoFactorEnrollment) -> String {
    let mut html = String::from(r#"<div class="success">Success! Scan QR with Authenticator App</div>"#);
    if let Some(qr) = e.qr.as_deref().filter(|q| q.starts_with("data:image/")) {
        html.push_str(&format!(r#"<img class="qr" src="{}" alt="2FA QR code">"#, escape(qr)));
    }
    if let Some(secret) = &e.secret {
        html.push_str(&format!(r#"<code class="totp-secret">{}</code>"#, escape(secret)));
    }
    html
}
