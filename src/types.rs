use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Scan types known to the dashboard. Anything else the backend sends is kept as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScanKind {
    IpLookup,
    Nmap,
    Whois,
    Subdomain,
    DnsLookup,
    CheckPhish,
    AsnLookup,
    Wappalyzer,
    Sherlock,
    Other(String),
}

impl ScanKind {
    /// Every kind the backend can run, in menu order.
    pub const ALL: [ScanKind; 9] = [
        ScanKind::IpLookup,
        ScanKind::Nmap,
        ScanKind::Whois,
        ScanKind::Subdomain,
        ScanKind::DnsLookup,
        ScanKind::CheckPhish,
        ScanKind::AsnLookup,
        ScanKind::Wappalyzer,
        ScanKind::Sherlock,
    ];

    pub fn parse(s: &str) -> Self {
        match s {
            "ip_lookup" => ScanKind::IpLookup,
            "nmap" => ScanKind::Nmap,
            "whois" => ScanKind::Whois,
            "subdomain" => ScanKind::Subdomain,
            "dns_lookup" => ScanKind::DnsLookup,
            "checkphish" => ScanKind::CheckPhish,
            "asn_lookup" => ScanKind::AsnLookup,
            "wappalyzer" => ScanKind::Wappalyzer,
            "sherlock" => ScanKind::Sherlock,
            other => ScanKind::Other(other.to_string()),
        }
    }

    /// Wire name used by the backend (`scan_type`, config keys).
    pub fn as_str(&self) -> &str {
        match self {
            ScanKind::IpLookup => "ip_lookup",
            ScanKind::Nmap => "nmap",
            ScanKind::Whois => "whois",
            ScanKind::Subdomain => "subdomain",
            ScanKind::DnsLookup => "dns_lookup",
            ScanKind::CheckPhish => "checkphish",
            ScanKind::AsnLookup => "asn_lookup",
            ScanKind::Wappalyzer => "wappalyzer",
            ScanKind::Sherlock => "sherlock",
            ScanKind::Other(s) => s,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ScanKind::IpLookup => "IP Lookup",
            ScanKind::Nmap => "Nmap Scan",
            ScanKind::Whois => "Whois Lookup",
            ScanKind::Subdomain => "Subdomain Finder",
            ScanKind::DnsLookup => "DNS Lookup",
            ScanKind::CheckPhish => "CheckPhish",
            ScanKind::AsnLookup => "ASN Lookup",
            ScanKind::Wappalyzer => "Wappalyzer",
            ScanKind::Sherlock => "Sherlock (Username)",
            ScanKind::Other(s) => s,
        }
    }

    /// Hint shown in the target input for this kind.
    pub fn placeholder(&self) -> &'static str {
        match self {
            ScanKind::IpLookup => "Target IP or Domain (e.g., 8.8.8.8)",
            ScanKind::Nmap => "Target IP or Domain (e.g., scanme.nmap.org)",
            ScanKind::Whois => "Domain name (e.g., google.com)",
            ScanKind::Subdomain | ScanKind::DnsLookup => "Domain name (e.g., example.com)",
            ScanKind::CheckPhish => "URL to check (e.g., http://example.com)",
            ScanKind::AsnLookup => "ASN (e.g. AS15169) or IP/Domain",
            ScanKind::Wappalyzer => "URL or Domain (e.g. google.com)",
            ScanKind::Sherlock => "Username (e.g. elonmusk)",
            ScanKind::Other(_) => "Target (e.g., google.com)",
        }
    }

    /// Key under which the admin config stores the enabled flag.
    pub fn config_key(&self) -> String {
        format!("scan_{}", self.as_str())
    }
}

impl fmt::Display for ScanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ScanKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ScanKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ScanKind::parse(&s))
    }
}

/// One stored scan as returned by the scan list endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScanRecord {
    pub id: i64,
    pub target: String,
    pub scan_type: ScanKind,
    pub created_at: String,
    /// JSON-encoded string in the database, but some endpoints send the value inline.
    #[serde(default)]
    pub result: Value,
}

/// Response of `POST /scan/`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScanSubmitted {
    pub id: i64,
    pub target: String,
    #[serde(rename = "type")]
    pub scan_type: ScanKind,
    #[serde(default)]
    pub result: Value,
}

/// Enabled flag per scan kind name.
pub type ScanConfig = BTreeMap<String, bool>;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ScanStats {
    #[serde(default)]
    pub by_type: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Admin,
    User,
    Other(String),
}

impl Role {
    pub fn parse(s: &str) -> Self {
        match s {
            "admin" => Role::Admin,
            "user" => Role::User,
            other => Role::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Other(s) => s,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Role::parse(&s))
    }
}

/// A user row in the admin listing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: String,
    #[serde(default)]
    pub has_2fa: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserPage {
    pub items: Vec<UserSummary>,
    pub total: u64,
    #[serde(default)]
    pub skip: u64,
    #[serde(default)]
    pub limit: u64,
}

/// Response of `GET /auth/verify`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Identity {
    pub user: String,
    pub role: Role,
}

/// Response of `POST /auth/register` and of enabling 2FA for a user.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TwoFactorEnrollment {
    /// `data:image/png;base64,...` QR code for authenticator apps.
    #[serde(default)]
    pub qr: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ToggleResult {
    pub is_active: bool,
}
