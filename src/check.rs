//! `check` subcommand: human-readable credential diagnostics for operators.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;

use crate::api::AnalyticsClient;
use crate::config::{Config, ENV_PRIVATE_KEY, ENV_PROPERTY_ID, ENV_SERVICE_ACCOUNT_EMAIL};
use crate::credentials::{
    has_pem_delimiters, normalize_private_key, ServiceAccountCredential, PEM_BEGIN_MARKER,
    PEM_END_MARKER,
};
use crate::reports::{DateRange, Dimension, Metric, ReportQuery};

const SAMPLE_ROWS: usize = 3;
const LIVE_WINDOW_DAYS: u32 = 7;

/// Static inspection of the normalized private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyReport {
    pub raw_length: usize,
    pub has_pem_framing: bool,
    pub line_count: usize,
    pub starts_with_marker: bool,
    pub ends_with_marker: bool,
    pub body_decodes: bool,
}

impl KeyReport {
    pub fn inspect(raw: &str) -> Self {
        let key = normalize_private_key(raw);
        let lines: Vec<&str> = key.trim().lines().collect();
        let body: String = lines
            .iter()
            .filter(|l| !l.starts_with("-----"))
            .flat_map(|l| l.chars().filter(|c| !c.is_whitespace()))
            .collect();

        Self {
            raw_length: raw.len(),
            has_pem_framing: has_pem_delimiters(&key),
            line_count: lines.len(),
            starts_with_marker: lines.first().map(|l| l.trim()) == Some(PEM_BEGIN_MARKER),
            ends_with_marker: lines.last().map(|l| l.trim()) == Some(PEM_END_MARKER),
            body_decodes: !body.is_empty() && BASE64.decode(body.as_bytes()).is_ok(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.has_pem_framing && self.starts_with_marker && self.ends_with_marker && self.body_decodes
    }
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "[ok]"
    } else {
        "[FAIL]"
    }
}

/// The static part of the report.
pub struct StaticReport<'a> {
    pub config: &'a Config,
    pub key: Option<&'a KeyReport>,
}

impl std::fmt::Display for StaticReport<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let email = self.config.service_account_email.as_deref();
        let property = self.config.property_id.as_deref();
        let rule = "=".repeat(60);

        writeln!(f, "{rule}\nSERVICE ACCOUNT VERIFICATION\n{rule}")?;
        writeln!(
            f,
            "{} {}: {}",
            mark(email.is_some()),
            ENV_SERVICE_ACCOUNT_EMAIL,
            email.unwrap_or("<missing>")
        )?;
        writeln!(
            f,
            "{} {}: {}",
            mark(self.config.property_id().is_ok()),
            ENV_PROPERTY_ID,
            property.unwrap_or("<missing>")
        )?;

        let Some(r) = self.key else {
            return writeln!(f, "{} {}: <missing>", mark(false), ENV_PRIVATE_KEY);
        };
        writeln!(
            f,
            "{} {} length: {} characters",
            mark(true),
            ENV_PRIVATE_KEY,
            r.raw_length
        )?;
        writeln!(f, "{} PEM framing present", mark(r.has_pem_framing))?;
        writeln!(f, "     key has {} lines", r.line_count)?;
        writeln!(f, "{} starts with {}", mark(r.starts_with_marker), PEM_BEGIN_MARKER)?;
        writeln!(f, "{} ends with {}", mark(r.ends_with_marker), PEM_END_MARKER)?;
        writeln!(f, "{} key body is valid base64", mark(r.body_decodes))
    }
}

/// Steps printed after a failed check.
pub fn troubleshooting(config: &Config) -> String {
    let email = config
        .service_account_email
        .as_deref()
        .unwrap_or("<service account email>");
    let property = config.property_id.as_deref().unwrap_or("<property id>");

    format!(
        "\nTROUBLESHOOTING:\n\
         1. Check the service account exists: https://console.cloud.google.com/iam-admin/serviceaccounts\n   \
            Look for {email}; if it is missing the key belongs to another account.\n\
         2. Grant property access: https://analytics.google.com/ > Admin > Property Access Management\n   \
            Add {email} to property {property} with the Viewer role.\n\
         3. If the key is invalid, download a new JSON key and copy its private_key into {ENV_PRIVATE_KEY}.\n\
         4. Permission changes can take a minute or two to propagate.\n"
    )
}

/// Run the diagnostics and print them. Returns whether every check passed.
pub async fn run(config: &Config, live: bool) -> bool {
    let key_report = config.private_key.as_deref().map(KeyReport::inspect);
    print!(
        "{}",
        StaticReport {
            config,
            key: key_report.as_ref(),
        }
    );

    let static_ok = config.service_account_email.is_some()
        && config.property_id().is_ok()
        && key_report.as_ref().is_some_and(KeyReport::is_valid);

    if !static_ok {
        print!("{}", troubleshooting(config));
        return false;
    }

    if !live {
        return true;
    }

    match live_check(config).await {
        Ok(()) => {
            println!("\nAll checks passed. The credentials can read property data.");
            true
        }
        Err(e) => {
            println!("\n{} {}", mark(false), e);
            print!("{}", troubleshooting(config));
            false
        }
    }
}

async fn live_check(config: &Config) -> anyhow::Result<()> {
    let credential = ServiceAccountCredential::resolve(config)?;
    let property_id = config.property_id()?;
    let http_client = Client::builder().timeout(config.timeout()).build()?;
    let client = AnalyticsClient::new(config, http_client);

    let query = ReportQuery::new(DateRange::trailing_days(LIVE_WINDOW_DAYS))
        .dimension(Dimension::Date)
        .metric(Metric::ActiveUsers);

    println!("\nFetching {LIVE_WINDOW_DAYS} days of data from property {property_id}...");
    let result = client.run_report(&credential, property_id, &query).await?;

    println!("{} report returned {} rows", mark(true), result.rows.len());
    for row in result.rows.iter().take(SAMPLE_ROWS) {
        println!(
            "     {}: {} users",
            row.dimension(0).unwrap_or("?"),
            row.metric(0).unwrap_or("0")
        );
    }
    Ok(())
}
