//! Plain-text summaries printed on stdout after each command.

use cms_accounts::domain::types::CleanupReport;
use uuid::Uuid;

pub fn cleanup(report: &CleanupReport, dry_run: bool) -> String {
    let verb = if dry_run { "would delete" } else { "deleted" };
    format!(
        "{verb} {} reset code(s): {} expired, {} used past retention",
        report.total(),
        report.expired,
        report.old_used
    )
}

pub fn rate_limits(cleared: u64, email: Option<&str>) -> String {
    match email {
        Some(email) if cleared == 0 => format!("no rate limit bucket for {email}"),
        Some(email) => format!("cleared rate limit for {email}"),
        None => format!("cleared {cleared} rate limit bucket(s)"),
    }
}

pub fn test_email(id: Uuid, to: &str) -> String {
    format!("queued test email {id} for {to}")
}
