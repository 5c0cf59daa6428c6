//! External notifier (§4.4 step 9): one summary notification per finished
//! package. The concrete transport (mail, XMPP, …) is out of scope; the core
//! only needs a sink to hand the rendered subject/body to.

use log::info;

/// Sink for one package's finished-build summary notification.
pub trait Notifier: Send + Sync {
    fn notify(&self, subject: &str, body: &str);
}

/// Default notifier: logs the summary at info level. Grounded on the
/// teacher's habit of treating `log` as the fallback sink for anything
/// without a real transport wired up yet.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, subject: &str, body: &str) {
        info!("notify: {subject}\n{body}");
    }
}

/// Renders the subject/body pair for a finished package: build-results per
/// architecture, the changes dump, and the auto-port report.
pub fn render_summary(
    source: &str,
    version: &str,
    distribution: &str,
    installed: bool,
    success: &[String],
    failed: &[String],
    changes_dump: &str,
    port_report: &[(String, Result<(), String>)],
) -> (String, String) {
    let verdict = if installed { "INSTALLED" } else { "FAILED" };
    let subject = format!("{source}_{version} {distribution}: {verdict}");

    let mut body = String::new();
    body.push_str(&format!("{source} {version} on {distribution}: {verdict}\n\n"));
    if !success.is_empty() {
        body.push_str(&format!("succeeded: {}\n", success.join(", ")));
    }
    if !failed.is_empty() {
        body.push_str(&format!("failed: {}\n", failed.join(", ")));
    }
    if !port_report.is_empty() {
        body.push_str("\nauto-ports:\n");
        for (target, outcome) in port_report {
            match outcome {
                Ok(()) => body.push_str(&format!("  {target}: ok\n")),
                Err(e) => body.push_str(&format!("  {target}: failed ({e})\n")),
            }
        }
    }
    body.push_str("\n--- changes ---\n");
    body.push_str(changes_dump);

    (subject, body)
}
