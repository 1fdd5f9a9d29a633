use crate::email_client::EmailClient;
use once_cell::sync::OnceCell;

static EXECUTION_ALERT_NOTIFIER: OnceCell<ExecutionAlertNotifier> = OnceCell::new();

/// Installs the notifier with the configured agent name. Returns false when
/// alerts were already initialised.
pub fn init_execution_alerts(agent_name: Option<&str>) -> bool {
    EXECUTION_ALERT_NOTIFIER
        .set(ExecutionAlertNotifier::new(agent_name))
        .is_ok()
}

pub fn notify_execution_failure(context: &str, detail: &str) {
    EXECUTION_ALERT_NOTIFIER
        .get_or_init(|| ExecutionAlertNotifier::new(None))
        .notify(context, detail);
}

struct ExecutionAlertNotifier {
    agent_name: String,
}

impl ExecutionAlertNotifier {
    fn new(agent_name: Option<&str>) -> Self {
        let agent_name = agent_name.map(str::trim).unwrap_or_default().to_string();
        Self { agent_name }
    }

    fn subject(&self, context: &str) -> String {
        if self.agent_name.is_empty() {
            format!("[ExecutionFailure] {}", context)
        } else {
            format!("[{}] Execution failure - {}", self.agent_name, context)
        }
    }

    fn notify(&self, context: &str, detail: &str) {
        let subject = self.subject(context);
        let body = format!(
            "Order execution failed while {}.\nDetail: {}\nCheck both legs at the broker.",
            context, detail
        );

        if EmailClient::new().send(&subject, &body) {
            log::warn!(
                "📧 [ExecutionFailure] Email notification sent for '{}' (detail: {})",
                context,
                detail
            );
        }
    }
}
