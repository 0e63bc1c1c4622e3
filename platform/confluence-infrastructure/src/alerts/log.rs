use confluence_domain::repositories::alerts::AlertSink;

/// Writes alerts to the log instead of a chat. Used for dry runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn notify(&self, message: &str) -> Result<(), String> {
        tracing::info!(target: "confluence::alerts", text = %message, "alert");
        metrics::counter!("confluence.infra.log_sink.messages_total").increment(1);
        Ok(())
    }
}
