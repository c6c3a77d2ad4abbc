use crate::protocol::ResponseStatus;

/// Receives notifications about server activity. All methods default to
/// doing nothing.
pub trait Observer: Send + Sync {
    fn connected(&self, _remote: &str) {}

    fn disconnected(&self, _remote: &str) {}

    fn request_received(&self, _remote: &str, _request_id: &str, _type_tag: &str) {}

    fn response_sent(&self, _remote: &str, _type_tag: &str, _status: &ResponseStatus) {}

    /// A request failed; `request_id` is empty when the envelope could not
    /// be read at all.
    fn error(&self, _remote: &str, _request_id: &str, _type_tag: &str, _message: &str) {}
}

/// Writes every notification to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn connected(&self, remote: &str) {
        info!("{} connected", remote);
    }

    fn disconnected(&self, remote: &str) {
        info!("{} disconnected", remote);
    }

    fn request_received(&self, remote: &str, request_id: &str, type_tag: &str) {
        debug!("{} -> {} {}", remote, type_tag, request_id);
    }

    fn response_sent(&self, remote: &str, type_tag: &str, status: &ResponseStatus) {
        trace!(
            "{} <- {} {} (more: {})",
            remote,
            type_tag,
            status.request_id,
            status.is_more
        );
    }

    fn error(&self, remote: &str, request_id: &str, type_tag: &str, message: &str) {
        warn!("{} {} {} failed: {}", remote, type_tag, request_id, message);
    }
}
