use tracing::{error, info};

pub fn log_app_startup() {
    info!(
        event = "core.app.startup_completed",
        version = env!("CARGO_PKG_VERSION")
    );
}

/// A view owns its refresh sessions and live subscriptions for its lifetime.
pub fn log_view_opened(view: &str) {
    info!(event = "core.view.opened", view = view);
}

pub fn log_view_closed(view: &str, sessions: usize, subscriptions: usize) {
    info!(
        event = "core.view.closed",
        view = view,
        sessions = sessions,
        subscriptions = subscriptions
    );
}

pub fn log_app_error(error: &dyn std::error::Error) {
    error!(
        event = "core.app.error_occurred",
        error = %error,
        error_type = std::any::type_name_of_val(error)
    );
}
