use std::time::{Duration, Instant};

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Short lived notification shown in the status line.
#[derive(Debug, Clone)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
    pub created: Instant,
}

impl Toast {
    pub fn new(level: ToastLevel, message: impl Into<String>) -> Self {
        let message = message.into();
        match level {
            ToastLevel::Error => error!("{message}"),
            ToastLevel::Warning => warn!("{message}"),
            ToastLevel::Info | ToastLevel::Success => info!("{message}"),
        }
        Toast {
            level,
            message,
            created: Instant::now(),
        }
    }

    pub fn is_visible(&self, lifetime: Duration) -> bool {
        self.created.elapsed() < lifetime
    }
}
