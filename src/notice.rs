// src/notice.rs — user-visible, non-fatal messages recorded by the service layer
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

impl NoticeLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub at: DateTime<Local>,
}

impl Notice {
    /// `HH:MM:SS [level] message`
    pub fn display_line(&self) -> String {
        format!(
            "{} [{}] {}",
            self.at.format("%H:%M:%S"),
            self.level.as_str(),
            self.message
        )
    }
}

#[derive(Debug, Default)]
pub struct NoticeLog {
    items: Mutex<Vec<Notice>>,
}

impl NoticeLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Notice>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, level: NoticeLevel, message: impl Into<String>) {
        self.lock().push(Notice {
            level,
            message: message.into(),
            at: Local::now(),
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(NoticeLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.push(NoticeLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(NoticeLevel::Error, message);
    }

    /// Take everything recorded so far, oldest first.
    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.lock())
    }

    pub fn snapshot(&self) -> Vec<Notice> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
