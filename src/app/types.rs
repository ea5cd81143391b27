// src/app/types.rs
use std::sync::Arc;

use crate::catalogue::Catalogue;

// ---- cross-thread messages ----
pub enum CatalogueMsg {
    Info(String),
    Done(Arc<Catalogue>),
    Error(String),
}

// ---- app phases ----
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootPhase {
    Starting,
    Loading,
    Ready,
    /// Catalogue unavailable; search still works, filters and details do not.
    Degraded,
}

impl BootPhase {
    pub const fn label(self) -> &'static str {
        match self {
            BootPhase::Starting => "Starting",
            BootPhase::Loading => "Loading catalogue",
            BootPhase::Ready => "Ready",
            BootPhase::Degraded => "Catalogue unavailable",
        }
    }
}
