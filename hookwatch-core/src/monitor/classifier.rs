//! Classification of raw operation bits into notification kinds

use crate::monitor::{NotificationKind, RawOp};

// Checked in order; the first bit present wins.
const PRIORITY_ORDER: [(RawOp, NotificationKind); 4] = [
    (RawOp::CREATE, NotificationKind::Created),
    (RawOp::WRITE, NotificationKind::Modified),
    (RawOp::REMOVE, NotificationKind::Deleted),
    (RawOp::RENAME, NotificationKind::Moved),
];

/// Map raw operation bits to a kind, `None` if no known bit is set
pub fn classify(op: RawOp) -> Option<NotificationKind> {
    PRIORITY_ORDER
        .iter()
        .find(|(bit, _)| op.contains(*bit))
        .map(|(_, kind)| *kind)
}

/// Exact, case-sensitive membership test against configured kind names
pub fn is_enabled(kind: NotificationKind, configured: &[String]) -> bool {
    configured.iter().any(|name| name == kind.as_str())
}

/// Classifier bound to the configured set of enabled kinds
#[derive(Debug, Clone)]
pub struct EventClassifier {
    enabled: Vec<String>,
}

impl EventClassifier {
    pub fn new(enabled: Vec<String>) -> Self {
        Self { enabled }
    }

    pub fn classify(&self, op: RawOp) -> Option<NotificationKind> {
        classify(op)
    }

    pub fn is_enabled(&self, kind: NotificationKind) -> bool {
        is_enabled(kind, &self.enabled)
    }
}
