//! Per-class notification queues.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Notifications kept per class. Oldest are dropped first.
pub const QUEUE_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

/// Kind of shared class resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceKind {
    Timetable,
}

/// Resource attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: ResourceKind,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: u64,
    pub level: Level,
    pub message: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Resource>,
}

/// Dispatch notifications to classes.
#[derive(Debug, Default)]
pub struct Notifier {
    queues: DashMap<String, VecDeque<Notification>>,
    next_id: AtomicU64,
}

impl Notifier {
    /// Create a new [`Notifier`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message for every member of `class_id`.
    pub fn notify(
        &self,
        class_id: &str,
        level: Level,
        message: impl Into<String>,
    ) -> Notification {
        self.push(class_id, level, message.into(), None)
    }

    /// Share a resource with every member of `class_id`.
    pub fn share(
        &self,
        class_id: &str,
        kind: ResourceKind,
        url: impl Into<String>,
    ) -> Notification {
        let message = match kind {
            ResourceKind::Timetable => "A new timetable has been shared.",
        };
        let resource = Resource {
            kind,
            url: url.into(),
        };

        self.push(class_id, Level::Success, message.to_owned(), Some(resource))
    }

    /// Notifications of `class_id`, oldest first.
    pub fn list(&self, class_id: &str) -> Vec<Notification> {
        self.queues
            .get(class_id)
            .map(|queue| queue.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn push(
        &self,
        class_id: &str,
        level: Level,
        message: String,
        resource: Option<Resource>,
    ) -> Notification {
        let notification = Notification {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            level,
            message,
            created_at: Utc::now(),
            resource,
        };

        let mut queue = self.queues.entry(class_id.to_owned()).or_default();
        if queue.len() >= QUEUE_CAPACITY {
            queue.pop_front();
        }
        queue.push_back(notification.clone());

        tracing::debug!(class_id, id = notification.id, level = ?level, "notification queued");
        notification
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify() {
        let notifier = Notifier::new();
        notifier.notify("l3-info", Level::Info, "Timetable deleted");
        notifier.notify("m1-math", Level::Warning, "Other class");

        let notifications = notifier.list("l3-info");
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].level, Level::Info);
        assert_eq!(notifications[0].message, "Timetable deleted");
        assert!(notifier.list("unknown").is_empty());
    }

    #[test]
    fn test_share() {
        let notifier = Notifier::new();
        let shared =
            notifier.share("l3-info", ResourceKind::Timetable, "https://ucad.sn/edt.pdf");

        assert_eq!(shared.level, Level::Success);
        assert_eq!(
            shared.resource,
            Some(Resource {
                kind: ResourceKind::Timetable,
                url: "https://ucad.sn/edt.pdf".into(),
            })
        );

        let json = serde_json::to_value(&shared).unwrap();
        assert_eq!(json["resource"]["kind"], "TIMETABLE");
        assert_eq!(json["level"], "SUCCESS");
    }

    #[test]
    fn test_capacity() {
        let notifier = Notifier::new();
        for i in 0..QUEUE_CAPACITY + 5 {
            notifier.notify("l3-info", Level::Info, format!("message {i}"));
        }

        let notifications = notifier.list("l3-info");
        assert_eq!(notifications.len(), QUEUE_CAPACITY);
        assert_eq!(notifications[0].message, "message 5");
        assert!(notifications.windows(2).all(|w| w[0].id < w[1].id));
    }
}
