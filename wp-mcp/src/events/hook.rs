// Change hook feeding the notification log
//
// Registered with the content store; turns each content change into a
// notification for the affected resource URI.

use std::sync::Arc;

use serde_json::Value;

use super::NotificationLog;
use crate::content::{ChangeAction, ChangeHook};
use crate::resources::ResourceUri;

pub struct NotificationHook {
    log: Arc<NotificationLog>,
    scheme: String,
}

impl NotificationHook {
    pub fn new(log: Arc<NotificationLog>, scheme: impl Into<String>) -> Self {
        Self {
            log,
            scheme: scheme.into(),
        }
    }
}

impl ChangeHook for NotificationHook {
    fn on_change(&self, content_type: &str, id: &str, action: ChangeAction, data: &Value) {
        let uri = ResourceUri::new(&self.scheme, content_type, id).to_string();
        self.log.store(&uri, action, data.clone());
    }
}
