use std::sync::Arc;

use common::context::Context;

use crate::config::AppConfig;
use crate::notification::NotificationService;

pub struct GlobalState {
    pub config: AppConfig,
    pub ctx: Context,
    pub notifications: Arc<NotificationService>,
}
