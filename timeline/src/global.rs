use std::sync::Arc;

use common::context::Context;

use crate::config::AppConfig;
use crate::timeline::TimelineService;

pub struct GlobalState {
    pub config: AppConfig,
    pub ctx: Context,
    pub timeline: Arc<TimelineService>,
}
