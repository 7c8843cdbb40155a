use common::context::Context;

use crate::comment::CommentService;
use crate::config::AppConfig;

pub struct GlobalState {
    pub config: AppConfig,
    pub ctx: Context,
    pub comments: CommentService,
}
