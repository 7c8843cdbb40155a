use common::context::Context;

use crate::config::AppConfig;
use crate::follow::FollowGraph;

pub struct GlobalState {
    pub config: AppConfig,
    pub ctx: Context,
    pub graph: FollowGraph,
}
