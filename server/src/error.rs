//! Errors surfaced by the server runtime

use tallgrass_battle::ActionError;
use tallgrass_protocol::BattleId;
use thiserror::Error;
use tokio::sync::oneshot;

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("battle {0} is not running")]
    UnknownBattle(BattleId),

    #[error("session actor inbox for battle {0} is closed")]
    InboxClosed(BattleId),

    #[error("session actor dropped the reply")]
    ReplyDropped(#[source] oneshot::error::RecvError),

    #[error(transparent)]
    Action(#[from] ActionError),
}
