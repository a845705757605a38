//! Boundary between the coordinator and whatever actually moves the dome.
//!
//! A gateway accepts a [`MoveRequest`] and hands back a [`CommandHandle`]
//! on which the remote side reports progress. Gateways never decide when a
//! command has timed out; the control loop bounds the wait itself.

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::angle::Azimuth;

#[derive(Debug, Error, PartialEq)]
pub enum GatewayError {
    #[error("dome unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct MoveRequest {
    pub id: Uuid,
    pub azimuth: Azimuth,
}

/// Progress reported by the remote side for one command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandReply {
    Accepted,
    Completed,
    Rejected(String),
}

/// Receiving end for the replies to one move command.
#[derive(Debug)]
pub struct CommandHandle {
    id: Uuid,
    replies: mpsc::UnboundedReceiver<CommandReply>,
}

impl CommandHandle {
    pub fn channel(id: Uuid) -> (CommandResponder, CommandHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            CommandResponder { id, replies: tx },
            CommandHandle { id, replies: rx },
        )
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next reply, or `None` once the responder is gone.
    pub async fn next_reply(&mut self) -> Option<CommandReply> {
        self.replies.recv().await
    }
}

/// Sending end held by the gateway implementation.
#[derive(Debug, Clone)]
pub struct CommandResponder {
    id: Uuid,
    replies: mpsc::UnboundedSender<CommandReply>,
}

impl CommandResponder {
    pub fn accept(&self) {
        self.reply(CommandReply::Accepted);
    }

    pub fn complete(&self) {
        self.reply(CommandReply::Completed);
    }

    pub fn reject(&self, reason: impl Into<String>) {
        self.reply(CommandReply::Rejected(reason.into()));
    }

    fn reply(&self, reply: CommandReply) {
        if self.replies.send(reply).is_err() {
            log::debug!("Nobody is waiting on command {} any more", self.id);
        }
    }
}

pub trait CommandGateway: Send + Sync {
    /// Start a move. Must not block; progress arrives on the returned handle.
    fn send_move(&self, request: MoveRequest) -> Result<CommandHandle, GatewayError>;
}

/// Gateway for running without a dome: every move is logged and reported
/// as completed straight away.
#[derive(Debug, Default)]
pub struct DryRunGateway;

impl CommandGateway for DryRunGateway {
    fn send_move(&self, request: MoveRequest) -> Result<CommandHandle, GatewayError> {
        let (responder, handle) = CommandHandle::channel(request.id);
        log::info!("Dry run: would move dome to {}", request.azimuth);
        responder.accept();
        responder.complete();
        Ok(handle)
    }
}
