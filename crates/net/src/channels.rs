use tokio::sync::mpsc;

use crate::protocol::ServerMessage;

/// One outbound frame for a single session. The room emits these in order;
/// the gateway's writer task forwards them in the same order.
#[derive(Debug)]
pub enum OutboundFrame {
    Message(ServerMessage),
    /// Terminal frame: the writer sends a close frame with this code and
    /// stops. Nothing queued after it is delivered.
    Close { code: u16, reason: String },
}

/// Sender handed to the room at join; one per session.
pub type ClientTx = mpsc::UnboundedSender<OutboundFrame>;
/// Receiver owned by the session's writer task.
pub type ClientRx = mpsc::UnboundedReceiver<OutboundFrame>;
