pub mod channels;
pub mod protocol;

pub use channels::{ClientRx, ClientTx, OutboundFrame};
