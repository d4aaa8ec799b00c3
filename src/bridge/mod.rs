//! Boundary with the embedded view: inbound events, outbound commands, stdio transport

pub mod ingress;
pub mod stdio;
pub mod view;

pub use ingress::{decode_message, ingress_channel, parse_line, BridgeEnvelope, BridgeMessage, IngressError, IngressSender};
pub use view::{view_channel, RepeatMode, ViewCommand, ViewError, ViewHandle, ViewRequest};
