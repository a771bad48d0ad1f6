//! Wire format of the `/ws` chat protocol.
//!
//! Both directions are tagged unions keyed on a `type` field. Inbound frames
//! are validated here so the gateway only ever sees well-formed variants.

pub mod frames;
pub mod inbound;

pub use frames::{ChunkData, ServerFrame, ToolErrorData, ToolResultData};
pub use inbound::{ClientFrame, ProtocolError};
