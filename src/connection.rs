//! Gateway connection management: the background engine task and the
//! low-level WebSocket transport helpers it drives.

pub(crate) mod engine;
pub(crate) mod transport;

pub(crate) use engine::{EngineCmd, EngineConfig, EngineHandle};
