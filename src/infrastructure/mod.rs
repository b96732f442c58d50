//! Infrastructure layer - HTTP streaming and logging

pub mod llm;
pub mod logging;
