//! Domain layer for verification: entities and the token state machine

pub mod entities;
pub mod state;
