//! HTTP handlers for the verification domain

pub mod email;
