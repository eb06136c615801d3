//! Dispatch API Library
//!
//! Multi-site order management: stores place stock orders against a central
//! warehouse, orders move created → approved → packed → dispatched →
//! received, and every transition is synchronized between the cloud
//! (warehouse-wide) and local (per-site) databases by the `sync` module.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod commands;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod lifecycle;
pub mod packing;
pub mod queries;
pub mod services;
pub mod sync;

use std::sync::Arc;

use serde::Serialize;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub registry: Arc<db::PoolRegistry>,
    pub event_sender: Arc<events::EventSender>,
    pub services: handlers::AppServices,
}

/// Uniform success envelope: a `message` plus the operation's own fields
/// flattened alongside it.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub message: String,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }
}
