//! Personal task lists with per-user ownership.
//!
//! The core is [`service::TaskService`]: it validates input, enforces that
//! callers only touch their own tasks, and applies create, rename, toggle and
//! delete. Everything around it (SQLite storage, sessions, the HTTP API) is
//! reached through the seams in [`db`], [`auth`] and [`refresh`].

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod models;
pub mod refresh;
pub mod service;
pub mod validation;
