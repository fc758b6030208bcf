//! Types shared between the taskxp server and its clients.

pub mod api;
pub mod auth;
pub mod domain;
pub mod jwt;
