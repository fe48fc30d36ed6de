// src/handlers/mod.rs

pub mod auth;
pub mod question;
pub mod response;
