//! 各资源的 HTTP handler

pub mod accounting;
pub mod days;
pub mod deliveries;
pub mod desserts;
pub mod game;
pub mod health;
pub mod inventory;
pub mod notifications;
pub mod recipes;
pub mod sales;
pub mod sellers;
pub mod users;
