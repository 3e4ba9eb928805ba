pub mod cataloging;
pub mod cosine;
pub mod error;
pub mod index;
pub mod metadata;
pub mod persistence;
pub mod producer;
pub mod protocol;
pub mod recommend;
pub mod server;
pub mod service;
pub mod slot_map;
pub mod store;
pub mod transport;
pub mod types;
