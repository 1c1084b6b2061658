pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod model;
pub mod notify;
pub mod scheduler;
pub mod storage;
