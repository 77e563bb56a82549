// src/lib.rs - Inertia-aware enclosure heater controller
pub mod config;
pub mod control;
pub mod events;
pub mod hardware;
pub mod scheduler;
pub mod tuning;
pub mod web;
