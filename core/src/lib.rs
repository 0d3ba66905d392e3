pub mod db;
pub mod mfds;
pub mod models;
pub mod search;
pub mod service;
pub mod serving;
pub mod stats;
