pub mod app;
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod demo_seeder;
pub mod error;
pub mod notify;
pub mod realtime;
pub mod services;
pub mod storage {
    pub mod client;
}
pub mod tenant;
