mod bridge;
mod config;
mod helpers;
mod manager;
