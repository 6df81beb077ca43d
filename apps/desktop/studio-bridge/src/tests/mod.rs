mod error;
mod handoff;
mod logger;
