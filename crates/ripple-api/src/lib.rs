pub mod error;
pub mod messages;
pub mod ripples;
pub mod routes;
pub mod state;
pub mod stats;
