pub mod connection;
pub mod message;
pub mod relay;
pub mod send;
