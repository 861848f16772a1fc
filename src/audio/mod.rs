pub mod engine;
pub mod jack;
pub mod manager;
pub mod ports;
