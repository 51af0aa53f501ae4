//! # MQTT Integration Module
//!
//! Owns the broker session for the bridge: connecting with the device
//! credentials, (re)subscribing to the request topics after every connect,
//! routing inbound requests to the dispatch worker and publishing responses.
//!
//! ## Module Architecture
//!
//! ```text
//! mqtt/
//! ├── config.rs           - Broker settings and their rumqttc options
//! ├── message_manager.rs  - Inbound message representation
//! ├── mqtt_handler.rs     - Pub/sub client traits and the rumqttc implementation
//! └── lifecycle.rs        - Connection state machine and worker supervision
//! ```
//!
//! ## Design Philosophy
//!
//! - **Abstract client**: the lifecycle only sees [`mqtt_handler::BrokerClient`]
//!   and [`mqtt_handler::SessionEvents`], so it runs unchanged against a fake
//!   broker in tests
//! - **Non-durable sessions**: clean sessions are used, so every reconnect
//!   repeats the subscribe step
//! - **Explicit transitions**: connection handling is a pure state machine;
//!   starting and stopping the worker are actions of its transitions

pub mod config;
pub mod lifecycle;
pub mod message_manager;
pub mod mqtt_handler;
