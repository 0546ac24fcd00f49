//#![warn(missing_docs)]

#![cfg_attr(not(feature = "std"), no_std)]
extern crate alloc;

pub mod clock;

pub mod hash;

pub mod name;

pub mod packet;

pub mod face;

pub mod tables;

pub mod dead_nonce;

pub mod store;

pub mod scheduler;

pub mod strategy;

pub mod unsolicited;

pub mod region;

pub mod forwarder;

pub mod config;

pub mod platform;

pub use clock::{Clock, ManualClock, Timestamp};
pub use config::ForwarderConfig;
pub use face::{EndpointId, FaceEndpoint, FaceScope, FaceSender, FaceToken, LinkType};
pub use forwarder::{Forwarder, ForwarderCounters, ForwarderMetrics, ForwarderState, InertMetrics};
pub use name::{Name, NameComponent};
pub use packet::{Data, Interest, Nack, NackReason, Nonce, Packet};
pub use store::{ContentStore, ReferenceContentStore};
pub use strategy::{Strategy, StrategyId};
