//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `CloudFoundryReceiver`: Receiver lifecycle and the streaming poll loop

mod receiver;

pub use receiver::{
    CloudFoundryReceiver, CloudFoundryReceiverBuilder, DATA_FORMAT, ReceiverError, TRANSPORT,
};
