//! Protocol Module
//!
//! The command surface shared by every backend.
//!
//! ## Layers
//! - [`Command`]: one backend operation over raw byte keys/values
//! - [`Reply`]: backend-native result (nil, ok, integer, bulk, array)

mod command;
mod reply;

pub use command::{Command, InsertPosition, SetCondition};
pub use reply::{format_float, parse_float, Reply};
