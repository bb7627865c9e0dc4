pub mod app;
pub mod commands;
pub mod connect;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod harvest;
pub mod output;
pub mod relay;
pub mod runtime;
pub mod state;

pub use connect::{cmd_connect, ConnectArgs};
pub use harvest::{cmd_harvest, HarvestArgs};
pub use relay::{cmd_relay, RelayArgs};
pub use state::{cmd_state, StateArgs};
