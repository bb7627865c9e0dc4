use clap::Subcommand;

use super::connect::ConnectArgs;
use super::harvest::HarvestArgs;
use super::relay::RelayArgs;
use super::state::StateArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Harvest listing pages through the action oracle
    Harvest(HarvestArgs),

    /// Replay the backlog CSV against the job endpoint
    Dispatch(RelayArgs),

    /// Send one connection request to the next uncontacted profile
    Connect(ConnectArgs),

    /// Inspect persisted state files
    State(StateArgs),
}
