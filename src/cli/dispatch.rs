use anyhow::Result;

use super::connect::cmd_connect;
use super::env::CliArgs;
use super::harvest::cmd_harvest;
use super::relay::cmd_relay;
use super::state::cmd_state;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Harvest(args) => cmd_harvest(args, ctx, cli.output).await,
        Commands::Dispatch(args) => cmd_relay(args, ctx, cli.output).await,
        Commands::Connect(args) => cmd_connect(args, ctx, cli.output).await,
        Commands::State(args) => cmd_state(args, ctx, cli.output),
    }
}
