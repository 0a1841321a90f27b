use clap::{Parser, Subcommand};

pub mod ethereum;
pub mod explorer;
pub mod keys;
pub mod node;

#[derive(Parser, Debug)]
#[command(name = "oracle-node", about = "Executes job runs and manages their Ethereum transactions")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the node
    Run {
        #[command(flatten)]
        run_command: Box<RunCmd>,
    },
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct RunCmd {
    #[clap(flatten)]
    pub ethereum_args: ethereum::EthereumCliArgs,

    #[clap(flatten)]
    pub node_args: node::NodeCliArgs,

    #[clap(flatten)]
    pub explorer_args: explorer::ExplorerCliArgs,

    #[clap(flatten)]
    pub key_args: keys::KeyCliArgs,
}
