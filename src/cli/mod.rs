use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod chat;
pub mod serve;

#[derive(Subcommand)]
enum Command {
    /// Run the relay API server
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "4242")]
        port: String,
    },
    /// Start an interactive chat session against a running relay
    Chat {
        /// Base URL of the relay server
        #[arg(long, default_value = "http://127.0.0.1:4242")]
        url: String,

        /// Model id to converse with
        #[arg(long, default_value = "gpt-3.5-turbo")]
        model: String,

        /// Session token to authenticate with, if the relay requires one
        #[arg(long)]
        token: Option<String>,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();

    // Handle each sub command
    match args.command {
        Command::Serve { host, port } => {
            serve::run(host, port).await;
        }
        Command::Chat { url, model, token } => {
            chat::run(&url, &model, token.as_deref()).await?;
        }
    }

    Ok(())
}
