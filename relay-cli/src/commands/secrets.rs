//! Secrets command - create and inspect the credentials file

use clap::{Args, Subcommand};
use relay_core::Secrets;

/// Manage credentials
#[derive(Args, Debug)]
pub struct SecretsArgs {
    #[command(subcommand)]
    pub command: SecretsCommand,
}

#[derive(Subcommand, Debug)]
pub enum SecretsCommand {
    /// Write a template secrets file with owner-only permissions
    Init,

    /// Show which credentials are available (never their values)
    Status,
}

impl SecretsArgs {
    /// Execute the secrets command
    pub fn execute(&self) -> anyhow::Result<()> {
        match self.command {
            SecretsCommand::Init => {
                let path = Secrets::create_template()?;
                println!("Created {}", path.display());
                println!("Edit it to add your GitHub token and model API key.");
            }
            SecretsCommand::Status => {
                let secrets = Secrets::load()?;
                let show = |found: bool| if found { "set" } else { "missing" };
                println!("GitHub token:  {}", show(secrets.github_token().is_some()));
                println!("Model API key: {}", show(secrets.model_api_key().is_some()));
                if let Some(path) = Secrets::default_secrets_path() {
                    println!("Secrets file:  {}", path.display());
                }
            }
        }
        Ok(())
    }
}
