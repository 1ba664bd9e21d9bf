//! Passfile CLI - encrypted password and note containers
//!
//! Command-line front end over the passfile core: it wires the config file,
//! the local store and a terminal passphrase prompt into a passfile context.

mod app;
mod cli;
mod commands;
mod config;
mod helpers;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use passfile_core::PassfileError;

use crate::app::App;
use crate::cli::{Cli, Commands};
use crate::commands::init::handle_init;
use crate::commands::misc::handle_completions;
use crate::commands::passfiles::{
    handle_add_section, handle_delete, handle_export, handle_list, handle_new, handle_passwd,
    handle_remove_section, handle_rename, handle_restore, handle_show, handle_status,
};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("PASSFILE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match run(&cli).await {
        Err(err) if is_core_error(&err, |e| matches!(e, PassfileError::AuthenticationFailed)) => {
            Err(anyhow::anyhow!("Incorrect passphrase"))
        }
        Err(err) if is_core_error(&err, |e| matches!(e, PassfileError::Cancelled)) => {
            if !cli.quiet {
                eprintln!("Cancelled.");
            }
            std::process::exit(130);
        }
        other => other,
    }
}

fn is_core_error(err: &anyhow::Error, check: impl Fn(&PassfileError) -> bool) -> bool {
    err.downcast_ref::<PassfileError>().is_some_and(check)
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let quiet = cli.quiet;
    match &cli.command {
        Commands::Init(args) => return handle_init(cli, args),
        Commands::Completions(args) => return handle_completions(args.shell),
        _ => {}
    }

    let app = App::open(cli).await?;
    let cancel = app.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    match &cli.command {
        Commands::List(args) => handle_list(&app, args),
        Commands::Show(args) => handle_show(&app, args, quiet).await,
        Commands::Export(args) => handle_export(&app, args, quiet).await,
        Commands::New(args) => handle_new(&app, args, quiet).await,
        Commands::Rename(args) => handle_rename(&app, args, quiet).await,
        Commands::AddSection(args) => handle_add_section(&app, args, quiet).await,
        Commands::RemoveSection(args) => handle_remove_section(&app, args, quiet).await,
        Commands::Passwd(target) => handle_passwd(&app, target.id, quiet).await,
        Commands::Delete(target) => handle_delete(&app, target.id, quiet).await,
        Commands::Restore(target) => handle_restore(&app, target.id, quiet).await,
        Commands::Status(args) => handle_status(&app, args),
        Commands::Init(_) | Commands::Completions(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_negative_ids_parse() {
        let cli = Cli::try_parse_from(["passfile", "show", "-3", "--reveal"]).unwrap();
        match cli.command {
            Commands::Show(args) => {
                assert_eq!(args.target.id, -3);
                assert!(args.reveal);
            }
            _ => panic!("expected show"),
        }
    }

    #[test]
    fn test_type_parses_through_core() {
        let cli =
            Cli::try_parse_from(["passfile", "new", "--type", "TXT", "--name", "Notes"]).unwrap();
        match cli.command {
            Commands::New(args) => {
                assert_eq!(args.passfile_type, passfile_core::PassFileType::Txt);
                assert_eq!(args.name, "Notes");
            }
            _ => panic!("expected new"),
        }
        assert!(Cli::try_parse_from(["passfile", "new", "--type", "doc", "--name", "x"]).is_err());
    }
}
