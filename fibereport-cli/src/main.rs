use std::path::PathBuf;

use clap::{Parser, Subcommand};
use eyre::{Result, WrapErr};
use fibereport::config::DEFAULT_CONFIG_FILE;
use fibereport::Config;

mod commands;
mod server;

use commands::SelectionArgs;

#[derive(Parser, Debug)]
#[clap(name = "fibereport", about, version)]
struct Cli {
    /// Increase output logging verbosity.
    #[clap(short, long)]
    verbose: bool,

    /// Configuration file (YAML or JSON). Ignored if it does not exist.
    #[clap(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the selectable properties and table columns of a dataset.
    Leaves {
        /// The parsed trace (JSON or YAML).
        dataset: PathBuf,
    },
    /// Manage saved templates.
    Templates {
        #[clap(subcommand)]
        command: TemplatesCommand,
    },
    /// Print the payload for a selection.
    Payload(SelectionArgs),
    /// Render the report for a selection.
    Report {
        #[clap(flatten)]
        selection: SelectionArgs,

        /// Write the report here instead of previewing it.
        #[clap(short, long)]
        out: Option<PathBuf>,
    },
    /// Send the payload for a selection to the configured endpoint.
    Send(SelectionArgs),
    /// Save the selection produced by replaying actions as a template.
    SaveTemplate {
        name: String,

        /// The parsed trace (JSON or YAML).
        dataset: PathBuf,

        /// Recorded actions (a JSON array or JSON lines).
        #[clap(short, long)]
        actions: Option<PathBuf>,
    },
    /// Serve the file-browsing API.
    Serve,
}

#[derive(Subcommand, Debug)]
enum TemplatesCommand {
    /// List the names of all saved templates.
    List,
    /// Print a template's selection.
    Show { name: String },
    /// Delete a template, if it exists.
    Delete { name: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    simple_logger::init_with_level(if cli.verbose {
        log::Level::Debug
    } else {
        log::Level::Info
    })
    .wrap_err("failed to initialize logging")?;

    let config = Config::load_or_default(&cli.config)?;
    match cli.command {
        Command::Leaves { dataset } => commands::leaves(&dataset),
        Command::Templates { command } => match command {
            TemplatesCommand::List => commands::list_templates(&config),
            TemplatesCommand::Show { name } => commands::show_template(&config, &name),
            TemplatesCommand::Delete { name } => commands::delete_template(&config, &name),
        },
        Command::Payload(selection) => commands::payload(&config, &selection),
        Command::Report { selection, out } => {
            commands::report(&config, &selection, out.as_deref())
        }
        Command::Send(selection) => commands::send(&config, &selection),
        Command::SaveTemplate {
            name,
            dataset,
            actions,
        } => commands::save_template(&config, &name, &dataset, actions.as_deref()),
        Command::Serve => server::serve(&config.server),
    }
}
