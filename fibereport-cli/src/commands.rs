//! Implementations of the individual subcommands.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use eyre::{Result, WrapErr};
use fibereport::{
    parse_actions, Action, ChartSnapshot, Config, Dataset, FilePreview, FileSnapshot, FileStore,
    HttpTransport, MemoryStore, Session, TableId,
};
use log::info;

/// Determines what ends up in a payload or report.
#[derive(Args, Debug)]
pub struct SelectionArgs {
    /// The parsed trace (JSON or YAML).
    pub dataset: PathBuf,

    /// Start from the selection saved in this template.
    #[clap(short, long)]
    pub template: Option<String>,

    /// Replay recorded actions (a JSON array or JSON lines) on top of the
    /// template.
    #[clap(short, long)]
    pub actions: Option<PathBuf>,

    /// The source file name to report. Defaults to the dataset's file name.
    #[clap(short, long)]
    pub source: Option<String>,

    /// A PNG snapshot of the trace chart.
    #[clap(long)]
    pub chart: Option<PathBuf>,
}

fn open_session(config: &Config) -> Result<Session<FileStore>> {
    let store = FileStore::open(&config.template_store).wrap_err_with(|| {
        format!(
            "failed to open template store {}",
            config.template_store.display()
        )
    })?;
    Ok(Session::new(store)?)
}

fn load_dataset(
    session: &mut Session<FileStore>,
    path: &Path,
    source: Option<&str>,
) -> Result<()> {
    let dataset = Dataset::load_from_file(path)?;
    let default_source = path.file_name().map(|name| name.to_string_lossy().into_owned());
    session.load_dataset(dataset, source.or(default_source.as_deref()));
    Ok(())
}

fn replay_actions(session: &mut Session<FileStore>, path: &Path) -> Result<()> {
    let content = fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read actions from {}", path.display()))?;
    let actions = parse_actions(&content)
        .wrap_err_with(|| format!("failed to parse actions from {}", path.display()))?;
    info!("Replaying {} action(s)", actions.len());
    session.apply_all(actions)?;
    Ok(())
}

/// A session with the dataset loaded and the requested selection applied.
fn selected_session(config: &Config, args: &SelectionArgs) -> Result<Session<FileStore>> {
    let mut session = open_session(config)?;
    load_dataset(&mut session, &args.dataset, args.source.as_deref())?;
    if let Some(name) = &args.template {
        session.apply(Action::LoadTemplate { name: name.clone() })?;
    }
    if let Some(path) = &args.actions {
        replay_actions(&mut session, path)?;
    }
    Ok(session)
}

fn chart(args: &SelectionArgs) -> Option<FileSnapshot> {
    args.chart.as_ref().map(FileSnapshot::new)
}

pub fn leaves(dataset: &Path) -> Result<()> {
    let dataset = Dataset::load_from_file(dataset)?;
    let mut session = Session::new(MemoryStore::new())?;
    session.load_dataset(dataset, None);
    for (path, value) in session.leaves() {
        println!("{} = {}", path.join(" / "), value);
    }
    for table in TableId::ALL {
        println!("[{}] {}", table, session.columns(table).join(", "));
    }
    Ok(())
}

pub fn list_templates(config: &Config) -> Result<()> {
    let session = open_session(config)?;
    for name in session.templates().list()? {
        println!("{}", name);
    }
    Ok(())
}

pub fn show_template(config: &Config, name: &str) -> Result<()> {
    let session = open_session(config)?;
    let template = session.templates().get(name)?;
    println!("{}", serde_json::to_string_pretty(&template.snapshot)?);
    Ok(())
}

pub fn delete_template(config: &Config, name: &str) -> Result<()> {
    let mut session = open_session(config)?;
    session.apply(Action::DeleteTemplate {
        name: name.to_string(),
    })?;
    info!("Deleted template \"{}\"", name);
    Ok(())
}

pub fn save_template(
    config: &Config,
    name: &str,
    dataset: &Path,
    actions: Option<&Path>,
) -> Result<()> {
    let mut session = open_session(config)?;
    load_dataset(&mut session, dataset, None)?;
    if let Some(path) = actions {
        replay_actions(&mut session, path)?;
    }
    session.apply(Action::SaveTemplateAs {
        name: name.to_string(),
    })?;
    Ok(())
}

pub fn payload(config: &Config, args: &SelectionArgs) -> Result<()> {
    let session = selected_session(config, args)?;
    let chart = chart(args);
    let payload = session.payload(chart.as_ref().map(|c| c as &dyn ChartSnapshot))?;
    println!("{}", payload.to_json_pretty()?);
    Ok(())
}

pub fn report(config: &Config, args: &SelectionArgs, out: Option<&Path>) -> Result<()> {
    let session = selected_session(config, args)?;
    let chart = chart(args);
    let chart = chart.as_ref().map(|c| c as &dyn ChartSnapshot);
    match out {
        Some(out) => {
            let report = session.report(chart)?;
            fs::write(out, report)
                .wrap_err_with(|| format!("failed to write report to {}", out.display()))?;
            info!("Wrote report to {}", out.display());
        }
        None => {
            let preview = FilePreview::new(&config.preview_dir, config.open_preview);
            session.preview(&preview, chart)?;
        }
    }
    Ok(())
}

pub fn send(config: &Config, args: &SelectionArgs) -> Result<()> {
    let session = selected_session(config, args)?;
    let chart = chart(args);
    let transport = HttpTransport::new(&config.endpoint, config.timeout())?;
    session.send(&transport, chart.as_ref().map(|c| c as &dyn ChartSnapshot))?;
    Ok(())
}
