//! `contacts` - CLI for contactbook
//!
//! This binary lists, follows and edits the contacts kept in the local
//! contact store.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};

use contactbook::cli::output::{contact_line, render_contact, render_display};
use contactbook::cli::{
    AddCommand, Cli, Command, ConfigCommand, EditCommand, ListCommand, PhotoCommand, ShowCommand,
    WatchCommand,
};
use contactbook::filter::filter_contacts;
use contactbook::{
    init_logging, Config, ContactListView, ContactRepository, JpegBase64Codec, SectionBuilder,
    SqliteStore,
};

type Repository = ContactRepository<SqliteStore, JpegBase64Codec>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Config(config_cmd) => handle_config(&config, config_cmd, cli.config),
        command => run(command, &config).await,
    }
}

async fn run(command: Command, config: &Config) -> Result<()> {
    let path = config.database_path();
    let store = Arc::new(
        SqliteStore::open(&path)
            .with_context(|| format!("failed to open contact store at {}", path.display()))?,
    );
    let repo = ContactRepository::with_codec(
        Arc::clone(&store),
        &config.store.collection,
        JpegBase64Codec::from_config(&config.photo),
    );

    match command {
        Command::List(cmd) => handle_list(&store, &repo, config, &cmd).await,
        Command::Watch(cmd) => handle_watch(store, config, &cmd).await,
        Command::Show(cmd) => handle_show(&repo, &cmd).await,
        Command::Add(cmd) => handle_add(&repo, &cmd).await,
        Command::Edit(cmd) => handle_edit(&repo, &cmd).await,
        Command::Delete { id } => {
            repo.delete(&id).await?;
            println!("Deleted {id}");
            Ok(())
        }
        Command::Block { id } => handle_block(&repo, &id, true).await,
        Command::Unblock { id } => handle_block(&repo, &id, false).await,
        Command::Photo(cmd) => handle_photo(&repo, &cmd).await,
        Command::Config(cmd) => handle_config(config, cmd, None),
    }
}

fn view_for(store: Arc<SqliteStore>, config: &Config) -> ContactListView<SqliteStore> {
    ContactListView::new(store, &config.store.collection)
        .with_builder(SectionBuilder::new(&config.display.favorites_header))
}

async fn handle_list(
    store: &Arc<SqliteStore>,
    repo: &Repository,
    config: &Config,
    cmd: &ListCommand,
) -> Result<()> {
    if cmd.favorites {
        let favorites = repo.favorites().await?;
        let matching = filter_contacts(&favorites, cmd.query.as_deref());
        if cmd.json {
            let records: Vec<_> = matching.iter().map(|c| c.record()).collect();
            println!("{}", serde_json::to_string_pretty(&records)?);
        } else {
            for contact in &matching {
                println!("{}", contact_line(contact));
            }
        }
        return Ok(());
    }

    let mut view = view_for(Arc::clone(store), config);
    view.activate().await?;
    match view.next_update().await {
        Some(result) => {
            result?;
        }
        None => bail!("contact subscription closed before the first snapshot"),
    }
    let list = view.set_query(cmd.query.as_deref())?;
    view.deactivate();

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&list)?);
    } else if list.is_empty() {
        println!("No contacts.");
    } else {
        print!("{}", render_display(&list.items));
    }
    Ok(())
}

async fn handle_watch(store: Arc<SqliteStore>, config: &Config, cmd: &WatchCommand) -> Result<()> {
    let mut view = view_for(store, config);
    view.set_query(cmd.query.as_deref())?;
    view.activate().await?;
    info!("Watching contacts, press Ctrl-C to stop");

    loop {
        tokio::select! {
            update = view.next_update() => match update {
                Some(Ok(list)) if list.changed => {
                    if cmd.json {
                        println!("{}", serde_json::to_string(&list)?);
                    } else {
                        println!("--- {} contacts", list.entry_count());
                        print!("{}", render_display(&list.items));
                    }
                }
                Some(Ok(_)) => debug!("Update without visible change"),
                Some(Err(e)) => warn!(error = %e, "Contact list update failed, showing last list"),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted");
                break;
            }
        }
    }

    view.deactivate();
    Ok(())
}

async fn handle_show(repo: &Repository, cmd: &ShowCommand) -> Result<()> {
    let contact = repo
        .get(&cmd.id)
        .await
        .with_context(|| format!("failed to load contact {}", cmd.id))?;
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&contact.record())?);
    } else {
        print!("{}", render_contact(&contact));
    }
    Ok(())
}

async fn handle_add(repo: &Repository, cmd: &AddCommand) -> Result<()> {
    let mut contact = contactbook::Contact::default();
    cmd.fields.apply_to(&mut contact);
    if let Some(file) = &cmd.photo {
        let image = load_image(file)?;
        repo.set_photo(&mut contact, &image).await?;
    }

    let id = repo.create(&mut contact).await?;
    println!("Added {id}");
    Ok(())
}

async fn handle_edit(repo: &Repository, cmd: &EditCommand) -> Result<()> {
    let mut contact = repo
        .get(&cmd.id)
        .await
        .with_context(|| format!("failed to load contact {}", cmd.id))?;
    cmd.fields.apply_to(&mut contact);
    repo.update(&mut contact).await?;
    println!("Updated {}", contact.id);
    Ok(())
}

async fn handle_block(repo: &Repository, id: &str, blocked: bool) -> Result<()> {
    let mut contact = repo
        .get(id)
        .await
        .with_context(|| format!("failed to load contact {id}"))?;
    if contact.blocked == blocked {
        println!("{id} is already {}", if blocked { "blocked" } else { "unblocked" });
        return Ok(());
    }
    repo.set_blocked(&mut contact, blocked).await?;
    println!("{} {id}", if blocked { "Blocked" } else { "Unblocked" });
    Ok(())
}

async fn handle_photo(repo: &Repository, cmd: &PhotoCommand) -> Result<()> {
    let mut contact = repo
        .get(&cmd.id)
        .await
        .with_context(|| format!("failed to load contact {}", cmd.id))?;
    let image = load_image(&cmd.file)?;
    repo.set_photo(&mut contact, &image).await?;
    println!("Photo updated for {}", contact.id);
    Ok(())
}

fn load_image(path: &Path) -> Result<image::DynamicImage> {
    image::open(path).with_context(|| format!("failed to read image {}", path.display()))
}

fn handle_config(
    config: &Config,
    cmd: ConfigCommand,
    config_path: Option<std::path::PathBuf>,
) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("# database: {}", config.database_path().display());
                print!("{}", config.to_toml()?);
            }
        }
        ConfigCommand::Path => {
            let path = config_path.unwrap_or_else(Config::default_config_path);
            println!("{}", path.display());
        }
        ConfigCommand::Validate { file } => {
            let path = file
                .or(config_path)
                .unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}
