//! Command-line interface for contactbook.
//!
//! This module provides the CLI structure and command handlers for the
//! `contacts` binary.

mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AddCommand, ConfigCommand, ContactFields, EditCommand, ListCommand, PhotoCommand, ShowCommand,
    WatchCommand,
};

use crate::logging::Verbosity;

/// contacts - A live, searchable address book
///
/// Lists contacts with favorites first and the rest grouped by initial,
/// follows changes as they happen, and edits individual entries.
#[derive(Debug, Parser)]
#[command(name = "contacts")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List contacts once
    List(ListCommand),

    /// Follow the contact list until interrupted
    Watch(WatchCommand),

    /// Show one contact
    Show(ShowCommand),

    /// Add a contact
    Add(AddCommand),

    /// Change fields of a contact
    Edit(EditCommand),

    /// Delete a contact
    Delete {
        /// Contact id
        id: String,
    },

    /// Block calls and messages from a contact
    Block {
        /// Contact id
        id: String,
    },

    /// Unblock a contact
    Unblock {
        /// Contact id
        id: String,
    },

    /// Attach a photo to a contact
    Photo(PhotoCommand),

    /// View or check configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "contacts");
    }

    #[test]
    fn test_cli_verify() {
        // Verify the CLI structure is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_flags() {
        assert_eq!(parse(&["contacts", "-q", "list"]).verbosity(), Verbosity::Quiet);
        assert_eq!(parse(&["contacts", "list"]).verbosity(), Verbosity::Normal);
        assert_eq!(parse(&["contacts", "-v", "list"]).verbosity(), Verbosity::Verbose);
        assert_eq!(parse(&["contacts", "-vv", "list"]).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_list() {
        let cli = parse(&["contacts", "list", "amy", "--favorites"]);
        let Command::List(cmd) = cli.command else {
            panic!("expected list");
        };
        assert_eq!(cmd.query.as_deref(), Some("amy"));
        assert!(cmd.favorites);
        assert!(!cmd.json);
    }

    #[test]
    fn test_parse_watch_without_query() {
        let cli = parse(&["contacts", "watch", "--json"]);
        assert!(matches!(
            cli.command,
            Command::Watch(WatchCommand { query: None, json: true })
        ));
    }

    #[test]
    fn test_parse_add() {
        let cli = parse(&[
            "contacts",
            "add",
            "--first",
            "Amy",
            "--phone",
            "555-1234",
            "--birthday",
            "1990-04-01",
            "--favorite",
        ]);
        let Command::Add(cmd) = cli.command else {
            panic!("expected add");
        };
        assert_eq!(cmd.fields.first.as_deref(), Some("Amy"));
        assert_eq!(cmd.fields.favorite, Some(true));
        assert_eq!(
            cmd.fields.birthday,
            chrono::NaiveDate::from_ymd_opt(1990, 4, 1)
        );
        assert!(cmd.photo.is_none());
    }

    #[test]
    fn test_parse_edit_unfavorite() {
        let cli = parse(&["contacts", "edit", "abc", "--favorite", "false"]);
        let Command::Edit(cmd) = cli.command else {
            panic!("expected edit");
        };
        assert_eq!(cmd.id, "abc");
        assert_eq!(cmd.fields.favorite, Some(false));
    }

    #[test]
    fn test_parse_bad_birthday() {
        assert!(Cli::try_parse_from(["contacts", "add", "--birthday", "April"]).is_err());
    }

    #[test]
    fn test_parse_block_and_photo() {
        assert!(matches!(
            parse(&["contacts", "block", "abc"]).command,
            Command::Block { id } if id == "abc"
        ));
        let Command::Photo(cmd) = parse(&["contacts", "photo", "abc", "me.png"]).command else {
            panic!("expected photo");
        };
        assert_eq!(cmd.file, PathBuf::from("me.png"));
    }

    #[test]
    fn test_parse_with_config() {
        let cli = parse(&["contacts", "-c", "/custom/config.toml", "config", "show"]);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Show { json: false })
        ));
    }
}
