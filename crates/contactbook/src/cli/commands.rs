//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Subcommand};

use crate::contact::Contact;

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Only show contacts whose name or phone number contains this text
    pub query: Option<String>,

    /// Only show contacts marked with the `isFavorite` field
    #[arg(short, long)]
    pub favorites: bool,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Watch command arguments.
#[derive(Debug, Args)]
pub struct WatchCommand {
    /// Only show contacts whose name or phone number contains this text
    pub query: Option<String>,

    /// Print each update as one line of JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Show command arguments.
#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Contact id
    pub id: String,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Editable contact fields.
///
/// Fields that are not given are left as they are. An empty value clears the
/// field.
#[derive(Debug, Default, Args)]
pub struct ContactFields {
    /// First name
    #[arg(long)]
    pub first: Option<String>,

    /// Last name
    #[arg(long)]
    pub last: Option<String>,

    /// Phone number
    #[arg(long)]
    pub phone: Option<String>,

    /// Email address
    #[arg(long)]
    pub email: Option<String>,

    /// Web address
    #[arg(long)]
    pub url: Option<String>,

    /// Postal address
    #[arg(long)]
    pub address: Option<String>,

    /// Notes
    #[arg(long)]
    pub notes: Option<String>,

    /// Birthday (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub birthday: Option<NaiveDate>,

    /// Pin to the highlights section (`--favorite false` to unpin)
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub favorite: Option<bool>,

    /// Remove the stored photo
    #[arg(long)]
    pub clear_photo: bool,
}

impl ContactFields {
    /// Apply the given fields to a contact.
    pub fn apply_to(&self, contact: &mut Contact) {
        let text_fields = [
            (&self.first, &mut contact.first_name),
            (&self.last, &mut contact.last_name),
            (&self.phone, &mut contact.phone_number),
            (&self.email, &mut contact.email),
            (&self.url, &mut contact.url),
            (&self.address, &mut contact.address),
            (&self.notes, &mut contact.notes),
        ];
        for (value, field) in text_fields {
            if let Some(value) = value {
                *field = Some(value.clone());
            }
        }
        if let Some(birthday) = self.birthday {
            contact.birthday = Some(birthday);
        }
        if let Some(favorite) = self.favorite {
            contact.favorite = favorite;
        }
        if self.clear_photo {
            contact.photo = None;
        }
    }
}

/// Add command arguments.
#[derive(Debug, Args)]
pub struct AddCommand {
    /// Contact fields
    #[command(flatten)]
    pub fields: ContactFields,

    /// Photo file to attach
    #[arg(long, value_name = "FILE")]
    pub photo: Option<PathBuf>,
}

/// Edit command arguments.
#[derive(Debug, Args)]
pub struct EditCommand {
    /// Contact id
    pub id: String,

    /// Fields to change
    #[command(flatten)]
    pub fields: ContactFields,
}

/// Photo command arguments.
#[derive(Debug, Args)]
pub struct PhotoCommand {
    /// Contact id
    pub id: String,

    /// Image file (PNG or JPEG)
    pub file: PathBuf,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
