//! `contactbook` - A live, sorted and sectioned address book
//!
//! This library keeps a canonical contact list in sync with a document store,
//! filters it by free-text search, and turns it into a flat display sequence
//! with a favorites section followed by one section per initial letter.
//!
//! The pipeline is store snapshot → [`ContactSynchronizer`] →
//! [`filter_contacts`] → [`SectionBuilder`], driven by a [`ContactListView`].
//! Single-record edits go through a [`ContactRepository`].

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod contact;
pub mod error;
pub mod filter;
pub mod logging;
pub mod photo;
pub mod repository;
pub mod sections;
pub mod store;
pub mod sync;
pub mod view;

pub use config::Config;
pub use contact::Contact;
pub use error::{Error, Result};
pub use filter::filter_contacts;
pub use logging::init_logging;
pub use photo::{EncodedPhoto, ImageCodec, JpegBase64Codec};
pub use repository::ContactRepository;
pub use sections::{build_sections, DisplayItem, SectionBuilder};
pub use store::{RawDocument, RemoteStore, SqliteStore, Subscription};
pub use sync::{ContactList, ContactSynchronizer};
pub use view::{ContactListView, DisplayList};
