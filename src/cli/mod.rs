//! CLI module - Command-line interface for `CloudAlbum`
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// `CloudAlbum` - photo album API server
#[derive(Parser)]
#[command(name = "cloudalbum")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server (default)
    #[command(alias = "web")]
    Serve,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Apply database migrations and exit
    Migrate,

    /// Manage user accounts
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Inspect a user's album
    Photos {
        #[command(subcommand)]
        command: PhotoCommands,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// List all users with their photo counts
    #[command(alias = "ls")]
    List,

    /// Delete a user, their photos and every stored file
    #[command(alias = "rm")]
    Remove {
        /// Email of the account to delete
        email: String,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum PhotoCommands {
    /// List a user's photos, newest first
    #[command(alias = "ls")]
    List {
        /// Owner email
        email: String,
    },
}

pub use commands::*;
