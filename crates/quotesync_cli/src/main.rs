//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `quotesync_core` linkage.
//! - Print one random quote from a freshly seeded in-memory store.

use quotesync_core::db::open_db_in_memory;
use quotesync_core::{default_log_level, init_logging, QuoteStore, SqliteSnapshotRepository};

fn main() {
    if let Err(err) = init_logging(default_log_level(), None) {
        eprintln!("logging disabled: {err}");
    }

    println!("quotesync_core ping={}", quotesync_core::ping());
    println!("quotesync_core version={}", quotesync_core::core_version());

    let conn = match open_db_in_memory() {
        Ok(conn) => conn,
        Err(err) => {
            eprintln!("failed to open in-memory database: {err}");
            std::process::exit(1);
        }
    };
    let repo = match SqliteSnapshotRepository::try_new(conn) {
        Ok(repo) => repo,
        Err(err) => {
            eprintln!("failed to build repository: {err}");
            std::process::exit(1);
        }
    };
    let store = match QuoteStore::open(repo) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("failed to open quote store: {err}");
            std::process::exit(1);
        }
    };

    match store.random_quote(None) {
        Some(quote) => println!("\"{}\" — {} ({})", quote.text, quote.author, quote.category),
        None => println!("no quotes available"),
    }
}
