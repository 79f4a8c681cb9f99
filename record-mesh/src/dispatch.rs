//! Executes decoded operations against the worker's record store.

use anyhow::Result;

use crate::protocol::{Operation, Reply};
use crate::store::RecordStore;

pub const HELP_TEXT: &str = "Available commands:\n  \
    read count         -> number of records\n  \
    read all           -> list every name\n  \
    write <name>       -> register a new name\n  \
    help               -> this help";

/// Decodes `line` and executes it.
///
/// Malformed input still yields a reply; only a store failure is an `Err`,
/// and the worker treats that as fatal.
pub fn handle_line(store: &mut RecordStore, line: &str) -> Result<Reply> {
    match Operation::decode(line) {
        Ok(operation) => execute(store, operation),
        Err(rejection) => Ok(rejection.reply()),
    }
}

/// Runs one operation. Only `Write` with at least one field mutates the store,
/// and it performs exactly one insert.
pub fn execute(store: &mut RecordStore, operation: Operation) -> Result<Reply> {
    let reply = match operation {
        Operation::Help => Reply::Ok(HELP_TEXT.to_string()),
        Operation::Read { key } => match key.as_str() {
            "count" => Reply::Ok(format!("Total users: {}", store.count())),
            "all" => {
                let names = store.list_all();
                if names.is_empty() {
                    Reply::Ok("No users registered.".to_string())
                } else {
                    Reply::Ok(names.join("\n"))
                }
            }
            _ => Reply::Error("Unknown READ subcommand (use count or all).".to_string()),
        },
        Operation::Write { fields } => {
            if fields.is_empty() {
                return Ok(Reply::Error("User name not specified.".to_string()));
            }
            let name = fields.join(" ");
            store.insert(&name)?;
            Reply::Ok(format!("User \"{name}\" registered successfully!"))
        }
    };
    Ok(reply)
}
