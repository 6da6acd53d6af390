use casebox_db::{Database, DbConfig};
use std::process::ExitCode;

/// Options file looked up in the home directory.
const OPTIONS_FILE: &str = ".casebox_db.json";

fn main() -> ExitCode {
    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: casebox_db <dir-or-file>");
        return ExitCode::from(2);
    };

    let config = match DbConfig::from_home(OPTIONS_FILE) {
        Ok((_, config)) => config,
        Err(e) => {
            eprintln!("bad options file: {e}");
            return ExitCode::from(2);
        }
    };

    let mut db = match Database::open(&path, config) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("{path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    for table in db.tables() {
        if table.is_ok() {
            println!("{:<24} ok    {}", table.name(), table.jbox().cases().join(", "));
        } else {
            println!("{:<24} FAIL  {}", table.name(), table.load_error().unwrap_or("?"));
        }
    }

    if db.valid_schema() {
        println!("valid");
        ExitCode::SUCCESS
    } else {
        println!("{}", db.message());
        ExitCode::FAILURE
    }
}
