//! CLI entry point.
//!
//! # Responsibility
//! - Open the configured database and print the trees a user can read.
//! - Keep output deterministic for quick local sanity checks.

use famtree_core::{
    init_logging_from_config, open_db, open_db_in_memory, CoreConfig, FamilyService, Principal,
    SqliteFamilyRepository,
};
use log::error;
use std::error::Error;
use std::process::ExitCode;

const USAGE: &str = "usage: famtree_cli <config.toml> <username> [--admin]";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config_path, principal) = match parse_args(&args) {
        Some(parsed) => parsed,
        None => {
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
    };

    match run(config_path, &principal) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error error={err}");
            eprintln!("famtree_cli: {err}");
            ExitCode::FAILURE
        }
    }
}

fn parse_args(args: &[String]) -> Option<(&str, Principal)> {
    match args {
        [config, username] => Some((config.as_str(), Principal::user(username.as_str()))),
        [config, username, flag] if flag == "--admin" => {
            Some((config.as_str(), Principal::admin(username.as_str())))
        }
        _ => None,
    }
}

fn run(config_path: &str, principal: &Principal) -> Result<(), Box<dyn Error>> {
    let config = CoreConfig::load(config_path)?;
    init_logging_from_config(&config.logging)?;

    let conn = match &config.db_path {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    let repo = SqliteFamilyRepository::try_new(&conn)?;
    let service = FamilyService::with_policy(repo, &config.policy);

    println!("famtree_core version={}", famtree_core::core_version());
    for tree in service.list_trees(principal)? {
        let members = service.list_members(tree.id, principal)?;
        println!(
            "{}\t{}\t{}\towner={}\tmembers={}",
            tree.id,
            tree.name,
            tree.visibility.as_str(),
            tree.owner,
            members.len()
        );
    }
    Ok(())
}
