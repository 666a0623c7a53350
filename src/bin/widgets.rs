// src/bin/widgets.rs

use anyhow::{Result, anyhow};
use clap::Parser;
use colored::*;
use widgets::cli::{Cli, GlobalArgs, handlers};

struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(Vec<String>, &GlobalArgs) -> Result<()>,
}

/// Every command the binary knows. Add an entry here to add a command.
static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "check",
        aliases: &[],
        handler: handlers::check::handle,
    },
    CommandDefinition {
        name: "lex",
        aliases: &["tokens"],
        handler: handlers::lex::handle,
    },
    CommandDefinition {
        name: "list",
        aliases: &["ls"],
        handler: handlers::list::handle,
    },
    CommandDefinition {
        name: "media",
        aliases: &[],
        handler: handlers::media::handle,
    },
    CommandDefinition {
        name: "render",
        aliases: &[],
        handler: handlers::render::handle,
    },
];

fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

fn main() {
    env_logger::init();

    if let Err(e) = run_cli(Cli::parse()) {
        eprintln!("\n{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);

    let Some(name) = cli.command else {
        println!("No command given. Run `widgets --help` to see the available commands.");
        return Ok(());
    };

    let global = GlobalArgs { config: cli.config };
    let command = find_command(&name).ok_or_else(|| {
        let known: Vec<&str> = COMMAND_REGISTRY.iter().map(|cmd| cmd.name).collect();
        anyhow!("Unknown command '{}'. Available: {}", name, known.join(", "))
    })?;
    (command.handler)(cli.args, &global)
}
