use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use env_logger::{Builder, Env};

mod cli;
mod cmd_check;
mod cmd_dump;
mod cmd_invalidate;
mod cmd_restore;

fn init_logger() {
    // Уровень берём из RUST_LOG, иначе дефолт — info.
    // Пример: RUST_LOG=debug era invalidate ...
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    let cli = match cli::Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help/--version — не ошибка; всё остальное — код 1
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    if let Err(e) = run(cli) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: cli::Cli) -> Result<()> {
    match cli.cmd {
        cli::Cmd::Invalidate {
            written_since,
            metadata_snapshot,
            output,
            input,
        } => cmd_invalidate::exec(input, written_since, metadata_snapshot, output),

        cli::Cmd::Restore {
            input,
            output,
            quiet,
        } => cmd_restore::exec(input, output, quiet),

        cli::Cmd::Dump {
            metadata_snapshot,
            output,
            input,
        } => cmd_dump::exec(input, metadata_snapshot, output),

        cli::Cmd::Check {
            quiet,
            super_block_only,
            json,
            input,
        } => cmd_check::exec(input, quiet, super_block_only, json),
    }
}
