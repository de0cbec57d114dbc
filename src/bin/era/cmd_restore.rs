use anyhow::{anyhow, Result};
use std::path::PathBuf;

use era_tools::config::EraConfig;
use era_tools::restore::{restore, RestoreOptions};

pub fn exec(input: Option<PathBuf>, output: Option<PathBuf>, quiet: bool) -> Result<()> {
    let input = input.ok_or_else(|| anyhow!("No input file provided."))?;
    let output = output.ok_or_else(|| anyhow!("No output file provided."))?;

    let opts = RestoreOptions {
        input,
        output,
        quiet,
        config: EraConfig::from_env(),
    };
    restore(&opts)
}
