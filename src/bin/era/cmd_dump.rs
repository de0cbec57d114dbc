use anyhow::{anyhow, Result};
use std::path::PathBuf;

use era_tools::consts::STDOUT_PATH;
use era_tools::dump::{dump_to, DumpOptions};

pub fn exec(input: Option<PathBuf>, metadata_snapshot: bool, output: Option<String>) -> Result<()> {
    let input = input.ok_or_else(|| anyhow!("No input file provided."))?;
    dump_to(&DumpOptions {
        input,
        output: output.unwrap_or_else(|| STDOUT_PATH.to_string()),
        metadata_snapshot,
    })
}
