use anyhow::{anyhow, Result};
use std::path::PathBuf;

use era_tools::config::EraConfig;
use era_tools::consts::STDOUT_PATH;
use era_tools::invalidate::{invalidate, InvalidateOptions};
use era_tools::report::NestedOutput;

pub fn exec(
    input: Option<PathBuf>,
    written_since: Option<u32>,
    metadata_snapshot: bool,
    output: Option<String>,
) -> Result<()> {
    let input = input.ok_or_else(|| anyhow!("No input file provided."))?;
    let written_since = written_since.ok_or_else(|| anyhow!("Please specify --written-since"))?;
    let cfg = EraConfig::from_env();

    let opts = InvalidateOptions {
        input,
        output: output.unwrap_or_else(|| STDOUT_PATH.to_string()),
        written_since,
        metadata_snapshot,
        strict: cfg.strict_invalidate,
    };
    let mut diag = NestedOutput::new(std::io::stderr());
    invalidate(&opts, &mut diag)?;
    Ok(())
}
