use anyhow::{anyhow, Result};
use std::path::PathBuf;

use era_tools::check::{check, CheckOptions};
use era_tools::error::EraError;
use era_tools::report::{NestedOutput, Severity};

pub fn exec(input: Option<PathBuf>, quiet: bool, super_block_only: bool, json: bool) -> Result<()> {
    let input = input.ok_or_else(|| anyhow!("No input file provided."))?;

    // текстовый отчёт — в stderr; при --json/-q молчим
    let mut out = NestedOutput::new(std::io::stderr()).quiet(quiet || json);
    let report = check(
        &CheckOptions {
            input,
            super_block_only,
        },
        &mut out,
    )?;

    if json {
        println!("{}", serde_json::to_string(&report)?);
    }
    if report.severity != Severity::NoError {
        return Err(EraError::MetadataDamaged.into());
    }
    Ok(())
}
