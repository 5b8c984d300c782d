//! Renames daily-period file names to the monthly form.

use std::{fs, path::Path};

use anyhow::{bail, Result};
use log::{debug, info};

use crate::{
    catalog::{listing::list_files, DatasetFileName},
    report::Report,
};

/// Renames every `YYYYMMDD-YYYYMMDD` file of `dir` to `YYYYMM-YYYYMM`.
///
/// Monthly names are left untouched and names outside the scheme are
/// recorded as failures.
pub fn fix_month_format(dir: &Path, dry_run: bool) -> Result<Report> {
    let mut report = Report::new();

    for name in list_files(dir)? {
        let parsed = match DatasetFileName::parse(&name) {
            Ok(parsed) => parsed,
            Err(e) => {
                report.fail(name, e);
                continue;
            }
        };

        if !parsed.is_daily() {
            debug!("{} is already monthly", name);
            continue;
        }

        let renamed = parsed.to_monthly().to_string();
        info!("Renaming {} to {}", name, renamed);
        let result = if dry_run {
            Ok(())
        } else {
            rename(dir, &name, &renamed)
        };
        report.record(name, result);
    }

    Ok(report)
}

fn rename(dir: &Path, from: &str, to: &str) -> Result<()> {
    let target = dir.join(to);
    if target.exists() {
        bail!("{} already exists", target.display());
    }
    fs::rename(dir.join(from), target)?;

    Ok(())
}

// -- Tests -------------------------------------------------------------------
