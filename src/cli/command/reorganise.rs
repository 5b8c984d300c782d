//! Moves dataset files between directory layouts.

use std::{fs, io, path::Path};

use anyhow::{anyhow, Context as _, Result};
use log::{debug, info};

use super::Context;
use crate::{
    catalog::{
        listing::{list_dir, list_files},
        traverse::{CANONICAL, LEGACY},
        DatasetFileName, Facets, Traversal,
    },
    cli::{create_progress_bar, ReorganiseAction},
    errors::CatalogError,
    report::Report,
};

pub fn reorganise(ctx: &Context, action: ReorganiseAction, dry_run: bool) -> Result<Report> {
    let staging = &ctx.config.paths.staging_root;
    let (levels, target_root) = match action {
        ReorganiseAction::ChangeStructure => (LEGACY, staging.as_path()),
        ReorganiseAction::ToHardDrive => (CANONICAL, ctx.data_root()),
    };

    // gathered up front: moving changes the tree being walked
    let leaves = Traversal::new(staging, levels).collect()?;

    let mut report = Report::new();
    let pb = create_progress_bar(leaves.len() as u64, "Moving datasets".to_string());

    for leaf in &leaves {
        pb.inc(1);

        let label = leaf.relative.display().to_string();
        let Some(facets) = leaf.context.to_facets() else {
            report.fail(label, "incomplete facets");
            continue;
        };

        let target = facets.path(target_root);
        if target == leaf.path {
            report.skip(label, "already in place");
            continue;
        }

        match skip_reason(&leaf.path, &facets) {
            Ok(Some(reason)) => {
                report.skip(label, reason);
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                report.fail(label, e);
                continue;
            }
        }

        info!("Old dir: {}", leaf.path.display());
        info!("New dir: {}", target.display());
        report.record(label, move_contents(&leaf.path, &target, dry_run));
    }
    pb.finish_with_message("Datasets moved");

    Ok(report)
}

/// Why a leaf is left alone, if it is.
///
/// A leaf only counts as a dataset of the walked layout when it holds files
/// whose names start with the variable and domain read from the path.
fn skip_reason(dir: &Path, facets: &Facets) -> Result<Option<&'static str>, CatalogError> {
    if list_dir(dir)?.is_empty() {
        return Ok(Some("empty"));
    }

    let prefix = format!("{}_{}_", facets.variable, facets.domain);
    let fits = list_files(dir)?
        .first()
        .and_then(|name| DatasetFileName::parse(name).ok())
        .is_some_and(|name| name.base.starts_with(&prefix));

    Ok((!fits).then_some("not in this layout"))
}

/// Moves every entry of `from` into `to` and returns how many there were.
fn move_contents(from: &Path, to: &Path, dry_run: bool) -> Result<usize> {
    let entries = list_dir(from)?;
    if dry_run {
        for name in &entries {
            info!("Would move {} to {}", from.join(name).display(), to.display());
        }
        return Ok(entries.len());
    }

    fs::create_dir_all(to).with_context(|| format!("Cannot create {}", to.display()))?;
    for name in &entries {
        let source = from.join(name);
        let target = to.join(name);
        move_entry(&source, &target)
            .with_context(|| format!("Cannot move {} to {}", source.display(), target.display()))?;
    }

    Ok(entries.len())
}

/// Renames `source`, copying files when they live on another filesystem.
fn move_entry(source: &Path, target: &Path) -> Result<()> {
    match fs::rename(source, target) {
        Ok(()) => Ok(()),
        Err(e) if source.is_file() => {
            debug!("Rename failed ({}), copying instead", e);
            fs::copy(source, target)?;
            fs::remove_file(source)?;
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(anyhow!("{} disappeared", source.display())),
        Err(e) => Err(e.into()),
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::*;
    use crate::cli::command::testing::{context, touch};

    const FILE: &str = "pr_EUR-44_MPI-M-MPI-ESM-LR_rcp85_r1i1p1_SMHI-RCA4_v1_mon_200601-201012.nc";

    #[test]
    fn should_change_legacy_structure_to_canonical() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let staging = &ctx.config.paths.staging_root;
        let legacy = staging.join("pr/EUR-44/MPI-M-MPI-ESM-LR/RCA4/mon/rcp85");
        touch(&legacy, &[FILE, ".DS_Store"]);

        let report = reorganise(&ctx, ReorganiseAction::ChangeStructure, false).unwrap();

        assert_eq!(report.completed, 1);
        let moved = staging.join("mon/EUR-44/pr/rcp85/MPI-M-MPI-ESM-LR/RCA4").join(FILE);
        assert!(moved.is_file());
        assert!(!legacy.join(FILE).exists());
        // finder metadata stays behind
        assert!(legacy.join(".DS_Store").exists());
    }

    #[test]
    fn should_leave_files_alone_on_dry_run() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let canonical = ctx
            .config
            .paths
            .staging_root
            .join("mon/EUR-44/pr/rcp85/MPI-M-MPI-ESM-LR/RCA4");
        touch(&canonical, &[FILE]);

        let report = reorganise(&ctx, ReorganiseAction::ToHardDrive, true).unwrap();

        assert_eq!(report.completed, 1);
        assert!(canonical.join(FILE).is_file());
        assert!(!ctx.data_root().exists());
    }

    #[test]
    fn should_move_staging_tree_to_data_root() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let relative = PathBuf::from("mon/EUR-44/pr/rcp85/MPI-M-MPI-ESM-LR/RCA4");
        touch(&ctx.config.paths.staging_root.join(&relative), &[FILE]);

        let report = reorganise(&ctx, ReorganiseAction::ToHardDrive, false).unwrap();

        assert_eq!(report.completed, 1);
        assert!(ctx.data_root().join(&relative).join(FILE).is_file());
    }

    #[test]
    fn should_skip_emptied_legacy_tree_when_moving_to_data_root() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let staging = &ctx.config.paths.staging_root;
        touch(&staging.join("pr/EUR-44/MPI-M-MPI-ESM-LR/RCA4/mon/rcp85"), &[FILE]);

        reorganise(&ctx, ReorganiseAction::ChangeStructure, false).unwrap();
        let report = reorganise(&ctx, ReorganiseAction::ToHardDrive, false).unwrap();

        assert_eq!(report.completed, 1);
        assert_eq!(report.skipped, vec!["pr/EUR-44/MPI-M-MPI-ESM-LR/RCA4/mon/rcp85".to_string()]);
        let moved = ctx.data_root().join("mon/EUR-44/pr/rcp85/MPI-M-MPI-ESM-LR/RCA4").join(FILE);
        assert!(moved.is_file());
        assert!(!ctx.data_root().join("pr").exists());
    }

    #[test]
    fn should_leave_canonical_tree_alone_on_second_change_structure() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let staging = &ctx.config.paths.staging_root;
        touch(&staging.join("pr/EUR-44/MPI-M-MPI-ESM-LR/RCA4/mon/rcp85"), &[FILE]);

        reorganise(&ctx, ReorganiseAction::ChangeStructure, false).unwrap();
        let report = reorganise(&ctx, ReorganiseAction::ChangeStructure, false).unwrap();

        assert_eq!(report.completed, 0);
        assert_eq!(report.skipped.len(), 2);
        let canonical = staging.join("mon/EUR-44/pr/rcp85/MPI-M-MPI-ESM-LR/RCA4").join(FILE);
        assert!(canonical.is_file());
        assert!(!staging.join("MPI-M-MPI-ESM-LR").exists());
    }

    #[test]
    fn should_fail_without_staging_tree() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());

        assert!(reorganise(&ctx, ReorganiseAction::ToHardDrive, false).is_err());
    }
}
