use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};

use eid_card::CardFile;
use eid_common::dump_file_name;
use tracing::{info, warn};

use super::{CommandResult, RunContext};

pub fn cmd_dump(ctx: &RunContext, output: &Path) -> CommandResult {
    let reader = ctx.reader()?;
    std::fs::create_dir_all(output)?;

    let written = ctx
        .manager
        .with_session(&reader, |session| -> Result<usize, Box<dyn Error>> {
            let mut card = session.eid_card(ctx.profile.clone(), ctx.verbose);
            let mut written = 0;

            for (name, path) in ctx.profile.files.all() {
                match card.read_raw(path) {
                    Ok(file) => {
                        let target = write_dump(output, &file)?;
                        info!(file = name, path = %target.display(), "Dumped");
                        written += 1;
                    }
                    // Card refused this file; keep going with the rest
                    Err(err) if err.status_word().is_some() => {
                        warn!(
                            file = name,
                            path = %hex::encode_upper(path),
                            error = %err,
                            "Skipping file"
                        );
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            Ok(written)
        })?;

    println!("Dumped {} file(s) to {}", written, output.display());
    Ok(())
}

/// Write header and body of `file` to `dir` under its dump name
pub fn write_dump(dir: &Path, file: &CardFile) -> io::Result<PathBuf> {
    let target = dir.join(dump_file_name(&file.path));
    std::fs::write(&target, file.raw())?;
    Ok(target)
}
