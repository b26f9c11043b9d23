use std::error::Error;
use std::path::{Path, PathBuf};

use eid_common::fields::personal;
use eid_common::{field_text, FieldRecord};
use tracing::info;

use super::{CommandResult, RunContext};

const FALLBACK_NAME: &str = "photo.jpg";

pub fn cmd_photo(ctx: &RunContext, output: Option<&Path>) -> CommandResult {
    let reader = ctx.reader()?;

    let (path, jpeg) = ctx
        .manager
        .with_session(&reader, |session| -> Result<_, Box<dyn Error>> {
            let mut card = session.eid_card(ctx.profile.clone(), ctx.verbose);
            let path = match output {
                Some(path) => path.to_path_buf(),
                None => default_photo_path(&card.personal()?),
            };
            Ok((path, card.photo()?))
        })?;

    if jpeg.is_empty() {
        println!("Card holds no photo");
        return Ok(());
    }

    std::fs::write(&path, &jpeg)?;
    info!(path = %path.display(), bytes = jpeg.len(), "Photo written");
    println!("Photo saved to {}", path.display());
    Ok(())
}

/// `<personal number>.jpg`, or `photo.jpg` when the card has no usable number
pub fn default_photo_path(records: &[FieldRecord]) -> PathBuf {
    let number = records
        .iter()
        .find(|r| r.id == personal::PERSONAL_NUMBER)
        .map(|r| field_text(&r.value))
        .filter(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_alphanumeric()));

    match number {
        Some(number) => PathBuf::from(format!("{}.jpg", number)),
        None => PathBuf::from(FALLBACK_NAME),
    }
}
