use std::error::Error;
use std::path::Path;

use tracing::info;

use super::{CommandResult, RunContext};

pub fn cmd_certs(ctx: &RunContext, output: &Path) -> CommandResult {
    let reader = ctx.reader()?;

    let (standard, qualified) = ctx
        .manager
        .with_session(&reader, |session| -> Result<_, Box<dyn Error>> {
            let mut card = session.eid_card(ctx.profile.clone(), ctx.verbose);
            Ok((card.standard_certificate()?, card.qualified_certificate()?))
        })?;

    std::fs::create_dir_all(output)?;
    for (name, cert) in [("standard", standard), ("qualified", qualified)] {
        match cert {
            Some(der) => {
                let path = output.join(format!("cert_{}.der", name));
                std::fs::write(&path, &der)?;
                info!(path = %path.display(), bytes = der.len(), "Certificate written");
                println!("{} certificate saved to {}", name, path.display());
            }
            None => println!("No {} certificate on card", name),
        }
    }
    Ok(())
}
