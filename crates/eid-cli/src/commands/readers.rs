use super::{CommandResult, RunContext};

pub fn cmd_readers(ctx: &RunContext) -> CommandResult {
    let readers = ctx.manager.list_readers()?;

    if readers.is_empty() {
        println!("No readers found");
        return Ok(());
    }

    println!("Found {} reader(s):", readers.len());
    for (i, name) in readers.iter().enumerate() {
        println!("  {}: {}", i, name);
    }
    Ok(())
}
