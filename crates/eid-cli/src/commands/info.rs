use eid_card::CardData;
use eid_common::RecordFile;

use crate::formatters::{self, FormatMode};

use super::{CommandResult, RunContext};

pub fn cmd_info(ctx: &RunContext) -> CommandResult {
    let reader = ctx.reader()?;

    ctx.manager.with_session(&reader, |session| -> CommandResult {
        let mut card = session.eid_card(ctx.profile.clone(), ctx.verbose);
        let data = card.read_card_data()?;

        println!("Reader: {}", session.reader());
        println!("ATR: {}", hex::encode_upper(session.atr()));
        print_card_data(&data, ctx.format);
        Ok(())
    })
}

fn print_card_data(data: &CardData, mode: FormatMode) {
    println!("\n=== Card Header ({}) ===\n", mode.description());
    println!("  GET DATA 0101: {}", hex::encode_upper(&data.header));
    if let Some(number) = formatters::printed_number(&data.header) {
        println!("  Printed Number: {}", number);
    }

    let sections = [
        ("Document", RecordFile::Document, &data.document),
        ("Personal", RecordFile::Personal, &data.personal),
        ("Residence", RecordFile::Residence, &data.residence),
    ];
    for (title, file, records) in sections {
        println!("\n=== {} ===\n", title);
        for line in formatters::format_records(file, records, mode) {
            println!("{}", line);
        }
    }

    if mode == FormatMode::Human {
        let address = formatters::format_address(&data.residence);
        if !address.is_empty() {
            println!("\n  Address: {}", address);
        }
    }
}
