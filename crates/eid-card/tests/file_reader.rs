//! FileReader against an in-memory card

mod common;

use common::{plain_file, FakeCard};
use eid_card::file::MAX_READ_WINDOW;
use eid_card::{CardError, CardVariant, FileReader, OuterAidLayout, PcscError, Transport};
use proptest::prelude::*;

const DOCUMENT: [u8; 2] = [0x0F, 0x02];

fn plain_reader(card: &mut FakeCard) -> FileReader<&mut FakeCard> {
    FileReader::new(Transport::new(card), CardVariant::Plain)
}

#[test]
fn test_single_window_after_header() {
    let mut file = vec![0x01, 0x00, 0x00, 0x00, 0x20, 0x00];
    file.extend((0..0x20).map(|i| i as u8));
    let mut card = FakeCard::new().with_file(&DOCUMENT, file.clone());

    let read = plain_reader(&mut card).read_file(&DOCUMENT).unwrap();

    assert_eq!(read.header, file[..6].to_vec());
    assert_eq!(read.body, file[6..].to_vec());
    assert_eq!(read.header.len() + read.body.len(), 0x20 + 6);
    assert_eq!(
        card.commands,
        vec![
            vec![0x00, 0xA4, 0x08, 0x00, 0x02, 0x0F, 0x02, 0x01],
            vec![0x00, 0xB0, 0x00, 0x00, 0x06],
            vec![0x00, 0xB0, 0x00, 0x06, 0x20],
        ]
    );
}

#[test]
fn test_scenario_header_length_field() {
    // Header length field 0x0020 gives a 44-byte file: one 38-byte window at 6
    let mut file = vec![0x01, 0x00, 0x00, 0x00, 0x20, 0x00];
    file.extend(std::iter::repeat(0xAB).take(38));
    let mut card = FakeCard::new().with_file(&DOCUMENT, file);

    let read = plain_reader(&mut card).read_file(&DOCUMENT).unwrap();

    assert_eq!(card.reads(), vec![(0, 6), (6, 38)]);
    assert_eq!(read.body.len(), 38);
}

#[test]
fn test_large_file_uses_255_byte_windows() {
    let body: Vec<u8> = (0..600u32).map(|i| (i % 251) as u8).collect();
    let mut card = FakeCard::new().with_file(&DOCUMENT, plain_file(&body));

    let read = plain_reader(&mut card).read_file(&DOCUMENT).unwrap();

    assert_eq!(read.body, body);
    assert_eq!(card.reads(), vec![(0, 6), (6, 255), (261, 255), (516, 90)]);
}

#[test]
fn test_all_ff_header_is_empty_file() {
    let mut file = vec![0xFF; 6];
    file.extend_from_slice(&[0x01, 0x02, 0x03]);
    let mut card = FakeCard::new().with_file(&DOCUMENT, file);

    let read = plain_reader(&mut card).read_file(&DOCUMENT).unwrap();

    assert!(read.is_empty());
    assert_eq!(read.header, vec![0xFF; 6]);
    assert_eq!(card.reads(), vec![(0, 6)]);
}

#[test]
fn test_short_header_is_error() {
    let mut card = FakeCard::new().with_file(&DOCUMENT, vec![0x01, 0x00, 0x00]);

    let err = plain_reader(&mut card).read_file(&DOCUMENT).unwrap_err();

    assert!(matches!(
        err,
        CardError::HeaderRead {
            got: 3,
            expected: 6,
            ..
        }
    ));
    assert_eq!(card.reads(), vec![(0, 6)]);
}

#[test]
fn test_missing_file_reports_status() {
    let mut card = FakeCard::new();

    let err = plain_reader(&mut card).read_file(&DOCUMENT).unwrap_err();

    assert!(matches!(
        err,
        CardError::CardStatus {
            status_word: 0x6A82
        }
    ));
    assert!(err.is_file_not_found());
    assert!(card.reads().is_empty());
}

#[test]
fn test_transport_failure_propagates() {
    let mut card = FakeCard::new().with_file(&DOCUMENT, plain_file(b"abc"));
    card.fail_with = Some(PcscError::RemovedCard);

    let err = plain_reader(&mut card).read_file(&DOCUMENT).unwrap_err();

    assert!(matches!(err, CardError::Transport(PcscError::RemovedCard)));
    assert_eq!(card.commands.len(), 1);
}

#[test]
fn test_outer_aid_strips_framing() {
    let mut file = vec![0x0F, 0x02, 0x05, 0x00];
    file.extend_from_slice(b"hello");
    file.extend_from_slice(&[0x00, 0x00, 0x00]);
    let mut card = FakeCard::outer_aid().with_file(&DOCUMENT, file);

    let variant = CardVariant::OuterAid(OuterAidLayout::default());
    let read = FileReader::new(Transport::new(&mut card), variant)
        .read_file(&DOCUMENT)
        .unwrap();

    assert_eq!(read.header, vec![0x0F, 0x02, 0x05, 0x00]);
    assert_eq!(read.body, b"hello".to_vec());
    assert_eq!(card.commands[0], vec![0x00, 0xA4, 0x08, 0x00, 0x02, 0x0F, 0x02, 0x04]);
    assert_eq!(card.reads(), vec![(0, 12)]);
}

#[test]
fn test_outer_aid_inner_tag() {
    let mut file = vec![0xA0, 0x00, 0x07, 0x00, 0xB0, 0x00, 0x03, 0x00];
    file.extend_from_slice(b"xyz");
    let mut card = FakeCard::outer_aid().with_file(&DOCUMENT, file);

    let variant = CardVariant::OuterAid(OuterAidLayout {
        strip_inner_tag: true,
        ..OuterAidLayout::default()
    });
    let read = FileReader::new(Transport::new(&mut card), variant)
        .read_file(&DOCUMENT)
        .unwrap();

    assert_eq!(read.header.len(), 8);
    assert_eq!(read.body, b"xyz".to_vec());
}

#[test]
fn test_outer_aid_adjusts_first_chunk_only() {
    let content: Vec<u8> = (0..400u32).map(|i| (i % 200) as u8).collect();
    let [lo, hi] = (content.len() as u16).to_le_bytes();
    let mut file = vec![0x0F, 0x02, lo, hi];
    file.extend_from_slice(&content);
    let mut card = FakeCard::outer_aid().with_file(&DOCUMENT, file);

    let variant = CardVariant::OuterAid(OuterAidLayout::default());
    let read = FileReader::new(Transport::new(&mut card), variant)
        .read_file(&DOCUMENT)
        .unwrap();

    assert_eq!(read.body, content);
    assert_eq!(card.reads(), vec![(0, 255), (255, 149)]);
}

#[test]
fn test_outer_aid_empty_file() {
    let mut card = FakeCard::outer_aid().with_file(&DOCUMENT, Vec::new());

    let variant = CardVariant::OuterAid(OuterAidLayout::default());
    let read = FileReader::new(Transport::new(&mut card), variant)
        .read_file(&DOCUMENT)
        .unwrap();

    assert!(read.is_empty());
    assert!(card.reads().is_empty());
}

#[test]
fn test_path_longer_than_short_apdu_rejected() {
    let path = vec![0x3F; 300];
    let mut card = FakeCard::new().with_file(&path, plain_file(b"unreachable"));

    let err = plain_reader(&mut card).read_file(&path).unwrap_err();

    assert!(matches!(err, CardError::CommandDataTooLong(300)));
    assert!(card.commands.is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn windows_never_exceed_255(len in 0usize..=0xFFFF) {
        let body: Vec<u8> = (0..len).map(|i| (i % 253) as u8).collect();
        let mut card = FakeCard::new().with_file(&DOCUMENT, plain_file(&body));

        let read = plain_reader(&mut card).read_file(&DOCUMENT).unwrap();

        prop_assert_eq!(read.header.len() + read.body.len(), len + 6);
        prop_assert_eq!(read.body, body);

        let reads = card.reads();
        prop_assert!(reads.iter().all(|&(_, n)| n <= MAX_READ_WINDOW));

        let mut expected_offset = 0;
        for (offset, n) in reads {
            prop_assert_eq!(offset, expected_offset);
            expected_offset += n;
        }
        prop_assert_eq!(expected_offset, len + 6);
    }
}
