//! End-to-end execution tests against the shared fixture formats.

use crossfile_test_data::{glyph_header, segment};
use crossfile_vm::{types::ByteOrder, FaultKind, MemoryStream, OutputBuffer, Vm};
use pretty_assertions::assert_eq;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn parse(bytes: &[u8], order: ByteOrder, file_loader: &crossfile_vm::FileLoader) -> OutputBuffer {
    let mut stream = MemoryStream::new(bytes, order);
    Vm::new()
        .exec_file_loader(file_loader, &mut stream)
        .unwrap()
}

#[test]
fn glyph_header_version_1() {
    init_logging();
    let output = parse(
        glyph_header::VERSION_1,
        ByteOrder::BigEndian,
        &glyph_header::file_loader(),
    );
    assert_eq!(output.as_bytes().len(), glyph_header::ALLOC_SIZE);
    assert_eq!(output.read::<u16>(0), Some(1)); // version
    assert_eq!(output.read::<u16>(2), Some(3)); // numContours
                                                // no bbox in version 1
    assert_eq!(&output.as_bytes()[4..], &[0u8; 8]);
}

#[test]
fn glyph_header_version_2() {
    init_logging();
    let output = parse(
        glyph_header::VERSION_2,
        ByteOrder::BigEndian,
        &glyph_header::file_loader(),
    );
    assert_eq!(output.read::<u16>(0), Some(2));
    assert_eq!(output.read::<u16>(2), Some(2));
    assert_eq!(output.read::<u16>(4), Some(10));
    assert_eq!(output.read::<u16>(6), Some(20));
    assert_eq!(output.read::<u16>(8), Some(30));
    assert_eq!(output.read::<u16>(10), Some(40));
}

#[test]
fn glyph_header_truncated_bbox() {
    init_logging();
    let file_loader = glyph_header::file_loader();
    let mut stream = MemoryStream::new(glyph_header::VERSION_2_TRUNCATED, ByteOrder::BigEndian);
    let err = Vm::new()
        .exec_file_loader(&file_loader, &mut stream)
        .unwrap_err();
    assert_eq!(err.kind, FaultKind::InsufficientData);
}

#[test]
fn glyph_header_every_truncation_faults() {
    init_logging();
    let file_loader = glyph_header::file_loader();
    for len in 0..glyph_header::VERSION_2.len() {
        let mut stream =
            MemoryStream::new(&glyph_header::VERSION_2[..len], ByteOrder::BigEndian);
        let err = Vm::new()
            .exec_file_loader(&file_loader, &mut stream)
            .expect_err("truncated prefix should not parse");
        assert_eq!(err.kind, FaultKind::InsufficientData, "prefix len {len}");
    }
}

#[test]
fn segment_nested_calls() {
    init_logging();
    let output = parse(
        segment::STREAM,
        ByteOrder::LittleEndian,
        &segment::file_loader(),
    );
    assert_eq!(output.as_bytes().len(), segment::ALLOC_SIZE);
    for (i, expected) in (1u32..=6).enumerate() {
        assert_eq!(output.read::<u32>(i * 4), Some(expected));
    }
}

#[test]
fn segment_every_truncation_faults() {
    init_logging();
    let file_loader = segment::file_loader();
    for len in 0..segment::STREAM.len() {
        let mut stream = MemoryStream::new(&segment::STREAM[..len], ByteOrder::LittleEndian);
        let err = Vm::new()
            .exec_file_loader(&file_loader, &mut stream)
            .expect_err("truncated prefix should not parse");
        assert_eq!(err.kind, FaultKind::InsufficientData, "prefix len {len}");
    }
}

#[test]
fn repeat_runs_are_identical() {
    init_logging();
    let file_loader = glyph_header::file_loader();
    let first = parse(
        glyph_header::VERSION_2,
        ByteOrder::BigEndian,
        &file_loader,
    );
    let second = parse(
        glyph_header::VERSION_2,
        ByteOrder::BigEndian,
        &file_loader,
    );
    assert_eq!(first.as_bytes(), second.as_bytes());
}

#[test]
fn standalone_type_loader_into_region() {
    init_logging();
    // the vec3 loader is arena entry 0 of the segment file loader
    let file_loader = segment::file_loader();
    let mut region = [0u8; 12];
    let mut stream = MemoryStream::new(segment::STREAM, ByteOrder::LittleEndian);
    Vm::new()
        .exec_type_loader(&file_loader, 0, &mut stream, &mut region)
        .unwrap();
    assert_eq!(u32::from_ne_bytes(region[0..4].try_into().unwrap()), 1);
    assert_eq!(u32::from_ne_bytes(region[4..8].try_into().unwrap()), 2);
    assert_eq!(u32::from_ne_bytes(region[8..12].try_into().unwrap()), 3);
}
