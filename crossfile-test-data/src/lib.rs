//! test data shared between the crossfile crates.
//!
//! Each module pairs hand-laid-out byte streams with the loader program that
//! parses them, so tests across crates agree on the formats they exercise.

/// A version-gated record: later versions carry a trailing bounding box.
///
/// Stream layout (big-endian): `version: u16`, `num_contours: u16`, and for
/// version >= 2 a `bbox: [u16; 4]`.
///
/// Output layout: `version` at 0, `num_contours` at 2, `bbox` at 4 (zeroed
/// for version 1 streams).
pub mod glyph_header {
    use crossfile_vm::{FileLoader, FileLoaderBuilder, Insn, TypeLoaderBuilder};

    /// Output buffer size for one parsed header.
    pub const ALLOC_SIZE: usize = 12;

    #[rustfmt::skip]
    pub static VERSION_1: &[u8] = &[
        0x00, 0x01,             // version 1
        0x00, 0x03,             // numContours 3
    ];

    #[rustfmt::skip]
    pub static VERSION_2: &[u8] = &[
        0x00, 0x02,             // version 2
        0x00, 0x02,             // numContours 2
        0x00, 0x0A,             // xMin 10
        0x00, 0x14,             // yMin 20
        0x00, 0x1E,             // xMax 30
        0x00, 0x28,             // yMax 40
    ];

    /// A version 2 header whose bounding box is cut short.
    #[rustfmt::skip]
    pub static VERSION_2_TRUNCATED: &[u8] = &[
        0x00, 0x02,             // version 2
        0x00, 0x02,             // numContours 2
        0x00, 0x0A,             // xMin 10
                                // remaining bbox words missing
    ];

    /// The loader program for this format.
    ///
    /// The version is read into a register, stored through the loader stack,
    /// and compared against 2 to decide whether the bounding box block runs.
    pub fn file_loader() -> FileLoader {
        let header = TypeLoaderBuilder::new("GlyphHeader", ALLOC_SIZE)
            .doc("Version-gated glyph header record")
            // block 0: fixed fields, then branch on version
            .block([
                Insn::ReadR16 { reg: 0 },
                Insn::PushR16 { reg: 0 },
                Insn::PopM16 { mem_off: 0 },
                Insn::ReadM16 { mem_off: 2 },
                Insn::SetReg { reg: 1, imm: 2 },
                Insn::CmpGe {
                    rres: 2,
                    r1: 0,
                    r2: 1,
                },
                Insn::Ja {
                    reg: 2,
                    block_sel: 1,
                },
                Insn::ExitSuccess,
            ])
            // block 1: version >= 2 only
            .block([
                Insn::ReadA16 {
                    mem_off: 4,
                    elem_count: 4,
                },
                Insn::ExitSuccess,
            ])
            .build();

        let mut builder = FileLoaderBuilder::new();
        let main = builder.add_type_loader(header);
        builder.main_type_loader(main);
        builder.build().unwrap()
    }
}

/// A composite record built from nested loader calls.
///
/// A `Segment` is two `Vec3` values (`start`, `end`), each three
/// little-endian u32 components; the segment loader calls the vec3 loader
/// twice at different output offsets.
pub mod segment {
    use crossfile_vm::{FileLoader, FileLoaderBuilder, Insn, TypeLoaderBuilder};

    /// Output buffer size for one parsed segment (two 12-byte vectors).
    pub const ALLOC_SIZE: usize = 24;

    #[rustfmt::skip]
    pub static STREAM: &[u8] = &[
        0x01, 0x00, 0x00, 0x00, // start.x 1
        0x02, 0x00, 0x00, 0x00, // start.y 2
        0x03, 0x00, 0x00, 0x00, // start.z 3
        0x04, 0x00, 0x00, 0x00, // end.x 4
        0x05, 0x00, 0x00, 0x00, // end.y 5
        0x06, 0x00, 0x00, 0x00, // end.z 6
    ];

    pub fn file_loader() -> FileLoader {
        let mut builder = FileLoaderBuilder::new();

        let vec3 = TypeLoaderBuilder::new("Vec3", 12)
            .block([
                Insn::ReadA32 {
                    mem_off: 0,
                    elem_count: 3,
                },
                Insn::ExitSuccess,
            ])
            .build();
        let vec3_ix = builder.add_type_loader(vec3);

        let segment = TypeLoaderBuilder::new("Segment", ALLOC_SIZE)
            .doc("A line segment between two vectors")
            .block([
                Insn::CallTypeLoader {
                    type_sel: 0,
                    mem_off: 0,
                },
                Insn::CallTypeLoader {
                    type_sel: 0,
                    mem_off: 12,
                },
                Insn::ExitSuccess,
            ])
            .loader_ref(vec3_ix)
            .build();
        let segment_ix = builder.add_type_loader(segment);

        builder.main_type_loader(segment_ix);
        builder.build().unwrap()
    }
}
