//! Byte level parser for status frames.
//!
//! Fields are separated by commas. A colon closes the current field *and* the current register,
//! with the next register's tag following immediately as an ordinary field. Only the line feed
//! after the last expected register ends a frame; a line feed anywhere else is field content.
//!
//! Where each register starts and which firmware generation produced the frame is learned from
//! the first frame that parses successfully, and is never revisited afterwards.

use crate::schema::{Firmware, Register, Schema};
use strum::EnumCount as _;
use tracing::{debug, info, trace};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("response does not start with the status prefix (got `{0}`)")]
    Framing(String),
    #[error(
        "frame is incomplete ({registers} of {min_registers} registers, {fields} of {min_fields} fields)"
    )]
    Incomplete { registers: usize, min_registers: usize, fields: usize, min_fields: usize },
    #[error("{} register(s) had fewer fields than expected", .0.len())]
    Deficient(Vec<Deficiency>),
}

/// A register that closed with fewer fields than the schema requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deficiency {
    /// Position of the register in wire order.
    pub index: usize,
    pub fields: usize,
    pub minimum: usize,
}

/// Register base indices and firmware generation, as discovered from the first good frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    bases: [Option<usize>; Register::COUNT],
    firmware: Firmware,
    major_version: Option<u32>,
}

impl Layout {
    fn empty() -> Self {
        Self { bases: [None; Register::COUNT], firmware: Firmware::Legacy, major_version: None }
    }

    /// Index of the register's tag within the frame, if the register is present.
    pub fn base(&self, register: Register) -> Option<usize> {
        self.bases[register as usize]
    }

    pub fn firmware(&self) -> Firmware {
        self.firmware
    }

    pub fn major_version(&self) -> Option<u32> {
        self.major_version
    }
}

/// A successfully parsed status frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// All fields, starting with the prefix. The unreliable final field is not included.
    pub fields: Vec<String>,
    pub layout: Layout,
    /// Field count of every register, in wire order.
    pub register_sizes: Vec<usize>,
}

impl Frame {
    /// The field at `offset` past the register's tag.
    ///
    /// `None` if the register is absent or this frame's copy of it is too short to have the
    /// field.
    pub fn field(&self, register: Register, offset: usize) -> Option<&str> {
        let base = self.layout.base(register)?;
        let index = base + offset;
        if index >= self.register_end(base) {
            return None;
        }
        self.fields.get(index).map(String::as_str)
    }

    /// One past the last field of the register that holds the field at `index`.
    fn register_end(&self, index: usize) -> usize {
        // Registers follow the prefix back to back.
        let mut end = 1;
        for size in &self.register_sizes {
            end += size;
            if index < end {
                return end;
            }
        }
        self.fields.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Continue,
    Complete,
}

pub struct ResponseParser {
    schema: &'static Schema,
    layout: Option<Layout>,
}

impl ResponseParser {
    pub fn new(schema: &'static Schema) -> Self {
        Self { schema, layout: None }
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    /// The frozen layout, once a frame has parsed successfully.
    pub fn layout(&self) -> Option<&Layout> {
        self.layout.as_ref()
    }

    /// Start scanning the response to a status request.
    pub fn begin(&self) -> FrameScan {
        FrameScan {
            schema: self.schema,
            discovering: self.layout.is_none(),
            layout: self.layout.unwrap_or_else(Layout::empty),
            started: false,
            complete: false,
            current: Vec::new(),
            fields: Vec::new(),
            register: 0,
            register_fields: 0,
            register_sizes: Vec::new(),
            deficiencies: Vec::new(),
            raw: Vec::new(),
        }
    }

    /// Validate a finished scan. The layout is committed if this is the first good frame.
    pub fn finish(&mut self, scan: FrameScan) -> Result<Frame, ParseError> {
        if !scan.started {
            return Err(ParseError::Framing(String::from_utf8_lossy(&scan.current).into_owned()));
        }
        let thresholds = self.schema.thresholds(scan.layout.firmware);
        let registers = scan.register_sizes.len();
        let fields = scan.fields.len();
        debug!(
            message = "frame scanned",
            registers,
            fields,
            deficiencies = scan.deficiencies.len(),
            complete = scan.complete
        );
        let incomplete = ParseError::Incomplete {
            registers,
            min_registers: thresholds.registers,
            fields,
            min_fields: thresholds.fields,
        };
        if registers < thresholds.registers {
            return Err(incomplete);
        }
        if !scan.deficiencies.is_empty() {
            return Err(ParseError::Deficient(scan.deficiencies));
        }
        if fields < thresholds.fields {
            return Err(incomplete);
        }
        if self.layout.is_none() {
            info!(
                message = "discovered frame layout",
                firmware = ?scan.layout.firmware,
                major_version = ?scan.layout.major_version,
                bases = ?scan.layout.bases
            );
            self.layout = Some(scan.layout);
        }
        Ok(Frame { fields: scan.fields, layout: scan.layout, register_sizes: scan.register_sizes })
    }

    /// Scan a complete response held in memory.
    pub fn parse(&mut self, bytes: &[u8]) -> Result<Frame, ParseError> {
        let mut scan = self.begin();
        for &byte in bytes {
            if scan.push(byte)? == Progress::Complete {
                break;
            }
        }
        self.finish(scan)
    }
}

/// State of a frame being read byte by byte.
pub struct FrameScan {
    schema: &'static Schema,
    discovering: bool,
    layout: Layout,
    started: bool,
    complete: bool,
    current: Vec<u8>,
    fields: Vec<String>,
    register: usize,
    register_fields: usize,
    register_sizes: Vec<usize>,
    deficiencies: Vec<Deficiency>,
    raw: Vec<u8>,
}

impl FrameScan {
    pub fn push(&mut self, byte: u8) -> Result<Progress, ParseError> {
        if self.complete {
            return Ok(Progress::Complete);
        }
        self.raw.push(byte);
        if !self.started {
            return self.push_prefix(byte);
        }
        match byte {
            b',' => self.close_field(),
            b':' if !self.current.is_empty() => {
                self.close_field();
                self.close_register();
            }
            b'\n' if self.register >= self.last_register() => {
                self.close_register();
                self.complete = true;
                return Ok(Progress::Complete);
            }
            _ => self.current.push(byte),
        }
        if self.fields.len() >= self.schema.max_fields {
            debug!(message = "field limit reached", limit = self.schema.max_fields);
            self.complete = true;
            return Ok(Progress::Complete);
        }
        Ok(Progress::Continue)
    }

    fn push_prefix(&mut self, byte: u8) -> Result<Progress, ParseError> {
        let prefix = self.schema.prefix.as_bytes();
        if byte == b',' && self.current == prefix {
            self.current.clear();
            self.fields.push(self.schema.prefix.to_string());
            self.started = true;
            return Ok(Progress::Continue);
        }
        self.current.push(byte);
        if !prefix.starts_with(&self.current) {
            return Err(ParseError::Framing(String::from_utf8_lossy(&self.current).into_owned()));
        }
        Ok(Progress::Continue)
    }

    fn last_register(&self) -> usize {
        self.schema.thresholds(self.layout.firmware).registers.saturating_sub(1)
    }

    fn close_field(&mut self) {
        let field = String::from_utf8_lossy(&self.current).into_owned();
        self.current.clear();
        let index = self.fields.len();
        if self.discovering {
            self.discover(index, &field);
        }
        self.fields.push(field);
        self.register_fields += 1;
    }

    fn discover(&mut self, index: usize, field: &str) {
        if let Some(register) = self.schema.is_tag(field) {
            let base = &mut self.layout.bases[register as usize];
            if base.is_none() {
                trace!(message = "found register tag", %register, index);
                *base = Some(index);
            }
        }
        if let Some((register, offset)) = self.schema.version_field {
            if self.layout.base(register).map(|base| base + offset) == Some(index) {
                let (firmware, major) = Firmware::classify(field);
                debug!(message = "firmware version", version = field, ?firmware);
                self.layout.firmware = firmware;
                self.layout.major_version = major;
            }
        }
    }

    fn close_register(&mut self) {
        let fields = std::mem::take(&mut self.register_fields);
        if let Some(minimum) = self.schema.min_fields(self.register) {
            if fields < minimum {
                debug!(message = "register is short", index = self.register, fields, minimum);
                self.deficiencies.push(Deficiency { index: self.register, fields, minimum });
            }
        }
        self.register_sizes.push(fields);
        self.register += 1;
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Everything received for this frame followed by `trailing`, for diagnostics.
    pub fn capture(&self, trailing: &[u8]) -> String {
        let mut raw = String::from_utf8_lossy(&self.raw).into_owned();
        raw.push_str(&String::from_utf8_lossy(trailing));
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::FrameBuilder;
    use crate::schema::{RegisterSpec, SPANET, Thresholds};

    static TINY: Schema = Schema {
        prefix: "RF:",
        registers: &[
            RegisterSpec { register: Register::R2, min_fields: 4 },
            RegisterSpec { register: Register::R3, min_fields: 3 },
        ],
        legacy: Thresholds { registers: 2, fields: 8 },
        current: Thresholds { registers: 2, fields: 8 },
        version_field: None,
        max_fields: 300,
    };

    #[test]
    fn minimal_frame() {
        let mut parser = ResponseParser::new(&TINY);
        let frame = parser.parse(b"RF:,12,R2,1,2,3:R3,a,b,:\r\n").unwrap();
        assert_eq!(frame.fields, ["RF:", "12", "R2", "1", "2", "3", "R3", "a", "b"]);
        assert_eq!(frame.register_sizes, [5, 3]);
        assert_eq!(frame.layout.base(Register::R2), Some(2));
        assert_eq!(frame.layout.base(Register::R3), Some(6));
        assert_eq!(frame.field(Register::R2, 1), Some("1"));
        assert_eq!(frame.field(Register::R3, 2), Some("b"));
        assert_eq!(frame.field(Register::R3, 3), None);
        assert_eq!(frame.field(Register::RG, 1), None);
    }

    #[test]
    fn fields_past_a_short_register_are_absent() {
        let mut parser = ResponseParser::new(&TINY);
        parser.parse(b"RF:,12,R2,1,2,3:R3,a,b,:\r\n").unwrap();
        let frame = parser.parse(b"RF:,12,R2,1,2,3,4:R3,a,b,:\r\n").unwrap();
        assert_eq!(frame.field(Register::R2, 4), Some("4"));
        let frame = parser.parse(b"RF:,12,R2,1,2,3:R3,a,b,c,:\r\n").unwrap();
        assert_eq!(frame.field(Register::R2, 3), Some("3"));
        assert_eq!(frame.field(Register::R2, 4), None);
        assert_eq!(frame.field(Register::R3, 3), Some("c"));
    }

    #[test]
    fn framing_errors_abort_immediately() {
        let mut parser = ResponseParser::new(&TINY);
        let mut scan = parser.begin();
        assert_eq!(scan.push(b'R'), Ok(Progress::Continue));
        assert_eq!(scan.push(b'X'), Err(ParseError::Framing("RX".into())));

        assert_eq!(
            parser.parse(b"RF:x,12,R2,1,2,3:R3,a,b,:\r\n").unwrap_err(),
            ParseError::Framing("RF:x".into())
        );
        assert_eq!(parser.parse(b"RF").unwrap_err(), ParseError::Framing("RF".into()));
        assert_eq!(parser.parse(b"").unwrap_err(), ParseError::Framing("".into()));
        assert!(parser.layout().is_none());
    }

    #[test]
    fn short_register_is_counted_and_fails_the_frame() {
        let mut parser = ResponseParser::new(&TINY);
        let mut scan = parser.begin();
        for &byte in b"RF:,R2,1,2:R3,a,b,c,d,e,:\r\n" {
            scan.push(byte).unwrap();
        }
        assert!(scan.is_complete());
        assert_eq!(
            parser.finish(scan).unwrap_err(),
            ParseError::Deficient(vec![Deficiency { index: 0, fields: 3, minimum: 4 }])
        );
        assert!(parser.layout().is_none());
    }

    #[test]
    fn missing_terminator_leaves_the_frame_incomplete() {
        let mut parser = ResponseParser::new(&TINY);
        let error = parser.parse(b"RF:,12,R2,1,2,3:R3,a,b,c,d").unwrap_err();
        assert_eq!(
            error,
            ParseError::Incomplete { registers: 1, min_registers: 2, fields: 10, min_fields: 8 }
        );
    }

    #[test]
    fn line_feed_inside_an_earlier_register_is_content() {
        let mut parser = ResponseParser::new(&TINY);
        let frame = parser.parse(b"RF:,12,R2,1\n,2,3:R3,a,b,:\r\n").unwrap();
        assert_eq!(frame.field(Register::R2, 1), Some("1\n"));
    }

    #[test]
    fn colon_without_content_is_content() {
        let mut parser = ResponseParser::new(&TINY);
        let frame = parser.parse(b"RF:,12,R2,:1,2,3:R3,a,b,:\r\n").unwrap();
        assert_eq!(frame.field(Register::R2, 1), Some(":1"));
    }

    #[test]
    fn layout_is_discovered_once() {
        let mut parser = ResponseParser::new(&TINY);
        let first = parser.parse(b"RF:,12,R2,1,2,3:R3,a,b,:\r\n").unwrap();
        let second = parser.parse(b"RF:,12,R2,4,5,6:R3,c,d,:\r\n").unwrap();
        assert_eq!(first.layout, second.layout);
        assert_eq!(second.field(Register::R2, 1), Some("4"));

        // Tags in different places do not move the register bases any more.
        let moved = parser.parse(b"RF:,R2,7,8,9,0:R3,x,y,z,:\r\n").unwrap();
        assert_eq!(moved.layout.base(Register::R2), Some(2));
        assert_eq!(moved.layout.base(Register::R3), Some(6));
        assert_eq!(moved.field(Register::R2, 1), Some("8"));
    }

    #[test]
    fn failed_first_frame_does_not_commit_the_layout() {
        let mut parser = ResponseParser::new(&TINY);
        assert!(parser.parse(b"RF:,R2,1,2,3,4:R3,a").is_err());
        assert!(parser.layout().is_none());
        let frame = parser.parse(b"RF:,12,R2,1,2,3:R3,a,b,:\r\n").unwrap();
        assert_eq!(frame.layout.base(Register::R2), Some(2));
        assert_eq!(parser.layout(), Some(&frame.layout));
    }

    #[test]
    fn capture_keeps_the_excluded_tail() {
        let parser = ResponseParser::new(&TINY);
        let mut scan = parser.begin();
        for &byte in b"RF:,12,R2,1,2,3:R3,a,b,:\r\n" {
            scan.push(byte).unwrap();
        }
        assert_eq!(scan.capture(b"late"), "RF:,12,R2,1,2,3:R3,a,b,:\r\nlate");
    }

    #[test]
    fn current_firmware_frame() {
        let mut parser = ResponseParser::new(&SPANET);
        let frame = parser.parse(&FrameBuilder::current().build()).unwrap();
        assert_eq!(frame.layout.firmware(), Firmware::Current);
        assert_eq!(frame.layout.major_version(), Some(5));
        assert_eq!(frame.register_sizes.len(), 12);
        assert_eq!(frame.layout.base(Register::R2), Some(1));
        assert!(frame.layout.base(Register::RG).is_some());
        assert_eq!(frame.field(Register::R3, 6), Some("SW V5 17 05 31"));
    }

    #[test]
    fn legacy_firmware_frame_ends_after_eleven_registers() {
        let mut parser = ResponseParser::new(&SPANET);
        let frame = parser.parse(&FrameBuilder::legacy().build()).unwrap();
        assert_eq!(frame.layout.firmware(), Firmware::Legacy);
        assert_eq!(frame.register_sizes.len(), 11);
        assert_eq!(frame.layout.base(Register::RG), None);
    }

    #[test]
    fn current_firmware_needs_every_register() {
        let mut parser = ResponseParser::new(&SPANET);
        let bytes = FrameBuilder::current().without(Register::RG).build();
        assert!(matches!(
            parser.parse(&bytes),
            Err(ParseError::Incomplete { min_registers: 12, .. })
        ));
    }

    #[test]
    fn one_short_register_fails_a_full_frame() {
        let mut parser = ResponseParser::new(&SPANET);
        let bytes = FrameBuilder::current().resize(Register::R4, 25).build();
        assert_eq!(
            parser.parse(&bytes).unwrap_err(),
            ParseError::Deficient(vec![Deficiency { index: 2, fields: 25, minimum: 26 }])
        );
    }
}
