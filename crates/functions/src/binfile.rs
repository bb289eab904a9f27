//! `binfile`: embed a binary file into generated source as text.
//!
//! The encoding token starts with one of `base64`, `byte[]`, `uint8[]` or
//! `int8[]` (case-insensitive). Any characters after it are scanned for the
//! modifier flags `s` (split into lines of 80 characters) and `d` (DEFLATE
//! the bytes before encoding). Flags may be combined in any order.
use crate::context::CallCtx;
use crate::error::{Error, ErrorCode, Result};
use crate::function::FunctionDescriptor;
use crate::value::{Value, ValueKind};
use base64::Engine as _;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::io::Write;
use std::sync::Arc;

pub const LINE_LENGTH: usize = 80;

#[cfg(windows)]
pub const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
pub const LINE_ENDING: &str = "\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryEncoding {
    Base64,
    ByteArray,
    Uint8,
    Int8,
}

impl BinaryEncoding {
    pub const ALL: [BinaryEncoding; 4] = [
        BinaryEncoding::Base64,
        BinaryEncoding::ByteArray,
        BinaryEncoding::Uint8,
        BinaryEncoding::Int8,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            BinaryEncoding::Base64 => "base64",
            BinaryEncoding::ByteArray => "byte[]",
            BinaryEncoding::Uint8 => "uint8[]",
            BinaryEncoding::Int8 => "int8[]",
        }
    }
}

/// Parsed encoding token: variant plus modifier flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    pub encoding: BinaryEncoding,
    pub split: bool,
    pub deflate: bool,
}

impl EncodeOptions {
    pub fn parse(token: &str) -> Result<Self> {
        let normalized = token.trim().to_lowercase();
        let found = BinaryEncoding::ALL
            .into_iter()
            .find_map(|enc| normalized.strip_prefix(enc.token()).map(|rest| (enc, rest)));
        let Some((encoding, flags)) = found else {
            return Err(Error::from_code(
                ErrorCode::UnsupportedEncoding,
                format!("unsupported encode type [{token}]"),
            ));
        };
        Ok(Self {
            encoding,
            split: flags.contains('s'),
            deflate: flags.contains('d'),
        })
    }

    fn line_length(&self) -> Option<usize> {
        self.split.then_some(LINE_LENGTH)
    }
}

/// Compress with zlib framing at the best compression level.
pub fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len()), Compression::best());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Run the deflate + encode pipeline over `data`.
pub fn encode(data: &[u8], options: EncodeOptions, line_ending: &str) -> Result<String> {
    let compressed;
    let bytes = if options.deflate {
        compressed = deflate(data)?;
        compressed.as_slice()
    } else {
        data
    };
    Ok(match options.encoding {
        BinaryEncoding::Base64 => encode_base64(bytes, options.line_length(), line_ending),
        other => encode_literal_list(bytes, other, options.line_length(), line_ending),
    })
}

fn encode_base64(bytes: &[u8], line_length: Option<usize>, line_ending: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    let Some(width) = line_length else {
        return encoded.trim().to_string();
    };
    // The base64 alphabet is ASCII, so byte chunks are char boundaries.
    let lines: Vec<&str> = encoded
        .as_bytes()
        .chunks(width)
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
        .collect();
    lines.join(line_ending).trim().to_string()
}

fn render_byte(out: &mut String, b: u8, encoding: BinaryEncoding) {
    match encoding {
        BinaryEncoding::ByteArray => {
            out.push_str("(byte)0x");
            out.push_str(&format!("{b:X}"));
        }
        // Numeric text is upper-cased like the hex form; this is a no-op.
        BinaryEncoding::Uint8 => out.push_str(&b.to_string().to_uppercase()),
        BinaryEncoding::Int8 => out.push_str(&i8::from_ne_bytes([b]).to_string().to_uppercase()),
        BinaryEncoding::Base64 => {}
    }
}

fn encode_literal_list(
    bytes: &[u8],
    encoding: BinaryEncoding,
    line_length: Option<usize>,
    line_ending: &str,
) -> String {
    let mut out = String::with_capacity(512);
    let mut end_line_pos = line_length.unwrap_or(0);
    let mut add_next_line = false;
    for &b in bytes {
        if !out.is_empty() {
            out.push(',');
        }
        if add_next_line {
            add_next_line = false;
            out.push_str(line_ending);
        }
        render_byte(&mut out, b, encoding);
        if let Some(width) = line_length
            && out.len() >= end_line_pos
        {
            add_next_line = true;
            end_line_pos = out.len() + width;
        }
    }
    out
}

fn execute(ctx: &mut CallCtx<'_>, file: &str, encode_type: &str) -> Result<Value> {
    let options = EncodeOptions::parse(encode_type)?;
    let path = ctx.files.resolve_file(file)?;
    if ctx.diagnostics.is_verbose() {
        ctx.diagnostics
            .log_verbose(&format!("loading content of bin file '{}'", path.display()));
    }
    let data = std::fs::read(&path).map_err(|e| {
        let msg = format!("can't read bin file '{}': {e}", path.display());
        Error::from_code(ErrorCode::IOFailure, msg)
            .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
    })?;
    tracing::debug!(path = %path.display(), size = data.len(), ?options, "encoding bin file");
    encode(&data, options, LINE_ENDING).map(Value::from)
}

pub fn descriptor() -> FunctionDescriptor {
    let types: Vec<&str> = BinaryEncoding::ALL.iter().map(BinaryEncoding::token).collect();
    let reference = format!(
        "encode bin file into string representation, allowed types [{}[s|d|sd|ds]], s - split to lines, d - deflater compression",
        types.join("|")
    );
    FunctionDescriptor::new("binfile", 2, ValueKind::String, reference).overload(
        &[ValueKind::String, ValueKind::String],
        |ctx, args| execute(ctx, &args[0].as_string(), &args[1].as_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SAMPLE: [u8; 5] = [0x00, 0xFF, 0x10, 0x7F, 0x80];

    fn opts(token: &str) -> EncodeOptions {
        EncodeOptions::parse(token).unwrap()
    }

    #[rstest]
    #[case("base64", BinaryEncoding::Base64, false, false)]
    #[case("BYTE[]", BinaryEncoding::ByteArray, false, false)]
    #[case("uint8[]s", BinaryEncoding::Uint8, true, false)]
    #[case("int8[]DS", BinaryEncoding::Int8, true, true)]
    #[case(" base64d ", BinaryEncoding::Base64, false, true)]
    fn tokens_select_variant_and_flags(
        #[case] token: &str,
        #[case] encoding: BinaryEncoding,
        #[case] split: bool,
        #[case] deflate: bool,
    ) {
        assert_eq!(opts(token), EncodeOptions { encoding, split, deflate });
    }

    #[rstest]
    #[case("base32")]
    #[case("")]
    #[case("int16[]")]
    fn unknown_tokens_are_rejected(#[case] token: &str) {
        let err = EncodeOptions::parse(token).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedEncoding);
    }

    #[rstest]
    #[case("uint8[]", "0,255,16,127,128")]
    #[case("int8[]", "0,-1,16,127,-128")]
    #[case("byte[]", "(byte)0x0,(byte)0xFF,(byte)0x10,(byte)0x7F,(byte)0x80")]
    fn literal_lists_render_each_byte(#[case] token: &str, #[case] expected: &str) {
        assert_eq!(encode(&SAMPLE, opts(token), "\n").unwrap(), expected);
    }

    #[test]
    fn empty_input_renders_empty_text() {
        for token in ["base64s", "byte[]s", "uint8[]", "int8[]d"] {
            let out = encode(&[], opts(token), "\n").unwrap();
            if token.contains('d') {
                assert!(!out.is_empty());
            } else {
                assert_eq!(out, "", "{token}");
            }
        }
    }

    #[test]
    fn literal_split_breaks_after_crossing_each_threshold() {
        // "255," is four characters; the 20th token ends at column 79 and the
        // 21st pushes the buffer to 83, so the break follows the 21st token.
        let data = [0xFF_u8; 45];
        let out = encode(&data, opts("uint8[]s"), "\n").unwrap();
        let lines: Vec<&str> = out.split('\n').collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].len(), 84);
        assert!(lines[0].ends_with(','));
        assert_eq!(lines[0].matches("255").count(), 21);
        assert_eq!(lines.iter().map(|l| l.matches("255").count()).sum::<usize>(), 45);
        assert!(!out.ends_with(','));
    }

    #[test]
    fn base64_split_wraps_at_eighty() {
        let data: Vec<u8> = (0..=255).collect();
        let out = encode(&data, opts("base64s"), "\r\n").unwrap();
        let lines: Vec<&str> = out.split("\r\n").collect();
        assert!(lines.len() > 1);
        assert!(lines[..lines.len() - 1].iter().all(|l| l.len() == LINE_LENGTH));
        assert!(lines.last().unwrap().len() <= LINE_LENGTH);
    }
}
