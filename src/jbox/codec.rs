use serde::Serialize;
use serde_json::Value;
use serde_json::ser::{Formatter, PrettyFormatter};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::{Result, StoreError};
use crate::types::Encoding;

const INDENT: &[u8] = b"  ";

// ─── AsciiFormatter ─────────────────────────────────────────────────────────

/// Pretty printer that escapes every non-ASCII character as `\uXXXX`
/// (surrogate pairs above the BMP), so the output is plain ASCII whatever
/// the file encoding.
pub struct AsciiFormatter {
    inner: PrettyFormatter<'static>,
}

impl AsciiFormatter {
    pub fn new() -> Self {
        Self {
            inner: PrettyFormatter::with_indent(INDENT),
        }
    }
}

impl Default for AsciiFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for AsciiFormatter {
    #[inline]
    fn begin_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_array(writer)
    }

    #[inline]
    fn end_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array(writer)
    }

    #[inline]
    fn begin_array_value<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.inner.begin_array_value(writer, first)
    }

    #[inline]
    fn end_array_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array_value(writer)
    }

    #[inline]
    fn begin_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object(writer)
    }

    #[inline]
    fn end_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object(writer)
    }

    #[inline]
    fn begin_object_key<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.inner.begin_object_key(writer, first)
    }

    #[inline]
    fn begin_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object_value(writer)
    }

    #[inline]
    fn end_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object_value(writer)
    }

    fn write_string_fragment<W: ?Sized + Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        let mut start = 0;
        for (pos, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }
            writer.write_all(&fragment.as_bytes()[start..pos])?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = pos + ch.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[start..])
    }
}

// ─── Rendering ──────────────────────────────────────────────────────────────

/// Text written for `value`: keys sorted at every level, 2-space indent,
/// exactly one trailing newline.
pub fn render(value: &Value, ensure_ascii: bool) -> Result<String> {
    let mut sorted = value.clone();
    sorted.sort_all_objects();

    let mut buf = Vec::with_capacity(256);
    if ensure_ascii {
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, AsciiFormatter::new());
        sorted.serialize(&mut ser)?;
    } else {
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(INDENT));
        sorted.serialize(&mut ser)?;
    }
    buf.push(b'\n');
    String::from_utf8(buf).map_err(|e| StoreError::Encoding(e.to_string()))
}

// ─── File I/O ───────────────────────────────────────────────────────────────

/// Whole file decoded with `encoding`; `None` when the file does not exist.
pub fn read_text(path: &Path, encoding: Encoding) -> Result<Option<String>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    encoding.decode(&bytes).map(Some)
}

/// Replace `path` with `text`, going through a temporary file in the same
/// directory. Line endings are written as given (LF) on every platform.
pub fn write_text(path: &Path, text: &str, encoding: Encoding) -> Result<()> {
    let bytes = encoding.encode(text)?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.flush()?;
    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), meta.permissions())?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
