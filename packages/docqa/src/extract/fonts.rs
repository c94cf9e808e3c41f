//! Font-aware decoding of shown PDF strings.
//!
//! Simple fonts map single bytes through their named encoding using
//! `lopdf`'s tables. Composite (`Type0`) fonts show multi-byte codes that
//! only mean something through the font's `ToUnicode` CMap; without one the
//! codes are bare glyph ids and cannot be turned into text.

use std::collections::{BTreeMap, HashMap};

use lazy_static::lazy_static;
use lopdf::{Dictionary, Document as PdfDocument, Object, ObjectId};
use regex::Regex;
use tracing::debug;

/// Encoding assumed for strings shown in a font the page does not declare.
const UNDECLARED_FONT_ENCODING: &str = "WinAnsiEncoding";

/// Widest `bfrange` expanded into the lookup table.
const MAX_RANGE_SPAN: u32 = 0xFFFF;

lazy_static! {
    static ref CODESPACE_REGEX: Regex =
        Regex::new(r"(?s)begincodespacerange\s*<([0-9A-Fa-f]+)>").unwrap();
    static ref BFCHAR_BLOCK_REGEX: Regex = Regex::new(r"(?s)beginbfchar(.*?)endbfchar").unwrap();
    static ref BFRANGE_BLOCK_REGEX: Regex =
        Regex::new(r"(?s)beginbfrange(.*?)endbfrange").unwrap();
    static ref BFCHAR_ENTRY_REGEX: Regex =
        Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]*)>").unwrap();
    static ref BFRANGE_ENTRY_REGEX: Regex =
        Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>\s*(<[0-9A-Fa-f]*>|\[[^\]]*\])").unwrap();
    static ref HEX_TOKEN_REGEX: Regex = Regex::new(r"<([0-9A-Fa-f]*)>").unwrap();
}

/// How the bytes of a shown string become text.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum GlyphDecoder {
    /// Single-byte codes through a named encoding.
    Simple(String),
    /// Codes looked up in the font's `ToUnicode` CMap.
    Mapped(ToUnicodeMap),
    /// Glyph ids with no way back to text.
    Opaque,
}

impl Default for GlyphDecoder {
    fn default() -> Self {
        GlyphDecoder::Simple(UNDECLARED_FONT_ENCODING.to_string())
    }
}

impl GlyphDecoder {
    /// Decoded text with control characters removed, or `None` when the
    /// font gives no way to recover text.
    pub(super) fn decode(&self, bytes: &[u8]) -> Option<String> {
        let text = match self {
            GlyphDecoder::Simple(_) if bytes.starts_with(&[0xFE, 0xFF]) => {
                let units: Vec<u16> = bytes[2..]
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16_lossy(&units)
            }
            GlyphDecoder::Simple(encoding) => PdfDocument::decode_text(Some(encoding), bytes),
            GlyphDecoder::Mapped(map) => map.decode(bytes),
            GlyphDecoder::Opaque => return None,
        };
        Some(text.chars().filter(|c| !c.is_control()).collect())
    }
}

/// Character codes to Unicode text, read from a `ToUnicode` CMap.
#[derive(Debug, Clone, PartialEq, Default)]
pub(super) struct ToUnicodeMap {
    code_len: usize,
    entries: HashMap<u32, String>,
}

impl ToUnicodeMap {
    /// Parse the `bfchar` and `bfrange` sections of a CMap. Code width comes
    /// from the first codespace range, else `default_code_len` bytes.
    pub(super) fn parse(cmap: &str, default_code_len: usize) -> Self {
        let code_len = CODESPACE_REGEX
            .captures(cmap)
            .and_then(|caps| caps.get(1))
            .map(|low| (low.as_str().len() / 2).clamp(1, 4))
            .unwrap_or(default_code_len);

        let mut entries = HashMap::new();

        for block in BFCHAR_BLOCK_REGEX.captures_iter(cmap).filter_map(|c| c.get(1)) {
            for entry in BFCHAR_ENTRY_REGEX.captures_iter(block.as_str()) {
                if let (Some(code), Some(units)) = (parse_code(&entry[1]), utf16_units(&entry[2])) {
                    entries.insert(code, String::from_utf16_lossy(&units));
                }
            }
        }

        for block in BFRANGE_BLOCK_REGEX.captures_iter(cmap).filter_map(|c| c.get(1)) {
            for entry in BFRANGE_ENTRY_REGEX.captures_iter(block.as_str()) {
                let (Some(low), Some(high)) = (parse_code(&entry[1]), parse_code(&entry[2])) else {
                    continue;
                };
                if high < low || high - low > MAX_RANGE_SPAN {
                    continue;
                }

                let target = &entry[3];
                if target.starts_with('[') {
                    for (code, hex) in (low..=high).zip(HEX_TOKEN_REGEX.captures_iter(target)) {
                        if let Some(units) = utf16_units(&hex[1]) {
                            entries.insert(code, String::from_utf16_lossy(&units));
                        }
                    }
                } else if let Some(start) = utf16_units(target.trim_matches(|c| c == '<' || c == '>')) {
                    for (offset, code) in (low..=high).enumerate() {
                        let mut units = start.clone();
                        if let Some(last) = units.last_mut() {
                            *last = last.wrapping_add(offset as u16);
                        }
                        entries.insert(code, String::from_utf16_lossy(&units));
                    }
                }
            }
        }

        Self { code_len, entries }
    }

    pub(super) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unmapped codes are skipped.
    fn decode(&self, bytes: &[u8]) -> String {
        bytes
            .chunks(self.code_len.max(1))
            .filter_map(|chunk| {
                let code = chunk.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
                self.entries.get(&code).map(String::as_str)
            })
            .collect()
    }
}

fn parse_code(hex: &str) -> Option<u32> {
    if hex.len() > 8 {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

fn utf16_units(hex: &str) -> Option<Vec<u16>> {
    if hex.is_empty() {
        return None;
    }
    hex.as_bytes()
        .chunks(4)
        .map(|chunk| {
            let digits = std::str::from_utf8(chunk).ok()?;
            u16::from_str_radix(digits, 16).ok()
        })
        .collect()
}

/// Decoders for the fonts a page declares, keyed by resource name.
#[derive(Debug, Default)]
pub(super) struct PageFonts {
    decoders: BTreeMap<Vec<u8>, GlyphDecoder>,
}

impl PageFonts {
    pub(super) fn load(document: &PdfDocument, page_id: ObjectId) -> Self {
        let decoders = document
            .get_page_fonts(page_id)
            .into_iter()
            .map(|(name, font)| {
                let decoder = font_decoder(document, font);
                (name, decoder)
            })
            .collect();
        Self { decoders }
    }

    pub(super) fn get(&self, name: &[u8]) -> Option<&GlyphDecoder> {
        self.decoders.get(name)
    }
}

fn font_decoder(document: &PdfDocument, font: &Dictionary) -> GlyphDecoder {
    let composite = font.get(b"Subtype").and_then(Object::as_name_str).ok() == Some("Type0");

    if let Some(map) = to_unicode(document, font, if composite { 2 } else { 1 }) {
        return GlyphDecoder::Mapped(map);
    }
    if composite {
        debug!(
            font = font.get(b"BaseFont").and_then(Object::as_name_str).unwrap_or("unknown"),
            "Composite font has no ToUnicode map"
        );
        return GlyphDecoder::Opaque;
    }
    GlyphDecoder::Simple(encoding_name(document, font).to_string())
}

fn to_unicode(document: &PdfDocument, font: &Dictionary, default_code_len: usize) -> Option<ToUnicodeMap> {
    let object = font.get(b"ToUnicode").ok()?;
    let (_, object) = document.dereference(object).ok()?;
    let stream = object.as_stream().ok()?;
    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());
    let map = ToUnicodeMap::parse(&String::from_utf8_lossy(&data), default_code_len);
    (!map.is_empty()).then_some(map)
}

/// Named encoding of a simple font. A `Differences` dictionary falls back to
/// its base encoding.
fn encoding_name<'a>(document: &'a PdfDocument, font: &'a Dictionary) -> &'a str {
    let resolved = font
        .get(b"Encoding")
        .and_then(|object| document.dereference(object))
        .map(|(_, object)| object);
    match resolved {
        Ok(Object::Dictionary(dict)) => dict
            .get(b"BaseEncoding")
            .and_then(Object::as_name_str)
            .unwrap_or("StandardEncoding"),
        _ => font.get_font_encoding(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CMAP: &str = "/CIDInit /ProcSet findresource begin\n\
        begincmap\n\
        1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n\
        2 beginbfchar\n<0003> <0020>\n<002B> <0048>\nendbfchar\n\
        2 beginbfrange\n<0044> <005D> <0061>\n<0060> <0061> [<2019> <00E9>]\nendbfrange\n\
        endcmap";

    #[test]
    fn test_cmap_chars_and_ranges() {
        let map = ToUnicodeMap::parse(CMAP, 1);
        let decoder = GlyphDecoder::Mapped(map);

        let hello = [0x00, 0x2B, 0x00, 0x48, 0x00, 0x4F, 0x00, 0x4F, 0x00, 0x52];
        assert_eq!(decoder.decode(&hello).as_deref(), Some("Hello"));

        let listed = [0x00, 0x60, 0x00, 0x61];
        assert_eq!(decoder.decode(&listed).as_deref(), Some("\u{2019}\u{e9}"));
    }

    #[test]
    fn test_cmap_skips_unmapped_codes() {
        let decoder = GlyphDecoder::Mapped(ToUnicodeMap::parse(CMAP, 1));
        assert_eq!(decoder.decode(&[0x00, 0x2B, 0x7F, 0x7F]).as_deref(), Some("H"));
    }

    #[test]
    fn test_cmap_without_codespace_uses_default_width() {
        let map = ToUnicodeMap::parse("beginbfchar <41> <0058> endbfchar", 1);
        assert_eq!(GlyphDecoder::Mapped(map).decode(b"AA").as_deref(), Some("XX"));
    }

    #[test]
    fn test_win_ansi_punctuation_survives() {
        let decoder = GlyphDecoder::Simple("WinAnsiEncoding".into());
        assert_eq!(decoder.decode(b"Don\x92t \x96 go").as_deref(), Some("Don\u{2019}t \u{2013} go"));
    }

    #[test]
    fn test_utf16_strings_decoded() {
        let bytes = [0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69];
        assert_eq!(GlyphDecoder::default().decode(&bytes).as_deref(), Some("Hi"));
    }

    #[test]
    fn test_opaque_glyph_ids_do_not_decode() {
        assert_eq!(GlyphDecoder::Opaque.decode(&[0x00, 0x2B]), None);
    }
}
