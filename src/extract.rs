//! Format-specific extraction from files on disk to [`RawDocument`]s.
//!
//! Dispatch is by [`FileFormat`], derived from the file extension. Office
//! formats are OOXML (ZIP + XML) read with `zip` and `quick-xml`; PDFs are read
//! with `lopdf`, and only their embedded images are used (through OCR), with
//! raw image samples re-encoded as PNG by `image`.
//!
//! Per-file errors are returned as [`ExtractError`]; the ingestion pipeline
//! logs them and moves on.

use std::io::Read;
use std::path::Path;

use tracing::{debug, warn};

use crate::models::{ContentKind, DocumentContent, RawDocument};
use crate::ocr::OcrEngine;

/// Maximum sheets to process in an xlsx.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum cells to process per sheet.
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_ZIP_ENTRY_BYTES: u64 = 50 * 1024 * 1024;
/// Image types the OCR engine accepts from `word/media/`.
const OCR_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "tif", "tiff", "webp"];

/// Closed set of recognized input formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileFormat {
    Text,
    Markdown,
    Csv,
    Xlsx,
    Pptx,
    Docx,
    Pdf,
    /// Lowercased extension (empty when the file has none).
    Unsupported(String),
}

impl FileFormat {
    /// Extension match is case-insensitive.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "txt" => FileFormat::Text,
            "md" => FileFormat::Markdown,
            "csv" => FileFormat::Csv,
            "xlsx" => FileFormat::Xlsx,
            "pptx" => FileFormat::Pptx,
            "docx" => FileFormat::Docx,
            "pdf" => FileFormat::Pdf,
            _ => FileFormat::Unsupported(ext),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported file type: '{0}'")]
    Unsupported(String),
    #[error("file is {size} bytes, larger than the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OCR failed for every embedded image: {0}")]
    Ocr(String),
}

/// Reads `path` and returns its documents, native text first.
///
/// The document `source_id` is the file name.
pub fn extract_file(
    path: &Path,
    max_bytes: u64,
    ocr: &dyn OcrEngine,
) -> Result<Vec<RawDocument>, ExtractError> {
    let format = FileFormat::from_path(path);
    if let FileFormat::Unsupported(ext) = &format {
        return Err(ExtractError::Unsupported(ext.clone()));
    }

    let size = std::fs::metadata(path)?.len();
    if size > max_bytes {
        return Err(ExtractError::TooLarge {
            size,
            limit: max_bytes,
        });
    }

    let bytes = std::fs::read(path)?;
    let source_id = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    extract_bytes(&bytes, &format, &source_id, ocr)
}

/// Extraction over in-memory content.
pub fn extract_bytes(
    bytes: &[u8],
    format: &FileFormat,
    source_id: &str,
    ocr: &dyn OcrEngine,
) -> Result<Vec<RawDocument>, ExtractError> {
    let native = |text: String| RawDocument {
        content: DocumentContent::Text(text),
        source_id: source_id.to_string(),
        content_kind: ContentKind::NativeText,
        format: format.clone(),
    };

    match format {
        FileFormat::Text | FileFormat::Markdown | FileFormat::Csv => {
            Ok(vec![native(String::from_utf8_lossy(bytes).into_owned())])
        }
        FileFormat::Xlsx => Ok(vec![native(extract_xlsx(bytes)?)]),
        FileFormat::Pptx => Ok(vec![native(extract_pptx(bytes)?)]),
        FileFormat::Docx => {
            let mut archive = open_archive(bytes)?;
            let text = extract_docx_text(&mut archive)?;
            let mut docs = vec![native(text)];
            for image_text in ocr_docx_media(&mut archive, source_id, ocr)? {
                docs.push(RawDocument {
                    content: DocumentContent::Text(image_text),
                    source_id: source_id.to_string(),
                    content_kind: ContentKind::OcrExtracted,
                    format: FileFormat::Docx,
                });
            }
            Ok(docs)
        }
        FileFormat::Pdf => {
            let pages = ocr_pdf_pages(bytes, source_id, ocr)?;
            if pages.iter().all(|page| page.trim().is_empty()) {
                debug!(file = source_id, "no text on any page");
                return Ok(Vec::new());
            }
            Ok(vec![RawDocument {
                content: DocumentContent::Pages(pages),
                source_id: source_id.to_string(),
                content_kind: ContentKind::OcrExtracted,
                format: FileFormat::Pdf,
            }])
        }
        FileFormat::Unsupported(ext) => Err(ExtractError::Unsupported(ext.clone())),
    }
}

type Archive<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, ExtractError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))
}

fn read_zip_entry_bounded(
    archive: &mut Archive<'_>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry.take(max_bytes).read_to_end(&mut out)?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

/// Entry names matching `prefix<N>.xml`, ordered by `N`.
fn numbered_entries(archive: &Archive<'_>, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

/// Collects the text of every `<text_tag>` element, ending a line at each
/// closing `<paragraph_tag>`. Namespace prefixes are ignored.
fn collect_paragraphs(
    xml: &[u8],
    text_tag: &[u8],
    paragraph_tag: &[u8],
) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == text_tag => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                if name.as_ref() == text_tag {
                    in_text = false;
                } else if name.as_ref() == paragraph_tag {
                    out.push('\n');
                }
            }
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn extract_docx_text(archive: &mut Archive<'_>) -> Result<String, ExtractError> {
    let xml = read_zip_entry_bounded(archive, "word/document.xml", MAX_ZIP_ENTRY_BYTES)?;
    collect_paragraphs(&xml, b"t", b"p")
}

/// OCRs every supported image under `word/media/`. Images that fail
/// recognition are logged and skipped; the document's own text still counts.
fn ocr_docx_media(
    archive: &mut Archive<'_>,
    source_id: &str,
    ocr: &dyn OcrEngine,
) -> Result<Vec<String>, ExtractError> {
    let mut media: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("word/media/"))
        .map(|s| s.to_string())
        .collect();
    media.sort();

    let mut texts = Vec::new();
    for name in media {
        let ext = Path::new(&name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !OCR_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            debug!(file = source_id, image = %name, "skipping non-raster media");
            continue;
        }
        let image = read_zip_entry_bounded(archive, &name, MAX_ZIP_ENTRY_BYTES)?;
        match ocr.recognize(&image) {
            Ok(text) if !text.trim().is_empty() => texts.push(text),
            Ok(_) => debug!(file = source_id, image = %name, "no text recognized"),
            Err(e) => warn!(file = source_id, image = %name, error = %e, "image OCR failed"),
        }
    }
    Ok(texts)
}

/// OCRs the embedded images of each page, one entry per page.
///
/// JPEG and JPEG 2000 streams go to the engine as stored; raw samples are
/// re-encoded as PNG first (see [`pdf_image_for_ocr`]). A PDF that has
/// images fails as a whole when none of them could be decoded or recognized,
/// so that it is retried on a later run.
fn ocr_pdf_pages(
    bytes: &[u8],
    source_id: &str,
    ocr: &dyn OcrEngine,
) -> Result<Vec<String>, ExtractError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;

    let mut pages = Vec::new();
    let mut seen = 0usize;
    let mut recognized = 0usize;
    let mut last_error = None;
    for (page_no, page_id) in doc.get_pages() {
        let images = match doc.get_page_images(page_id) {
            Ok(images) => images,
            Err(e) => {
                debug!(file = source_id, page = page_no, error = %e, "no readable images on page");
                Vec::new()
            }
        };

        let mut page_text = Vec::new();
        for image in images {
            seen += 1;
            let encoded = match pdf_image_for_ocr(&doc, &image) {
                Ok(encoded) => encoded,
                Err(reason) => {
                    warn!(
                        file = source_id,
                        page = page_no,
                        filters = ?image.filters,
                        %reason,
                        "image cannot be decoded for OCR"
                    );
                    last_error = Some(reason);
                    continue;
                }
            };
            match ocr.recognize(&encoded) {
                Ok(text) => {
                    recognized += 1;
                    page_text.push(text);
                }
                Err(e) => {
                    warn!(file = source_id, page = page_no, error = %e, "image OCR failed");
                    last_error = Some(e.to_string());
                }
            }
        }
        pages.push(page_text.join("\n"));
    }

    if seen > 0 && recognized == 0 {
        return Err(ExtractError::Ocr(last_error.unwrap_or_default()));
    }
    Ok(pages)
}

/// Filters lopdf can undo, leaving raw image samples.
const PDF_SAMPLE_FILTERS: &[&str] = &["FlateDecode", "LZWDecode", "ASCII85Decode"];

/// Produces bytes the OCR engine can read from a PDF image XObject.
///
/// CCITT fax, JBIG2 and other encodings without a decoder here are an error.
fn pdf_image_for_ocr(
    doc: &lopdf::Document,
    image: &lopdf::xobject::PdfImage<'_>,
) -> Result<Vec<u8>, String> {
    let filters = image.filters.as_deref().unwrap_or_default();
    match filters {
        [f] if matches!(f.as_str(), "DCTDecode" | "JPXDecode") => Ok(image.content.to_vec()),
        _ if filters.iter().all(|f| PDF_SAMPLE_FILTERS.contains(&f.as_str())) => {
            let samples = doc
                .get_object(image.id)
                .and_then(|obj| obj.as_stream())
                .and_then(|stream| stream.get_plain_content())
                .map_err(|e| format!("cannot decompress image: {}", e))?;
            samples_to_png(
                samples,
                image.width,
                image.height,
                image.color_space.as_deref(),
                image.bits_per_component.unwrap_or(8),
            )
        }
        _ => Err(format!("unsupported image encoding {:?}", filters)),
    }
}

/// Encodes raw 8-bit gray/RGB/CMYK or 1-bit gray samples as PNG.
fn samples_to_png(
    mut samples: Vec<u8>,
    width: i64,
    height: i64,
    color_space: Option<&str>,
    bits: i64,
) -> Result<Vec<u8>, String> {
    let (w, h) = match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(format!("invalid image size {}x{}", width, height)),
    };
    let pixels = w as usize * h as usize;
    let too_short = || format!("image data too short for {}x{}", w, h);

    let decoded = match bits {
        1 => {
            let row_bytes = (w as usize).div_ceil(8);
            if samples.len() < row_bytes * h as usize {
                return Err(too_short());
            }
            let mut gray = Vec::with_capacity(pixels);
            for row in samples.chunks(row_bytes).take(h as usize) {
                for x in 0..w as usize {
                    let bit = (row[x / 8] >> (7 - x % 8)) & 1;
                    gray.push(if bit == 1 { 255 } else { 0 });
                }
            }
            image::GrayImage::from_raw(w, h, gray)
                .map(image::DynamicImage::ImageLuma8)
                .ok_or_else(too_short)?
        }
        8 => {
            let components = match color_space {
                Some("DeviceGray" | "CalGray") => 1,
                Some("DeviceRGB" | "CalRGB") => 3,
                Some("DeviceCMYK") => 4,
                _ => samples.len() / pixels,
            };
            samples.truncate(pixels * components);
            let decoded = match components {
                1 => image::GrayImage::from_raw(w, h, samples).map(image::DynamicImage::ImageLuma8),
                3 => image::RgbImage::from_raw(w, h, samples).map(image::DynamicImage::ImageRgb8),
                4 => {
                    let rgb = samples
                        .chunks_exact(4)
                        .flat_map(|p| {
                            let k = 255 - u16::from(p[3]);
                            p[..3].iter().map(move |&c| ((255 - u16::from(c)) * k / 255) as u8)
                        })
                        .collect();
                    image::RgbImage::from_raw(w, h, rgb).map(image::DynamicImage::ImageRgb8)
                }
                n => return Err(format!("unsupported color layout ({} components)", n)),
            };
            decoded.ok_or_else(too_short)?
        }
        n => return Err(format!("unsupported bit depth {}", n)),
    };

    let mut png = std::io::Cursor::new(Vec::new());
    decoded
        .write_to(&mut png, image::ImageFormat::Png)
        .map_err(|e| format!("failed to encode PNG: {}", e))?;
    Ok(png.into_inner())
}

fn extract_pptx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let mut slides = Vec::new();
    for name in numbered_entries(&archive, "ppt/slides/slide") {
        let xml = read_zip_entry_bounded(&mut archive, &name, MAX_ZIP_ENTRY_BYTES)?;
        let text = collect_paragraphs(&xml, b"t", b"p")?;
        if !text.trim().is_empty() {
            slides.push(text);
        }
    }
    Ok(slides.join("\n\n"))
}

fn extract_xlsx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let shared_strings = if archive.file_names().any(|n| n == "xl/sharedStrings.xml") {
        read_shared_strings(&mut archive)?
    } else {
        Vec::new()
    };
    let mut sheets = Vec::new();
    for name in numbered_entries(&archive, "xl/worksheets/sheet")
        .into_iter()
        .take(XLSX_MAX_SHEETS)
    {
        let xml = read_zip_entry_bounded(&mut archive, &name, MAX_ZIP_ENTRY_BYTES)?;
        sheets.push(extract_sheet_rows(&xml, &shared_strings)?);
    }
    Ok(sheets.join("\n\n"))
}

fn read_shared_strings(archive: &mut Archive<'_>) -> Result<Vec<String>, ExtractError> {
    use quick_xml::events::Event;

    let xml = read_zip_entry_bounded(archive, "xl/sharedStrings.xml", MAX_ZIP_ENTRY_BYTES)?;
    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_t = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_t => {
                if let Some(s) = current.as_mut() {
                    s.push_str(te.unescape().unwrap_or_default().as_ref());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"si" => strings.extend(current.take()),
                b"t" => in_t = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// One line per row, cells separated by a single space.
fn extract_sheet_rows(xml: &[u8], shared_strings: &[String]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut rows: Vec<String> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_value = false;
    let mut shared = false;
    let mut cell_count = 0usize;
    loop {
        if cell_count >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"c" => {
                    shared = e.attributes().any(|a| {
                        a.as_ref()
                            .map(|a| a.key.as_ref() == b"t" && a.value.as_ref() == b"s")
                            .unwrap_or(false)
                    });
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_value => {
                let raw = te.unescape().unwrap_or_default();
                let value = raw.trim();
                if !value.is_empty() {
                    let cell = if shared {
                        value
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| shared_strings.get(i).cloned())
                    } else {
                        Some(value.to_string())
                    };
                    if let Some(cell) = cell {
                        row.push(cell);
                        cell_count += 1;
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => shared = false,
                b"row" => {
                    if !row.is_empty() {
                        rows.push(row.join(" "));
                    }
                    row.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if !row.is_empty() {
        rows.push(row.join(" "));
    }
    Ok(rows.join("\n"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    struct FixedOcr(&'static str);

    impl OcrEngine for FixedOcr {
        fn name(&self) -> &str {
            "fixed"
        }
        fn recognize(&self, _image: &[u8]) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingOcr;

    impl OcrEngine for FailingOcr {
        fn name(&self) -> &str {
            "failing"
        }
        fn recognize(&self, _image: &[u8]) -> anyhow::Result<String> {
            anyhow::bail!("engine unavailable")
        }
    }

    fn zip_of(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            for (name, content) in entries {
                zip.start_file(*name, zip::write::SimpleFileOptions::default())
                    .unwrap();
                zip.write_all(content).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    const DOCX_XML: &[u8] = br#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:r><w:t xml:space="preserve">Hello </w:t></w:r><w:r><w:t>world</w:t></w:r></w:p>
<w:p><w:r><w:t>Second paragraph</w:t></w:r></w:p>
</w:body></w:document>"#;

    #[test]
    fn format_from_extension_is_case_insensitive() {
        assert_eq!(FileFormat::from_path(Path::new("a/B.TXT")), FileFormat::Text);
        assert_eq!(FileFormat::from_path(Path::new("x.Docx")), FileFormat::Docx);
        assert_eq!(FileFormat::from_path(Path::new("x.md")), FileFormat::Markdown);
        assert_eq!(
            FileFormat::from_path(Path::new("archive.zip")),
            FileFormat::Unsupported("zip".to_string())
        );
        assert_eq!(
            FileFormat::from_path(Path::new("Makefile")),
            FileFormat::Unsupported(String::new())
        );
    }

    #[test]
    fn docx_paragraphs_keep_run_spacing() {
        let bytes = zip_of(&[("word/document.xml", DOCX_XML)]);
        let docs = extract_bytes(&bytes, &FileFormat::Docx, "a.docx", &FixedOcr("x")).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content.text(), "Hello world\nSecond paragraph\n");
        assert_eq!(docs[0].content_kind, ContentKind::NativeText);
    }

    #[test]
    fn docx_media_images_become_ocr_documents() {
        let bytes = zip_of(&[
            ("word/document.xml", DOCX_XML),
            ("word/media/image1.png", b"png bytes"),
            ("word/media/image2.emf", b"vector"),
        ]);
        let docs =
            extract_bytes(&bytes, &FileFormat::Docx, "a.docx", &FixedOcr("Figure text")).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].content_kind, ContentKind::OcrExtracted);
        assert_eq!(docs[1].content.text(), "Figure text");
    }

    #[test]
    fn docx_image_ocr_failure_keeps_body_text() {
        let bytes = zip_of(&[
            ("word/document.xml", DOCX_XML),
            ("word/media/image1.png", b"png bytes"),
        ]);
        let docs = extract_bytes(&bytes, &FileFormat::Docx, "a.docx", &FailingOcr).unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn pptx_slides_in_numeric_order() {
        let slide = |text: &str| {
            format!(
                r#"<p:sld xmlns:p="p" xmlns:a="a"><p:txBody><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sld>"#,
                text
            )
        };
        let s1 = slide("first");
        let s2 = slide("second");
        let s10 = slide("tenth");
        let bytes = zip_of(&[
            ("ppt/slides/slide10.xml", s10.as_bytes()),
            ("ppt/slides/slide2.xml", s2.as_bytes()),
            ("ppt/slides/slide1.xml", s1.as_bytes()),
        ]);
        let docs = extract_bytes(&bytes, &FileFormat::Pptx, "deck.pptx", &FixedOcr("")).unwrap();
        assert_eq!(docs[0].content.text(), "first\n\n\nsecond\n\n\ntenth\n");
    }

    #[test]
    fn xlsx_rows_resolve_shared_strings() {
        let shared = br#"<sst><si><t>name</t></si><si><t>value</t></si><si><t>alpha</t></si></sst>"#;
        let sheet = br#"<worksheet><sheetData>
<row><c t="s"><v>0</v></c><c t="s"><v>1</v></c></row>
<row><c t="s"><v>2</v></c><c><v>42</v></c></row>
</sheetData></worksheet>"#;
        let bytes = zip_of(&[
            ("xl/sharedStrings.xml", shared),
            ("xl/worksheets/sheet1.xml", sheet),
        ]);
        let docs = extract_bytes(&bytes, &FileFormat::Xlsx, "t.xlsx", &FixedOcr("")).unwrap();
        assert_eq!(docs[0].content.text(), "name value\nalpha 42");
    }

    #[test]
    fn invalid_zip_is_ooxml_error() {
        let err = extract_bytes(b"not a zip", &FileFormat::Docx, "a.docx", &FixedOcr(""))
            .unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }

    #[test]
    fn invalid_pdf_is_pdf_error() {
        let err =
            extract_bytes(b"not a pdf", &FileFormat::Pdf, "a.pdf", &FixedOcr("")).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    /// One-page PDF whose only resource is `image`, drawn as `/Im1`.
    pub(crate) fn pdf_with_image(image: Option<lopdf::Stream>) -> Vec<u8> {
        use lopdf::{dictionary, Document, Object, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let resources = match image {
            Some(image) => {
                let image_id = doc.add_object(image);
                dictionary! { "XObject" => dictionary! { "Im1" => image_id } }
            }
            None => dictionary! {},
        };
        let resources_id = doc.add_object(resources);
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            b"q 100 0 0 100 0 0 cm /Im1 Do Q".to_vec(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 100.into(), 100.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    fn image_stream(
        color_space: &str,
        bits: i64,
        filter: Option<&str>,
        content: Vec<u8>,
    ) -> lopdf::Stream {
        use lopdf::dictionary;
        let mut dict = lopdf::dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 16,
            "Height" => 8,
            "ColorSpace" => color_space,
            "BitsPerComponent" => bits,
        };
        if let Some(filter) = filter {
            dict.set("Filter", filter);
        }
        lopdf::Stream::new(dict, content)
    }

    fn pdf_with_jpeg_image() -> Vec<u8> {
        pdf_with_image(Some(image_stream(
            "DeviceRGB",
            8,
            Some("DCTDecode"),
            b"jpeg bytes".to_vec(),
        )))
    }

    /// A scanned page stored the common way: 8-bit gray samples, Flate compressed.
    pub(crate) fn pdf_with_flate_image() -> Vec<u8> {
        let mut image = image_stream("DeviceGray", 8, None, vec![200u8; 16 * 8]);
        image.compress().unwrap();
        assert!(image.dict.get(b"Filter").is_ok());
        pdf_with_image(Some(image))
    }

    /// A bilevel scan in an encoding with no decoder available.
    pub(crate) fn pdf_with_fax_image() -> Vec<u8> {
        pdf_with_image(Some(image_stream(
            "DeviceGray",
            1,
            Some("CCITTFaxDecode"),
            b"fax bytes".to_vec(),
        )))
    }

    /// Recognizes only PNG input.
    pub(crate) struct PngOcr;

    impl OcrEngine for PngOcr {
        fn name(&self) -> &str {
            "png-only"
        }
        fn recognize(&self, image: &[u8]) -> anyhow::Result<String> {
            anyhow::ensure!(image.starts_with(b"\x89PNG\r\n\x1a\n"), "not a PNG");
            Ok("recovered scan text".to_string())
        }
    }

    #[test]
    fn pdf_images_are_ocrd_per_page() {
        let bytes = pdf_with_jpeg_image();
        let docs =
            extract_bytes(&bytes, &FileFormat::Pdf, "scan.pdf", &FixedOcr("scanned words"))
                .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content_kind, ContentKind::OcrExtracted);
        assert_eq!(docs[0].content.text(), "[Page 1]\nscanned words");
    }

    #[test]
    fn pdf_with_all_ocr_failures_is_an_error() {
        let bytes = pdf_with_jpeg_image();
        let err = extract_bytes(&bytes, &FileFormat::Pdf, "scan.pdf", &FailingOcr).unwrap_err();
        assert!(matches!(err, ExtractError::Ocr(_)));
    }

    #[test]
    fn flate_compressed_samples_are_reencoded_for_ocr() {
        let bytes = pdf_with_flate_image();
        let docs = extract_bytes(&bytes, &FileFormat::Pdf, "scan.pdf", &PngOcr).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content.text(), "[Page 1]\nrecovered scan text");
    }

    #[test]
    fn pdf_with_only_undecodable_images_is_an_error() {
        let bytes = pdf_with_fax_image();
        let err =
            extract_bytes(&bytes, &FileFormat::Pdf, "fax.pdf", &FixedOcr("text")).unwrap_err();
        assert!(matches!(err, ExtractError::Ocr(reason) if reason.contains("CCITTFaxDecode")));
    }

    #[test]
    fn pdf_without_text_yields_no_document() {
        let imageless = pdf_with_image(None);
        let docs =
            extract_bytes(&imageless, &FileFormat::Pdf, "empty.pdf", &FixedOcr("x")).unwrap();
        assert!(docs.is_empty());

        let blank = pdf_with_jpeg_image();
        let docs = extract_bytes(&blank, &FileFormat::Pdf, "blank.pdf", &FixedOcr("  ")).unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn raw_samples_encode_as_png() {
        let gray = samples_to_png(vec![0u8; 4], 2, 2, Some("DeviceGray"), 8).unwrap();
        assert!(gray.starts_with(b"\x89PNG"));
        let cmyk = samples_to_png(vec![0u8; 16], 2, 2, Some("DeviceCMYK"), 8).unwrap();
        assert!(cmyk.starts_with(b"\x89PNG"));
        let bilevel = samples_to_png(vec![0b1010_0000, 0b0101_0000], 4, 2, None, 1).unwrap();
        assert!(bilevel.starts_with(b"\x89PNG"));

        assert!(samples_to_png(vec![0u8; 3], 2, 2, Some("DeviceGray"), 8).is_err());
        assert!(samples_to_png(vec![0u8; 8], 2, 2, Some("DeviceGray"), 16).is_err());
        assert!(samples_to_png(Vec::new(), 0, 2, None, 8).is_err());
    }

    #[test]
    fn oversized_and_unsupported_files_fail() {
        let dir = tempfile::TempDir::new().unwrap();
        let big: PathBuf = dir.path().join("big.txt");
        std::fs::write(&big, "0123456789").unwrap();
        let err = extract_file(&big, 5, &FixedOcr("")).unwrap_err();
        assert!(matches!(err, ExtractError::TooLarge { size: 10, limit: 5 }));

        let zip = dir.path().join("bundle.zip");
        std::fs::write(&zip, "PK").unwrap();
        let err = extract_file(&zip, 1024, &FixedOcr("")).unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported(ext) if ext == "zip"));
    }

    #[test]
    fn text_files_are_read_lossily() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"caf\xe9 ok").unwrap();
        let docs = extract_file(&path, 1024, &FixedOcr("")).unwrap();
        assert_eq!(docs[0].source_id, "notes.txt");
        assert_eq!(docs[0].content.text(), "caf\u{fffd} ok");
    }
}
