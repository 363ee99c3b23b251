use anyhow::{anyhow, Context, Result};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use lopdf::Document as PdfDocument;
use pulldown_cmark::{html, Options, Parser as MdParser};
use quick_xml::escape::unescape;
use scraper::{Html, Selector};
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub content: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone)]
pub struct DocumentMetadata {
    pub file_type: String,
    pub pages: Option<usize>,
    pub char_count: usize,
    pub encoding: String,
}

impl DocumentMetadata {
    fn new(file_type: &str, pages: Option<usize>, content: &str, encoding: &str) -> Self {
        Self {
            file_type: file_type.to_string(),
            pages,
            char_count: content.chars().count(),
            encoding: encoding.to_string(),
        }
    }
}

pub struct DocumentParser;

impl DocumentParser {
    /// Parse a document from disk, dispatching on its extension. Unknown
    /// extensions are read as text.
    pub fn parse(path: &Path) -> Result<ParsedDocument> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        debug!("Parsing file: {:?} (type: {})", path, extension);

        let parsed = match extension.as_str() {
            "pdf" => Self::parse_pdf(path)?,
            "docx" => Self::parse_docx(path)?,
            "md" | "markdown" => Self::parse_markdown(path)?,
            "html" | "htm" => Self::parse_html(path)?,
            _ => Self::parse_text(path)?,
        };

        debug!("Parsed {} characters from {:?}", parsed.metadata.char_count, path);
        Ok(parsed)
    }

    fn parse_pdf(path: &Path) -> Result<ParsedDocument> {
        let doc = PdfDocument::load(path).context("Failed to load PDF file")?;
        let pages = doc.get_pages();

        let mut content = String::new();
        for page_num in pages.keys() {
            match doc.extract_text(&[*page_num]) {
                Ok(text) => {
                    content.push_str(&text);
                    content.push('\n');
                }
                Err(e) => warn!("Failed to extract text from page {}: {}", page_num, e),
            }
        }

        let metadata = DocumentMetadata::new("application/pdf", Some(pages.len()), &content, "UTF-8");
        Ok(ParsedDocument { content, metadata })
    }

    /// DOCX is a zip archive; the body text lives in `word/document.xml`.
    fn parse_docx(path: &Path) -> Result<ParsedDocument> {
        let file = fs::File::open(path).context("Failed to open DOCX file")?;
        let mut archive = zip::ZipArchive::new(file).context("DOCX is not a valid zip archive")?;

        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .context("DOCX has no word/document.xml")?
            .read_to_string(&mut xml)?;

        // Paragraph ends become line breaks before tags are stripped.
        let content = Self::strip_xml_tags(&xml.replace("</w:p>", "</w:p>\n"));

        let metadata = DocumentMetadata::new(
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            None,
            &content,
            "UTF-8",
        );
        Ok(ParsedDocument { content, metadata })
    }

    fn parse_markdown(path: &Path) -> Result<ParsedDocument> {
        let (raw, encoding) = Self::decode_text(&fs::read(path)?);

        let parser = MdParser::new_ext(&raw, Options::all());
        let mut html_output = String::new();
        html::push_html(&mut html_output, parser);

        let content = Self::extract_text_from_html(&html_output)?;
        let metadata = DocumentMetadata::new("text/markdown", None, &content, encoding.name());
        Ok(ParsedDocument { content, metadata })
    }

    fn parse_html(path: &Path) -> Result<ParsedDocument> {
        let (raw, encoding) = Self::decode_text(&fs::read(path)?);

        let content = Self::extract_text_from_html(&raw)?;
        let metadata = DocumentMetadata::new("text/html", None, &content, encoding.name());
        Ok(ParsedDocument { content, metadata })
    }

    fn parse_text(path: &Path) -> Result<ParsedDocument> {
        let (content, encoding) = Self::decode_text(&fs::read(path)?);

        let metadata = DocumentMetadata::new("text/plain", None, &content, encoding.name());
        Ok(ParsedDocument { content, metadata })
    }

    /// Text of every element, skipping script and style contents.
    fn extract_text_from_html(source: &str) -> Result<String> {
        let document = Html::parse_document(source);
        let selector = Selector::parse("body *:not(script):not(style)")
            .map_err(|e| anyhow!("Invalid selector: {:?}", e))?;

        let mut lines = Vec::new();
        for element in document.select(&selector) {
            for text in element.children().filter_map(|n| n.value().as_text()) {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    lines.push(trimmed.to_string());
                }
            }
        }

        Ok(lines.join("\n"))
    }

    /// UTF-8 when valid, otherwise Windows-1252 (never fails).
    fn decode_text(bytes: &[u8]) -> (String, &'static Encoding) {
        if let Ok(text) = std::str::from_utf8(bytes) {
            return (text.to_string(), UTF_8);
        }

        let (decoded, _, _) = WINDOWS_1252.decode(bytes);
        (decoded.into_owned(), WINDOWS_1252)
    }

    /// Tag-free text with XML entities decoded. Text with a malformed
    /// entity is kept as written.
    fn strip_xml_tags(xml: &str) -> String {
        let mut text = String::new();
        let mut inside_tag = false;

        for c in xml.chars() {
            match c {
                '<' => inside_tag = true,
                '>' => inside_tag = false,
                _ if !inside_tag => text.push(c),
                _ => {}
            }
        }

        let decoded = unescape(&text).map(|t| t.into_owned());
        let text = decoded.unwrap_or_else(|e| {
            debug!("Keeping undecoded DOCX text: {}", e);
            text
        });

        text.lines()
            .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
