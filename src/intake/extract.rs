/// Maximum text to extract (100KB) to avoid bloating the index.
const MAX_TEXT_LEN: usize = 102_400;

/// Extract text content from an accepted payload based on its MIME type.
///
/// Returns `None` for scanned images and Office formats, which need an OCR
/// or document-conversion service this crate does not provide.
pub fn extract_text(data: &[u8], mime_type: &str) -> Option<String> {
    let mime = mime_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "text/plain" | "text/markdown" | "text/csv" | "text/html" | "text/xml"
        | "application/json" | "application/xml" => {
            truncate_text(String::from_utf8_lossy(data).into_owned())
        }

        "application/pdf" => extract_pdf(data),

        t if t.starts_with("image/") => None,

        "application/msword"
        | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        | "application/vnd.ms-excel"
        | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => None,

        // Unknown types: accept valid UTF-8 only
        _ => match std::str::from_utf8(data) {
            Ok(text) => truncate_text(text.to_string()),
            Err(_) => None,
        },
    }
}

fn truncate_text(mut text: String) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    if text.len() > MAX_TEXT_LEN {
        let mut end = MAX_TEXT_LEN;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    Some(text)
}

fn extract_pdf(data: &[u8]) -> Option<String> {
    #[cfg(feature = "pdf")]
    {
        match pdf_extract::extract_text_from_mem(data) {
            Ok(text) => truncate_text(text),
            Err(e) => {
                tracing::warn!("PDF text extraction failed: {e}");
                None
            }
        }
    }
    #[cfg(not(feature = "pdf"))]
    {
        let _ = data;
        tracing::debug!("PDF text extraction requires the pdf feature");
        None
    }
}

/// Guess MIME type from filename extension.
pub fn guess_mime_type(filename: &str) -> String {
    let ext = match filename.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => String::new(),
    };
    match ext.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "csv" => "text/csv",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "tif" | "tiff" => "image/tiff",
        "txt" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "json" => "application/json",
        "xml" => "application/xml",
        "html" | "htm" => "text/html",
        "gif" => "image/gif",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::gatekeeper::DEFAULT_ALLOWED_TYPES;

    #[test]
    fn csv_is_decoded() {
        let text = extract_text(b"vendor,amount\nAcme,100\n", "text/csv; charset=utf-8");
        assert_eq!(text.as_deref(), Some("vendor,amount\nAcme,100\n"));
    }

    #[test]
    fn images_and_office_documents_yield_nothing() {
        assert_eq!(extract_text(b"\x89PNG", "image/png"), None);
        assert_eq!(extract_text(b"PK\x03\x04", "application/vnd.ms-excel"), None);
        assert_eq!(extract_text(b"plain words", "application/msword"), None);
    }

    #[test]
    fn blank_text_yields_nothing() {
        assert_eq!(extract_text(b"  \n ", "text/plain"), None);
    }

    #[test]
    fn long_text_is_truncated_on_char_boundary() {
        let text = "é".repeat(MAX_TEXT_LEN);
        let out = extract_text(text.as_bytes(), "text/plain").unwrap();
        assert!(out.len() <= MAX_TEXT_LEN);
        assert!(out.chars().all(|c| c == 'é'));
    }

    #[test]
    fn unknown_binary_yields_nothing() {
        assert_eq!(extract_text(&[0xff, 0xfe, 0x00], "application/octet-stream"), None);
    }

    #[test]
    fn every_allowed_type_has_an_extension() {
        for name in ["a.pdf", "a.doc", "a.docx", "a.xls", "a.xlsx", "a.csv", "a.png", "a.jpg", "a.tiff"] {
            let mime = guess_mime_type(name);
            assert!(DEFAULT_ALLOWED_TYPES.contains(&mime.as_str()), "{name} -> {mime}");
        }
        assert_eq!(guess_mime_type("archive.ZIP"), "application/zip");
        assert_eq!(guess_mime_type("README"), "application/octet-stream");
    }
}
