use crate::error::QaError;

/// Extract the text of an uploaded PDF, pages concatenated in order.
/// Fails on unparseable input; there is no partial-result recovery.
pub fn extract_text_from_bytes(data: &[u8]) -> Result<String, QaError> {
    let text = pdf_extract::extract_text_from_mem(data)
        .map_err(|e| QaError::Extraction(format!("Failed to read PDF: {}", e)))?;

    if text.trim().is_empty() {
        return Err(QaError::Extraction(
            "Document contains no extractable text".to_string(),
        ));
    }

    log::info!(
        "Extracted {} words from uploaded PDF",
        text.split_whitespace().count()
    );
    Ok(text)
}

/// Extract the text of a PDF on disk. Used by the CLI `load` command.
pub fn extract_text_from_path(path: &str) -> Result<String, QaError> {
    let text = pdf_extract::extract_text(path)
        .map_err(|e| QaError::Extraction(format!("Failed to read PDF {}: {}", path, e)))?;

    if text.trim().is_empty() {
        return Err(QaError::Extraction(format!(
            "{} contains no extractable text",
            path
        )));
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparseable_bytes_are_an_extraction_error() {
        let err = extract_text_from_bytes(b"not a pdf").unwrap_err();
        assert!(matches!(err, QaError::Extraction(_)));
    }

    #[test]
    fn empty_input_is_an_extraction_error() {
        let err = extract_text_from_bytes(b"").unwrap_err();
        assert!(matches!(err, QaError::Extraction(_)));
    }

    #[test]
    fn missing_file_is_an_extraction_error() {
        let err = extract_text_from_path("/nonexistent/document.pdf").unwrap_err();
        assert!(matches!(err, QaError::Extraction(_)));
    }
}
