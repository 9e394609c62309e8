use super::document::Document;

pub const DOCUMENT_SEPARATOR: &str = "\n\n";

/// Joins document texts with a blank line, in the order given.
pub fn format_docs(documents: &[Document]) -> String {
    documents
        .iter()
        .map(|doc| doc.page_content.as_str())
        .collect::<Vec<_>>()
        .join(DOCUMENT_SEPARATOR)
}
