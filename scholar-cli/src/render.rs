//! Plain-text output for the terminal.

use std::fmt::Write;

use scholar_rag::{Answer, CollectionStats, IngestReport};

/// Characters of chunk text shown under each source.
const PREVIEW_CHARS: usize = 150;

/// The answer followed by its numbered sources.
pub fn render_answer(answer: &Answer) -> String {
    let mut out = format!("{}\n\n", answer.text.trim_end());

    if !answer.has_sources() {
        out.push_str("No sources found: this answer is not grounded in your documents.\n");
        return out;
    }

    out.push_str("Sources:\n");
    for (rank, result) in answer.citations.iter().enumerate() {
        let _ = writeln!(out, "  {}. {}", rank + 1, result.source_name());
        let _ = writeln!(out, "     Similarity: {:.3}", result.score);
        let _ = writeln!(out, "     Preview: {}", preview(&result.chunk.text));
    }
    out
}

/// One line per stored or failed document, then a summary.
pub fn render_report(report: &IngestReport) -> String {
    let mut out = String::new();
    for document in &report.documents {
        let _ = writeln!(out, "  ok    {} ({} chunks)", document.id, document.chunk_count);
    }
    for failure in &report.failures {
        let error = &failure.error;
        let _ = writeln!(out, "  fail  {} [{}] {error}", failure.source, error.kind());
    }
    let _ = writeln!(
        out,
        "Indexed {} documents into {} chunks; {} failed.",
        report.documents.len(),
        report.chunk_count(),
        report.failures.len()
    );
    out
}

/// One line per collection.
pub fn render_stats(stats: &[(String, CollectionStats)]) -> String {
    if stats.is_empty() {
        return "The index is empty.\n".to_string();
    }
    let mut out = String::new();
    for (name, entry) in stats {
        let _ = writeln!(
            out,
            "{name}: {} documents, {} chunks, {} dimensions",
            entry.documents, entry.chunks, entry.dimensions
        );
    }
    out
}

/// First [`PREVIEW_CHARS`] characters on a single line.
fn preview(text: &str) -> String {
    let flat = text.replace(['\n', '\r'], " ");
    let mut chars = flat.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() { format!("{head}...") } else { head }
}
