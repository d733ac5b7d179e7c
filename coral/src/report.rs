//! Files handed to the user after a search.
//!
//! Every search writes its result list (one absolute path per line) to scratch
//! storage. A Markdown report with `file://` links grouped by kind can be written
//! next to it.
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::SearchResult;
use crate::filters::is_document;
use crate::query::SearchRequest;
use crate::results::{MatchOrigin, SearchOutput};

/// `<temp dir>/coral`
pub fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join("coral")
}

/// Local time formatted for file names, e.g. `2024-05-01--13-45-10`
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d--%H-%M-%S").to_string()
}

fn scratch_file(dir: &Path, stamp: &str, extension: &str) -> SearchResult<PathBuf> {
    fs::create_dir_all(dir)?;
    Ok(dir.join(format!("coral-search--{}.{}", stamp, extension)))
}

/// Writes the newline-delimited result list and returns its path
pub fn write_results_list(
    dir: &Path,
    stamp: &str,
    output: &SearchOutput,
) -> SearchResult<PathBuf> {
    let path = scratch_file(dir, stamp, "txt")?;
    fs::write(&path, output.results.to_list_string())?;
    Ok(path)
}

/// Writes the Markdown report and returns its path
pub fn write_markdown_report(
    dir: &Path,
    stamp: &str,
    request: &SearchRequest,
    output: &SearchOutput,
) -> SearchResult<PathBuf> {
    let path = scratch_file(dir, stamp, "md")?;
    let date = chrono::Local::now().format("%a %b %e %H:%M:%S %Y").to_string();
    fs::write(&path, render_markdown(request, output, &date))?;
    Ok(path)
}

/// Renders the report body
pub fn render_markdown(request: &SearchRequest, output: &SearchOutput, date: &str) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# Search Results\n");
    let _ = writeln!(md, "**Search term:** {}\n", request.query().raw());
    let _ = writeln!(md, "**Search type:** {}\n", request.mode());
    let _ = writeln!(md, "**Search location:** {}\n", request.root().display());
    let _ = writeln!(md, "**Date:** {}\n", date);
    let _ = writeln!(md, "---\n");

    if output.documents_skipped {
        let _ = writeln!(md, "## Note");
        let _ = writeln!(md, "PDF text extraction is unavailable. PDF files were not searched.");
        let _ = writeln!(
            md,
            "To enable PDF searching, install `pdftotext` (poppler-utils).\n"
        );
    }

    let content: Vec<&Path> = output
        .results
        .by_origin(MatchOrigin::Content)
        .map(|m| m.path.as_path())
        .collect();
    let names: Vec<&Path> = output
        .results
        .by_origin(MatchOrigin::Name)
        .map(|m| m.path.as_path())
        .collect();

    section(
        &mut md,
        "Regular Files",
        content.iter().copied().filter(|p| !is_document(p)),
    );
    section(
        &mut md,
        "PDF Files",
        content.iter().copied().filter(|p| is_document(p)),
    );
    if !output.name_phase_skipped {
        section(&mut md, "Name Matches", names.into_iter());
    }
    md
}

fn section<'a>(md: &mut String, title: &str, paths: impl Iterator<Item = &'a Path>) {
    let _ = writeln!(md, "## {}\n", title);
    for path in paths {
        let _ = writeln!(md, "- {}", file_url(path));
    }
    md.push('\n');
}

/// `file://` URL for an absolute path, percent-encoding each segment
pub fn file_url(path: &Path) -> String {
    let normalized = path.to_string_lossy().replace('\\', "/");
    let encoded = normalized
        .split('/')
        .enumerate()
        .map(|(i, segment)| {
            // Keep a Windows drive letter such as `C:` readable
            if i == 0 && segment.len() == 2 && segment.ends_with(':') {
                segment.to_string()
            } else {
                urlencoding::encode(segment).into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("/");

    if encoded.starts_with('/') {
        format!("file://{}", encoded)
    } else {
        format!("file:///{}", encoded)
    }
}
