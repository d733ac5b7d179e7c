use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Program used when nothing else is configured
pub const DEFAULT_EXTRACTOR: &str = "pdftotext";

/// Turns a document into plain text
pub trait TextExtractor: Send + Sync {
    /// Short name used in log messages
    fn name(&self) -> &str;

    /// Whether the extractor can run at all on this machine
    fn is_available(&self) -> bool;

    /// Extracts the text of `path`, or `None` if the document could not be read
    fn extract(&self, path: &Path) -> Option<String>;
}

/// Runs an external `pdftotext`-compatible program as `<program> <file> -`
#[derive(Debug, Clone)]
pub struct PdfToText {
    program: PathBuf,
}

impl PdfToText {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for PdfToText {
    fn default() -> Self {
        Self::new(DEFAULT_EXTRACTOR)
    }
}

impl TextExtractor for PdfToText {
    fn name(&self) -> &str {
        self.program
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(DEFAULT_EXTRACTOR)
    }

    fn is_available(&self) -> bool {
        // pdftotext -v exits non-zero on some builds, so only a failed spawn counts
        Command::new(&self.program)
            .arg("-v")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
    }

    fn extract(&self, path: &Path) -> Option<String> {
        let output = Command::new(&self.program)
            .arg(path)
            .arg("-")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output();

        match output {
            Ok(output) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(output) => {
                debug!(
                    "{} failed on {} with {}",
                    self.name(),
                    path.display(),
                    output.status
                );
                None
            }
            Err(e) => {
                debug!("Could not run {}: {}", self.program.display(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_unavailable() {
        let extractor = PdfToText::new("/nonexistent/coral-pdftotext");
        assert!(!extractor.is_available());
        assert_eq!(extractor.extract(Path::new("a.pdf")), None);
        assert_eq!(extractor.name(), "coral-pdftotext");
    }

    #[cfg(unix)]
    #[test]
    fn test_extract_reads_stdout() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-pdftotext");
        std::fs::write(&script, "#!/bin/sh\n[ \"$1\" = \"-v\" ] && exit 0\ncat \"$1\"\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let doc = dir.path().join("doc.pdf");
        std::fs::write(&doc, "extracted words").unwrap();

        let extractor = PdfToText::new(&script);
        assert!(extractor.is_available());
        assert_eq!(extractor.extract(&doc).as_deref(), Some("extracted words"));
        assert_eq!(extractor.extract(&dir.path().join("missing.pdf")), None);
    }
}
