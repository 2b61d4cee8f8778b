//! Output files and optional LaTeX compilation.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::document::Document;

/// Time stamp format used in output file names.
pub const TIMESTAMP_FORMAT: &str = "%d-%m-%Y_%H-%M-%S";

pub fn timestamp(at: &DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// File stem `<gene>_<transcript>_<timestamp>`.
pub fn output_stem(gene_name: &str, identifier: &str, timestamp: &str) -> String {
    format!("{gene_name}_{identifier}_{timestamp}")
}

/// Writes a document as `<dir>/<stem>.<ext>`, creating `dir` if needed.
/// Trailing whitespace is stripped from every line.
pub fn write_document(dir: &Path, stem: &str, document: &Document) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{stem}.{}", document.mode.extension()));
    let mut out = io::BufWriter::new(fs::File::create(&path)?);
    for line in &document.lines {
        writeln!(out, "{}", line.trim_end())?;
    }
    out.flush()?;
    info!(path = %path.display(), lines = document.lines.len(), "document written");
    Ok(path)
}

/// Runs the LaTeX compiler on `tex_path` and removes its by-products.
///
/// Compiler failures are logged and reported as `false`; they never abort
/// the run.
pub fn compile(latex_command: &str, tex_path: &Path, keep_extensions: &[String]) -> bool {
    let dir = tex_path.parent().unwrap_or_else(|| Path::new("."));
    debug!(command = latex_command, file = %tex_path.display(), "compiling");

    let status = Command::new(latex_command)
        .arg("-interaction=batchmode")
        .arg("-output-directory")
        .arg(dir)
        .arg(tex_path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    let compiled = match status {
        Ok(status) if status.success() => true,
        Ok(status) => {
            warn!(file = %tex_path.display(), %status, "LaTeX compilation failed");
            false
        }
        Err(e) => {
            warn!(command = latex_command, error = %e, "could not run LaTeX compiler");
            false
        }
    };

    if let Some(stem) = tex_path.file_stem().and_then(|s| s.to_str()) {
        match clean_up(dir, stem, keep_extensions) {
            Ok(removed) if removed > 0 => debug!(removed, "removed compiler by-products"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "could not clean up compiler output"),
        }
    }
    compiled
}

/// Removes files named `<stem>.<ext>` in `dir` whose extension is not kept.
pub fn clean_up(dir: &Path, stem: &str, keep_extensions: &[String]) -> io::Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.file_stem().and_then(|s| s.to_str()) != Some(stem) {
            continue;
        }
        let keep = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| keep_extensions.iter().any(|k| k.eq_ignore_ascii_case(ext)));
        if !keep {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}
