//! Single-file and folder conversion, with progress printed to the terminal.

use std::fs;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use console::style;

use crate::config::Settings;
use crate::error::panic_message;
use crate::{is_supported, DocumentConverter};

/// Where converted Markdown lands, relative to a base directory.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    base_dir: PathBuf,
    single_output_dir: String,
    folder_suffix: String,
}

impl OutputLayout {
    pub fn new(base_dir: impl Into<PathBuf>, settings: &Settings) -> Self {
        Self {
            base_dir: base_dir.into(),
            single_output_dir: settings.single_output_dir.clone(),
            folder_suffix: settings.folder_suffix.clone(),
        }
    }

    /// Fixed folder shared by every single-file conversion.
    pub fn single_file_dir(&self) -> PathBuf {
        self.base_dir.join(&self.single_output_dir)
    }

    /// `<folder name><suffix>`, e.g. `relatorios_convertido`.
    pub fn folder_dir(&self, folder: &Path) -> PathBuf {
        self.base_dir
            .join(format!("{}{}", folder_name(folder), self.folder_suffix))
    }
}

/// Last component of `folder`, resolving `.` and `..` through the filesystem.
pub fn folder_name(folder: &Path) -> String {
    folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .or_else(|| {
            fs::canonicalize(folder)
                .ok()?
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_default()
}

/// `<output_dir>/<stem>.md`. Inputs sharing a stem map to the same file.
pub fn output_path(file_path: &Path, output_dir: &Path) -> PathBuf {
    let stem = file_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output_dir.join(format!("{}.md", stem))
}

/// Converts one file and reports the outcome. Conversion and write failures are
/// printed and turned into `Ok(false)`; only a failing terminal returns `Err`.
pub fn convert_single_file<C, W>(
    converter: &C,
    file_path: &Path,
    output_dir: &Path,
    out: &mut W,
) -> io::Result<bool>
where
    C: DocumentConverter + ?Sized,
    W: Write,
{
    let display_name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_path.display().to_string());
    write!(out, "-> Convertendo '{}'...", display_name)?;
    out.flush()?;

    let target = output_path(file_path, output_dir);
    let converted = match panic::catch_unwind(AssertUnwindSafe(|| converter.convert(file_path))) {
        Ok(converted) => converted.map_err(|e| e.to_string()),
        Err(payload) => Err(format!("converter aborted: {}", panic_message(payload.as_ref()))),
    };
    let result = converted
        .and_then(|markdown| fs::write(&target, markdown).map_err(|e| e.to_string()));

    match result {
        Ok(()) => {
            log::info!("{} -> {}", file_path.display(), target.display());
            writeln!(out, "{}", style(" Sucesso!").green())?;
            Ok(true)
        }
        Err(message) => {
            log::info!("{} failed: {}", file_path.display(), message);
            writeln!(out, "{}", style(" Falha!").red())?;
            writeln!(out, "{}", style(format!("   Erro: {}", message)).red())?;
            Ok(false)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
}

/// Immediate entries of `folder` whose name carries a supported extension,
/// in the order the filesystem lists them.
pub fn compatible_files(folder: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        if is_supported(&entry.file_name().to_string_lossy()) {
            files.push(entry.path());
        }
    }
    Ok(files)
}

/// Converts every compatible file of `folder` into `output_dir`, one after the other.
pub fn convert_folder<C, W>(
    converter: &C,
    folder: &Path,
    output_dir: &Path,
    out: &mut W,
) -> io::Result<BatchReport>
where
    C: DocumentConverter + ?Sized,
    W: Write,
{
    let files = compatible_files(folder)?;
    let total = files.len();
    log::debug!("{} compatible files in {}", total, folder.display());

    if files.is_empty() {
        writeln!(
            out,
            "{}",
            style("Nenhum arquivo compatível encontrado na pasta.").yellow()
        )?;
        return Ok(BatchReport {
            total: 0,
            succeeded: 0,
        });
    }

    let mut succeeded = 0;
    for (i, file_path) in files.iter().enumerate() {
        write!(out, "\n[{}/{}] ", i + 1, total)?;
        if convert_single_file(converter, file_path, output_dir, out)? {
            succeeded += 1;
        }
    }

    writeln!(
        out,
        "{}",
        style(format!(
            "\nConcluído! {} de {} arquivos foram convertidos com sucesso.",
            succeeded, total
        ))
        .green()
    )?;

    Ok(BatchReport { total, succeeded })
}
