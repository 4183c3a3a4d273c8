//! Thin wrapper over `lopdf` for the two outputs the workbench produces.

mod error;
mod images;
mod merge;

use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use lopdf::Document;
use tokio::task;

pub use error::{PdfError, PdfResult};
pub use images::{ConvertOptions, images_to_pdf};
pub use merge::merge_pdfs;

#[cfg(test)]
pub(crate) use images::tests::{jpeg_bytes, png_bytes};
#[cfg(test)]
pub(crate) use merge::tests::{page_widths, write_test_pdf};

/// Runs [`merge_pdfs`] on the blocking pool.
pub async fn merge_pdfs_blocking(inputs: Vec<PathBuf>, output: PathBuf) -> Result<usize> {
    task::spawn_blocking(move || merge_pdfs(&inputs, &output))
        .await
        .context("PDF merge task panicked")?
        .context("PDF merge failed")
}

/// Runs [`images_to_pdf`] on the blocking pool.
pub async fn images_to_pdf_blocking(
    inputs: Vec<PathBuf>,
    output: PathBuf,
    options: ConvertOptions,
) -> Result<usize> {
    task::spawn_blocking(move || images_to_pdf(&inputs, &output, options))
        .await
        .context("image conversion task panicked")?
        .context("image conversion failed")
}

/// Serializes `doc` to `path`, creating parent directories as needed.
fn write_document(doc: &mut Document, path: &Path) -> PdfResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    doc.save_to(&mut writer)?;
    writer.flush()?;

    Ok(())
}
