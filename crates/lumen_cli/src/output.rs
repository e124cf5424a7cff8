//! Output sink for finished renders.
//!
//! The sink opens a sibling temporary file before rendering starts, so an
//! unwritable directory fails fast. The target path is only replaced once
//! the image has been fully encoded; a failed run leaves it untouched.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::{ColorType, ImageFormat};
use lumen_renderer::Raster;

/// An image file being written through a temporary sibling.
pub struct OutputSink {
    path: PathBuf,
    partial_path: PathBuf,
    format: ImageFormat,
    writer: BufWriter<File>,
    committed: bool,
}

impl OutputSink {
    /// Pick the encoder from the extension and open a temporary file next
    /// to `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let format = match ImageFormat::from_path(&path) {
            Ok(format @ (ImageFormat::Png | ImageFormat::Tga)) => format,
            Ok(format) => bail!("Unsupported output format {:?} for {}", format, path.display()),
            Err(_) => bail!(
                "Cannot infer output format from {}; use .png or .tga",
                path.display()
            ),
        };

        let partial_path = partial_path_for(&path)?;
        let file = File::create(&partial_path)
            .with_context(|| format!("Failed to create output file next to {}", path.display()))?;

        Ok(Self {
            path,
            partial_path,
            format,
            writer: BufWriter::new(file),
            committed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encode the raster, then move it over the target path.
    pub fn write(mut self, raster: &Raster) -> Result<()> {
        image::write_buffer_with_format(
            &mut self.writer,
            raster.as_bytes(),
            raster.width(),
            raster.height(),
            ColorType::Rgba8,
            self.format,
        )
        .with_context(|| format!("Failed to encode {}", self.path.display()))?;

        self.writer
            .flush()
            .and_then(|()| self.writer.get_ref().sync_all())
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        fs::rename(&self.partial_path, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for OutputSink {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(err) = fs::remove_file(&self.partial_path) {
            log::warn!(
                "Could not remove partial output {}: {}",
                self.partial_path.display(),
                err
            );
        }
    }
}

/// `dir/.name.partial` for `dir/name`.
fn partial_path_for(path: &Path) -> Result<PathBuf> {
    let Some(name) = path.file_name() else {
        bail!("Output path {} has no file name", path.display());
    };
    let mut partial = OsString::from(".");
    partial.push(name);
    partial.push(".partial");
    Ok(path.with_file_name(partial))
}
