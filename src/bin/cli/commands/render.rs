use std::path::Path;

use anyhow::{Context, Result};

use inkbridge_lib::codec::SourceFormat;

use crate::app::App;

pub fn run(app: &App, file: &Path) -> Result<()> {
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let format = file
        .extension()
        .and_then(|ext| ext.to_str())
        .map(SourceFormat::from_extension)
        .unwrap_or(SourceFormat::Plain);

    println!("{}", app.codec.encode(&source, format));
    Ok(())
}
