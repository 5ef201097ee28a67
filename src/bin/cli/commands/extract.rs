use std::path::Path;

use anyhow::{Context, Result};

use inkbridge_lib::codec;

use crate::OutputFormat;

pub fn run(file: &Path, format: &OutputFormat) -> Result<()> {
    let document = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let (source, source_format) = codec::decode(&document)
        .with_context(|| format!("{} has no recoverable source", file.display()))?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "format": source_format,
                "source": source,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => print!("{}", source),
    }

    Ok(())
}
