use anyhow::{Context, Result};

use inkbridge_lib::codec::available_themes;
use inkbridge_lib::config::Settings;

use crate::OutputFormat;

pub fn run(settings: &Settings, format: &OutputFormat) -> Result<()> {
    let mut custom = Vec::new();
    if let Some(dir) = &settings.themes_dir {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read themes directory {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().map_or(false, |ext| ext == "css") {
                if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
                    custom.push(name.to_string());
                }
            }
        }
        custom.sort();
    }

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "builtin": available_themes(),
                "custom": custom,
                "selected": settings.style,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            for name in available_themes() {
                let marker = if name == settings.style { "* " } else { "  " };
                println!("{}{}", marker, name);
            }
            for name in &custom {
                let marker = if *name == settings.style { "* " } else { "  " };
                println!("{}{} (custom)", marker, name);
            }
        }
    }

    Ok(())
}
