use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Arg, Command};
use markitup::config::SETTINGS;
use markitup::{DocumentConverter, MarkItUp};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let matches = Command::new("markitup-cli")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Converts a single document to Markdown")
        .arg(
            Arg::new("input")
                .help("Input file path")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("PATH")
                .help("Write the Markdown to this file instead of stdout"),
        )
        .arg(
            Arg::new("image-path")
                .short('i')
                .long("image-path")
                .value_name("DIR")
                .help("Save embedded images here instead of inlining them as base64"),
        )
        .get_matches();

    let input = matches
        .get_one::<String>("input")
        .map(PathBuf::from)
        .context("missing input path")?;

    let mut settings = SETTINGS.clone();
    if let Some(image_path) = matches.get_one::<String>("image-path") {
        settings.image_path = PathBuf::from(image_path);
    }

    let markdown = MarkItUp::new(settings)
        .convert(&input)
        .with_context(|| format!("could not convert '{}'", input.display()))?;

    match matches.get_one::<String>("output") {
        Some(output) => {
            fs::write(output, &markdown).with_context(|| format!("could not write '{}'", output))?;
            println!("Output written to: {}", output);
        }
        None => println!("{}", markdown),
    }
    Ok(())
}
