mod config;
mod layout;
mod pdf;
mod writer;

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;

use config::{Dimension, LabelStyle, load_label_csv, load_template, preset, sequential_labels};
use pdf::{LabelFont, PdfCanvas};
use writer::LabelSheetWriter;

/// Generate a PDF sheet of QR code labels.
#[derive(Parser, Debug)]
#[command(name = "qr_label_sheet")]
#[command(about = "Generate a PDF sheet of QR code labels.", long_about = None)]
struct Args {
    /// Group number shared by every label
    #[arg(long, default_value_t = 590)]
    group: u32,

    /// First label id; following labels count up from here
    #[arg(long, default_value_t = 12729239)]
    start_id: u64,

    /// Number of labels to generate
    #[arg(long, default_value_t = 24)]
    count: u64,

    /// CSV file with `group,id` rows; replaces --group, --start-id and --count
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Built-in sheet template
    #[arg(long, default_value = "avery-22805")]
    sheet: String,

    /// Sheet template JSON file; overrides --sheet
    #[arg(long)]
    template: Option<PathBuf>,

    /// Host encoded in each label's URL
    #[arg(long, default_value = config::DEFAULT_HOST)]
    host: String,

    /// Attribution line printed on every label
    #[arg(long, default_value = config::DEFAULT_BYLINE)]
    byline: String,

    /// Text size, e.g. "8 pt" or "3 mm"
    #[arg(long, default_value = "8 pt")]
    text_size: Dimension,

    /// Standard font (Helvetica, Courier), TrueType file or installed family
    #[arg(long, default_value = config::DEFAULT_FONT)]
    font: String,

    /// Write the PDF here instead of standard output
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn run(args: Args) -> Result<()> {
    let sheet = match &args.template {
        Some(path) => load_template(path)?,
        None => preset(&args.sheet)?,
    };
    log::info!(
        "sheet: {}x{} labels of {} x {} pt on {} x {} pt pages",
        sheet.cols,
        sheet.rows,
        sheet.label_width,
        sheet.label_height,
        sheet.page_width,
        sheet.page_height
    );

    let labels = match &args.labels {
        Some(path) => load_label_csv(path)?,
        None => sequential_labels(args.group, args.start_id, args.count)?,
    };
    log::info!("generating {} labels", labels.len());

    let style = LabelStyle {
        host: args.host,
        byline: args.byline,
        text_size: args.text_size.as_points(),
        font: args.font,
    };
    let font = LabelFont::resolve(&style.font)?;
    log::info!("using font {}", font.name());

    let canvas = PdfCanvas::new(font)?;
    let mut writer = LabelSheetWriter::new(sheet, style, canvas)?;
    for label in &labels {
        writer.write(label.group, label.id)?;
    }
    let canvas = writer.finish()?;
    let page_count = canvas.page_count();
    let bytes = canvas.to_bytes()?;

    match &args.output {
        Some(path) => std::fs::write(path, &bytes)
            .with_context(|| format!("Failed to write {:?}", path))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(&bytes)
                .and_then(|_| stdout.flush())
                .context("Failed to write PDF to standard output")?;
        }
    }
    log::info!("wrote {} pages ({} bytes)", page_count, bytes.len());

    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        for cause in e.chain().skip(1) {
            eprintln!("Caused by: {}", cause);
        }
        std::process::exit(1);
    }
}
