mod side_files;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use xnb_core::format::{platform_name, version_name, Compression, Prologue};
use xnb_core::{ByteReader, JsonDocument};

use crate::side_files::DirSideFiles;

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "xnb", about = "Unpack XNB content files to JSON and pack them back", version)]
struct Cli {
    /// Enable verbose debug printing
    #[arg(long, global = true, conflicts_with = "only_errors")]
    debug: bool,
    /// Only print error messages
    #[arg(long, global = true)]
    only_errors: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Unpack an XNB file, or every XNB file under a directory, to JSON
    Unpack {
        /// XNB file or directory
        input: PathBuf,
        /// Output file or directory (default: next to the input)
        output: Option<PathBuf>,
    },
    /// Pack a JSON file, or every JSON file under a directory, to XNB
    Pack {
        /// JSON file or directory
        input: PathBuf,
        /// Output file or directory (default: next to the input)
        output: Option<PathBuf>,
    },
    /// Print the header and reader table of an XNB file
    Inspect {
        /// XNB file to inspect
        file: PathBuf,
    },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Unpack,
    Pack,
}

impl Mode {
    fn source_ext(self) -> &'static str {
        match self {
            Mode::Unpack => "xnb",
            Mode::Pack => "json",
        }
    }

    fn target_ext(self) -> &'static str {
        match self {
            Mode::Unpack => "json",
            Mode::Pack => "xnb",
        }
    }

    fn run(self, input: &Path, output: &Path) -> anyhow::Result<()> {
        match self {
            Mode::Unpack => unpack_file(input, output),
            Mode::Pack => pack_file(input, output),
        }
    }
}

/// Success and failure counts over a batch.
#[derive(Default)]
struct Tally {
    ok: usize,
    failed: Vec<PathBuf>,
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn init_logging(debug: bool, only_errors: bool) {
    let level = if debug {
        "debug"
    } else if only_errors {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn has_ext(path: &Path, ext: &str) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn with_ext(dir: &Path, file: &Path, ext: &str) -> PathBuf {
    let mut name = file.file_stem().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(ext);
    dir.join(name)
}

/// Every file under `dir`, depth first, in name order.
fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("reading directory {}", dir.display()))?
        .map(|e| e.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();
    for path in entries {
        if path.is_dir() {
            walk(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

fn write_json(path: &Path, doc: &JsonDocument) -> anyhow::Result<()> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    doc.serialize(&mut ser)?;
    buf.push(b'\n');
    fs::write(path, buf).with_context(|| format!("writing {}", path.display()))
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn unpack_file(input: &Path, output: &Path) -> anyhow::Result<()> {
    info!(file = %input.display(), "reading");
    let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let doc = xnb_codecs::unpack(&bytes)?;

    if let Some(dir) = output.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let mut files = DirSideFiles::for_document(output);
    let json = xnb_codecs::export_document(&doc, &mut files)?;
    write_json(output, &json)?;
    info!(file = %output.display(), "saved");
    Ok(())
}

fn pack_file(input: &Path, output: &Path) -> anyhow::Result<()> {
    info!(file = %input.display(), "reading");
    let text = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let json: JsonDocument =
        serde_json::from_slice(&text).with_context(|| format!("{} is not an unpacked XNB document", input.display()))?;

    let mut files = DirSideFiles::for_document(input);
    let doc = xnb_codecs::import_document(&json, &mut files)?;
    let bytes = xnb_codecs::pack(&doc)?;

    if let Some(dir) = output.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    fs::write(output, bytes).with_context(|| format!("writing {}", output.display()))?;
    info!(file = %output.display(), "saved");
    Ok(())
}

fn convert(mode: Mode, input: &Path, output: &Path, tally: &mut Tally) {
    match mode.run(input, output) {
        Ok(()) => tally.ok += 1,
        Err(e) => {
            error!(file = %input.display(), "{e:#}");
            tally.failed.push(input.to_path_buf());
        }
    }
}

fn run_batch(mode: Mode, input: PathBuf, output: Option<PathBuf>) -> anyhow::Result<Tally> {
    let mut tally = Tally::default();

    if !input.is_dir() {
        let output = match output {
            None => with_ext(input.parent().unwrap_or(Path::new("")), &input, mode.target_ext()),
            Some(out) if out.is_dir() => with_ext(&out, &input, mode.target_ext()),
            Some(out) => out,
        };
        convert(mode, &input, &output, &mut tally);
        return Ok(tally);
    }

    let output = output.unwrap_or_else(|| input.clone());
    let mut files = Vec::new();
    walk(&input, &mut files)?;
    for file in files.iter().filter(|f| has_ext(f, mode.source_ext())) {
        let relative = file.strip_prefix(&input)?;
        let target_dir = output.join(relative.parent().unwrap_or(Path::new("")));
        let target = with_ext(&target_dir, file, mode.target_ext());
        convert(mode, file, &target, &mut tally);
    }
    Ok(tally)
}

fn run_inspect(file: PathBuf) -> anyhow::Result<()> {
    let bytes = fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
    let prologue = Prologue::read(&mut ByteReader::new(&bytes))?;
    let header = prologue.header();

    println!("=== XNB File: {} ===", file.display());
    println!();
    println!(
        "  target         : {} ({})",
        header.target,
        platform_name(header.target).unwrap_or("unknown")
    );
    println!(
        "  format version : {} ({})",
        header.format_version,
        version_name(header.format_version).unwrap_or("unknown")
    );
    println!("  hidef          : {}", header.hidef);
    let compression = match prologue.compression() {
        Compression::None => "none",
        Compression::Lzx => "lzx",
        Compression::Lz4 => "lz4",
    };
    println!("  compression    : {compression}");
    println!("  file size      : {} bytes", prologue.file_size);
    if let Some(raw) = prologue.decompressed_size {
        println!("  decompressed   : {raw} bytes");
    }

    let doc = xnb_codecs::unpack(&bytes)?;
    println!();
    println!("  {:>5}  {:>7}  reader", "index", "version");
    println!("  {}", "-".repeat(66));
    for (i, entry) in doc.readers.iter().enumerate() {
        println!("  {:>5}  {:>7}  {}", i + 1, entry.version, entry.type_name);
    }
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.debug, cli.only_errors);

    let tally = match cli.command {
        Commands::Unpack { input, output } => run_batch(Mode::Unpack, input, output)?,
        Commands::Pack { input, output } => run_batch(Mode::Pack, input, output)?,
        Commands::Inspect { file } => {
            run_inspect(file)?;
            return Ok(ExitCode::SUCCESS);
        }
    };

    eprintln!("Success {}", tally.ok);
    eprintln!("Fail    {}", tally.failed.len());
    for path in &tally.failed {
        eprintln!("  {}", path.display());
    }
    Ok(if tally.failed.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_paths_swap_extensions() {
        let out = with_ext(Path::new("out/sub"), Path::new("content/Fonts/Small.XNB"), "json");
        assert_eq!(out, PathBuf::from("out/sub/Small.json"));
        let dotted = with_ext(Path::new("."), Path::new("Strings.en-US.json"), "xnb");
        assert_eq!(dotted, PathBuf::from("./Strings.en-US.xnb"));
        assert!(has_ext(Path::new("a/b.XNB"), "xnb"));
        assert!(!has_ext(Path::new("a/b.xnb.bak"), "xnb"));
    }

    #[test]
    fn cli_flags_parse() {
        let cli = Cli::try_parse_from(["xnb", "unpack", "in.xnb", "--debug"]).unwrap();
        assert!(cli.debug);
        assert!(matches!(cli.command, Commands::Unpack { output: None, .. }));
        assert!(Cli::try_parse_from(["xnb", "--debug", "--only-errors", "pack", "x"]).is_err());
    }
}
