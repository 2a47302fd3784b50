use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use crunch_core::format::has_magic;
use crunch_core::{
    Alignment, AtlasFlags, DecodeFormat, Format, LegacyHeader, PackerConfig, SortOrder, decode,
    encode_report, find_image, pack_images,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

mod cache;
mod input;

use cache::BuildCache;
use input::{Preprocess, gather_paths, load_sources_with_progress};

#[derive(Parser, Debug)]
#[command(
    name = "crunch",
    about = "Pack sprites into texture atlases",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Show progress bars (disable with --progress false or --quiet)
    #[arg(long, default_value_t = true, action=ArgAction::Set, global=true, help_heading = "Logging/UX")]
    progress: bool,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action=ArgAction::Count, global=true, help_heading = "Logging/UX")]
    verbose: u8,
    /// Quiet mode (overrides verbose)
    #[arg(
        short,
        long,
        default_value_t = false,
        global = true,
        help_heading = "Logging/UX"
    )]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pack images into one or more atlases
    Pack(PackArgs),
    /// Look up one image in a compact binary atlas without decoding it all
    Lookup(LookupArgs),
    /// Decode an atlas document of any format and print it as JSON
    Dump(DumpArgs),
}

#[derive(Parser, Debug, Clone)]
struct PackArgs {
    // Input/Output
    /// Input files or directories
    #[arg(required = true, help_heading = "Input/Output")]
    inputs: Vec<PathBuf>,
    /// Output directory
    #[arg(short, long, default_value = "out", help_heading = "Input/Output")]
    out_dir: PathBuf,
    /// Atlas base name (files will be NAME.png, NAME1.png, ... plus metadata)
    #[arg(short, long, default_value = "atlas", help_heading = "Input/Output")]
    name: String,
    /// YAML config file path (keys override the options below)
    #[arg(long, help_heading = "Input/Output")]
    config: Option<PathBuf>,
    /// Include patterns (glob). If set, only files matching any pattern are considered
    #[arg(long, help_heading = "Input/Output")]
    include: Vec<String>,
    /// Exclude patterns (glob). Files matching any pattern will be ignored
    #[arg(long, help_heading = "Input/Output")]
    exclude: Vec<String>,
    /// Repack even when inputs and options are unchanged
    #[arg(short, long, default_value_t = false, help_heading = "Input/Output")]
    force: bool,

    // Layout
    /// Max atlas size (power of two)
    #[arg(short, long, default_value_t = 4096, help_heading = "Layout")]
    size: u32,
    /// Padding between images
    #[arg(short, long, default_value_t = 1, help_heading = "Layout")]
    padding: u32,
    /// Sort order: area_desc|max_side_desc|height_desc|width_desc|name_asc|none
    #[arg(long, default_value = "area_desc", help_heading = "Layout")]
    sort_order: String,
    /// Allow 90° clockwise rotation
    #[arg(short, long, default_value_t = false, help_heading = "Layout")]
    rotate: bool,
    /// Share one copy of identical images
    #[arg(short, long, default_value_t = false, help_heading = "Layout")]
    unique: bool,

    // Image Processing
    /// Premultiply colour by alpha
    #[arg(long, default_value_t = false, help_heading = "Image Processing")]
    premultiply: bool,
    /// Trim transparent borders
    #[arg(short, long, default_value_t = false, help_heading = "Image Processing")]
    trim: bool,
    /// Trim alpha threshold (0..=255)
    #[arg(long, default_value_t = 0, help_heading = "Image Processing")]
    trim_threshold: u8,

    // Export
    /// Write XML metadata (default when no format is chosen)
    #[arg(long, default_value_t = false, help_heading = "Export")]
    xml: bool,
    /// Write JSON metadata
    #[arg(long, default_value_t = false, help_heading = "Export")]
    json: bool,
    /// Write legacy binary metadata (.bin)
    #[arg(long, default_value_t = false, help_heading = "Export")]
    binary: bool,
    /// Write compact binary metadata (.crch)
    #[arg(long, default_value_t = false, help_heading = "Export")]
    compact: bool,
    /// Record size of compact output: 64|128|256|512|1024|2048|4096
    #[arg(long, default_value_t = 4096, help_heading = "Export")]
    alignment: u16,
    /// Print the merged configuration (after CLI/YAML) and exit
    #[arg(long, default_value_t = false, help_heading = "Export")]
    print_config: bool,
    /// Output format for --print-config: json|yaml
    #[arg(long, default_value = "json", value_parser = ["json", "yaml"], help_heading = "Export")]
    print_config_format: String,
}

#[derive(Parser, Debug, Clone)]
struct LookupArgs {
    /// Compact binary atlas file
    file: PathBuf,
    /// Image name
    name: String,
}

#[derive(Parser, Debug, Clone)]
struct DumpArgs {
    /// Atlas file (.xml, .json, .bin or .crch)
    file: PathBuf,
    /// Legacy binary files were written with trim on
    #[arg(long, default_value_t = false)]
    legacy_trim: bool,
    /// Legacy binary files were written with rotation on
    #[arg(long, default_value_t = false)]
    legacy_rotate: bool,
}

/// Everything that determines the output of `crunch pack`.
#[derive(Debug, Clone, Serialize)]
struct Settings {
    #[serde(flatten)]
    packer: PackerConfig,
    trim_threshold: u8,
    alignment: Alignment,
    xml: bool,
    json: bool,
    binary: bool,
    compact: bool,
}

impl Settings {
    fn from_args(args: &PackArgs) -> anyhow::Result<Self> {
        let packer = PackerConfig::builder()
            .max_size(args.size)
            .padding(args.padding)
            .premultiply(args.premultiply)
            .trim(args.trim)
            .rotate(args.rotate)
            .unique(args.unique)
            .sort_order(args.sort_order.parse::<SortOrder>()?)
            .build();
        let mut s = Self {
            packer,
            trim_threshold: args.trim_threshold,
            alignment: Alignment::new(args.alignment)?,
            xml: args.xml,
            json: args.json,
            binary: args.binary,
            compact: args.compact,
        };
        if let Some(path) = &args.config {
            let file =
                fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
            let y: YamlConfig = serde_yaml::from_str(&file)
                .with_context(|| format!("parse {}", path.display()))?;
            y.apply(&mut s)?;
        }
        if !(s.xml || s.json || s.binary || s.compact) {
            s.xml = true;
        }
        s.packer.validate()?;
        Ok(s)
    }

    fn formats(&self) -> Vec<Format> {
        let mut out = Vec::new();
        if self.xml {
            out.push(Format::Xml);
        }
        if self.json {
            out.push(Format::Json);
        }
        if self.binary {
            out.push(Format::Binary);
        }
        if self.compact {
            out.push(Format::Compact(self.alignment));
        }
        out
    }

    fn preprocess(&self) -> Preprocess {
        Preprocess {
            premultiply: self.packer.premultiply,
            trim: self.packer.trim,
            trim_threshold: self.trim_threshold,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct YamlConfig {
    size: Option<u32>,
    padding: Option<u32>,
    sort_order: Option<String>,
    premultiply: Option<bool>,
    trim: Option<bool>,
    trim_threshold: Option<u8>,
    rotate: Option<bool>,
    unique: Option<bool>,
    alignment: Option<u16>,
    xml: Option<bool>,
    json: Option<bool>,
    binary: Option<bool>,
    compact: Option<bool>,
}

impl YamlConfig {
    fn apply(self, s: &mut Settings) -> anyhow::Result<()> {
        if let Some(v) = self.size {
            s.packer.max_size = v;
        }
        if let Some(v) = self.padding {
            s.packer.padding = v;
        }
        if let Some(v) = self.sort_order {
            s.packer.sort_order = v.parse()?;
        }
        if let Some(v) = self.premultiply {
            s.packer.premultiply = v;
        }
        if let Some(v) = self.trim {
            s.packer.trim = v;
        }
        if let Some(v) = self.trim_threshold {
            s.trim_threshold = v;
        }
        if let Some(v) = self.rotate {
            s.packer.rotate = v;
        }
        if let Some(v) = self.unique {
            s.packer.unique = v;
        }
        if let Some(v) = self.alignment {
            s.alignment = Alignment::new(v)?;
        }
        if let Some(v) = self.xml {
            s.xml = v;
        }
        if let Some(v) = self.json {
            s.json = v;
        }
        if let Some(v) = self.binary {
            s.binary = v;
        }
        if let Some(v) = self.compact {
            s.compact = v;
        }
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(cli.quiet, cli.verbose);
    match &cli.command {
        Commands::Pack(args) => run_pack(args, cli.progress && !cli.quiet),
        Commands::Lookup(args) => run_lookup(args),
        Commands::Dump(args) => run_dump(args),
    }
}

fn run_pack(args: &PackArgs, show_progress: bool) -> anyhow::Result<()> {
    let settings = Settings::from_args(args)?;
    if args.print_config {
        match args.print_config_format.as_str() {
            "yaml" => println!("{}", serde_yaml::to_string(&settings)?),
            _ => println!("{}", serde_json::to_string_pretty(&settings)?),
        }
        return Ok(());
    }

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create out_dir {}", args.out_dir.display()))?;

    let files = gather_paths(&args.inputs, &args.include, &args.exclude)?;
    let cache = BuildCache::new(&args.out_dir, &args.name);
    let digest = cache::digest(&serde_json::to_vec(&settings)?, &files)?;
    if !args.force && cache.is_fresh(digest) {
        info!(name = %args.name, "atlas is up to date, skipping (use --force to repack)");
        return Ok(());
    }

    let t0 = Instant::now();
    let inputs = load_sources_with_progress(&files, settings.preprocess(), show_progress)?;
    info!(count = inputs.len(), "loaded input images");

    let out = pack_images(&args.name, inputs, &settings.packer)?;
    for atlas in &out.atlases {
        let png_path = args.out_dir.join(format!("{}.png", atlas.name));
        atlas
            .rgba
            .save(&png_path)
            .with_context(|| format!("write {}", png_path.display()))?;
        info!(?png_path, width = atlas.width, height = atlas.height, "wrote atlas");
    }

    let doc = out.to_document()?;
    for format in settings.formats() {
        let encoded = encode_report(&doc, format)?;
        if !encoded.skipped.is_empty() {
            warn!(
                skipped = encoded.skipped.len(),
                alignment = %settings.alignment,
                "some images were left out of the compact file"
            );
        }
        let path = args.out_dir.join(format!("{}.{}", args.name, format.extension()));
        fs::write(&path, &encoded.bytes).with_context(|| format!("write {}", path.display()))?;
        info!(?path, bytes = encoded.bytes.len(), "metadata written");
    }

    cache.store(digest)?;
    info!(elapsed = %fmt_dur(t0.elapsed()), "{}", out.stats().summary());
    Ok(())
}

fn run_lookup(args: &LookupArgs) -> anyhow::Result<()> {
    let bytes = fs::read(&args.file).with_context(|| format!("read {}", args.file.display()))?;
    match find_image(&bytes, &args.name)? {
        Some(found) => {
            let value = serde_json::json!({
                "texture": found.texture,
                "image": found.image,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        None => anyhow::bail!("image '{}' not found in {}", args.name, args.file.display()),
    }
}

fn run_dump(args: &DumpArgs) -> anyhow::Result<()> {
    let bytes = fs::read(&args.file).with_context(|| format!("read {}", args.file.display()))?;
    let format = decode_format_for(&args.file, &bytes, args.legacy_trim, args.legacy_rotate);
    let doc = decode(&bytes, &format).with_context(|| format!("decode {}", args.file.display()))?;
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

fn decode_format_for(path: &Path, bytes: &[u8], trim: bool, rotate: bool) -> DecodeFormat {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_ascii_lowercase());
    match ext.as_deref() {
        Some("xml") => DecodeFormat::Xml,
        Some("json") => DecodeFormat::Json,
        _ if has_magic(bytes) => DecodeFormat::Binary { legacy: None },
        _ => {
            let mut flags = AtlasFlags::empty();
            flags.set(AtlasFlags::TRIM, trim);
            flags.set(AtlasFlags::ROTATE, rotate);
            DecodeFormat::Binary {
                legacy: Some(LegacyHeader::new(flags)),
            }
        }
    }
}

fn fmt_dur(d: std::time::Duration) -> String {
    let ms = d.as_millis();
    if ms >= 1000 {
        format!("{:.2}s", d.as_secs_f64())
    } else {
        format!("{ms}ms")
    }
}

fn init_tracing_with_level(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error".to_string()
    } else {
        match verbose {
            0 => "info".into(),
            1 => "debug".into(),
            _ => "trace".into(),
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_target(false)
        .try_init();
}
