//! CLI flags, config-file schema, and effective-configuration resolution for `odat`.
//!
//! Layering matches the original tool's `configargparse`-based loader: a CLI flag wins over
//! its `ODAT_*` environment variable, which wins over the same key in an optional config
//! file, which wins over a baked-in default.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use config::{Config, File};
use odat::DecoderConfig;
use serde::{Deserialize, Serialize};

use super::OdatError;

#[derive(Debug, Parser)]
#[command(name = "odat", version, about = "OpenLR Diagnostic Analysis Tool")]
pub struct Cli {
    /// Path to a config file (TOML/YAML/JSON, detected by extension) supplying defaults
    /// beneath the CLI flags and environment variables.
    #[arg(short, long, env = "ODAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the GeoJSON road-map snapshot standing in for the target spatial database.
    #[arg(long, env = "ODAT_GRAPH")]
    pub graph: Option<PathBuf>,

    /// Path to the input JSON of location references and source geometries.
    #[arg(short, long, env = "ODAT_INFILE")]
    pub input: Option<PathBuf>,

    /// Decoder configuration used for the baseline full-map decode.
    #[arg(long, env = "ODAT_DECODER_CONFIG", value_enum)]
    pub decoder_config: Option<DecoderConfigKind>,

    /// Directory the streamed results JSON is written into.
    #[arg(long, env = "ODAT_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Target CRS recorded in the output metadata. Only EPSG:4326 geometry is ever produced.
    #[arg(long, env = "ODAT_TARGET_CRS", value_enum)]
    pub target_crs: Option<TargetCrs>,

    /// Corridor radius, in meters, built around each source geometry.
    #[arg(long, env = "ODAT_BUFFER")]
    pub buffer: Option<f64>,

    /// Concave hull ratio used to compute the map-bounds polygon; >= 1.0 bypasses the concave
    /// hull in favor of a convex hull.
    #[arg(long, env = "ODAT_CONCAVE_RATIO")]
    pub concave_ratio: Option<f64>,

    /// Search radius, in meters, around an LRP's coordinate when matching candidate lines
    /// against a buffer overlay.
    #[arg(long, env = "ODAT_LRP_RADIUS")]
    pub lrp_radius: Option<f64>,

    /// Number of worker threads analyzing records concurrently.
    #[arg(long, env = "ODAT_NUM_THREADS")]
    pub num_threads: Option<usize>,

    /// Additionally emit the matched candidate pair per LRP alongside `OK` verdicts.
    #[arg(long)]
    pub detailed: bool,

    /// Enable debug-level logging (equivalent to `RUST_LOG=debug`).
    #[arg(short, long)]
    pub verbose: bool,
}

/// Mirrors [`odat::DecoderConfig`]'s two named baselines; `AnyPath`/`IgnoreFRC`/etc. are
/// cascade-internal and never user-selectable as the run's baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DecoderConfigKind {
    Strict,
    Relaxed,
}

impl DecoderConfigKind {
    pub fn to_decoder_config(self) -> DecoderConfig {
        match self {
            Self::Strict => DecoderConfig::strict(),
            Self::Relaxed => DecoderConfig::relaxed(),
        }
    }
}

/// Accepted for interface compatibility with the original tool; the GeoJSON-backed `RoadMap`
/// carries no reprojection step, so this value is recorded in the output metadata verbatim
/// and otherwise has no effect on decoding (always WGS-84 / EPSG:4326 in, same out).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum TargetCrs {
    #[value(name = "EPSG:4326")]
    #[serde(rename = "EPSG:4326")]
    Epsg4326,
    #[value(name = "EPSG:3857")]
    #[serde(rename = "EPSG:3857")]
    Epsg3857,
}

/// The config-file layer: every field optional so a file may supply as few or as many
/// overrides as it likes.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    graph: Option<PathBuf>,
    input: Option<PathBuf>,
    decoder_config: Option<DecoderConfigKind>,
    output_dir: Option<PathBuf>,
    target_crs: Option<TargetCrs>,
    buffer: Option<f64>,
    concave_ratio: Option<f64>,
    lrp_radius: Option<f64>,
    num_threads: Option<usize>,
    detailed: Option<bool>,
    verbose: Option<bool>,
}

/// The validated, fully-resolved set of run parameters consumed by `main`, and the value
/// whose fields populate the output JSON's `metadata` object.
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    pub graph: PathBuf,
    pub input: PathBuf,
    pub decoder_config: DecoderConfigKind,
    pub output_dir: PathBuf,
    pub target_crs: TargetCrs,
    pub buffer: f64,
    pub concave_ratio: f64,
    pub lrp_radius: f64,
    pub num_threads: usize,
    pub detailed: bool,
    pub verbose: bool,
}

impl RunConfig {
    /// Resolves the effective configuration: CLI flags, then the config file named by
    /// `--config`/`ODAT_CONFIG` (if any), then these defaults.
    pub fn resolve(cli: Cli) -> Result<Self, OdatError> {
        let file = load_file_config(cli.config.as_deref())?;

        let graph = cli
            .graph
            .or(file.graph)
            .ok_or(OdatError::MissingOption { field: "graph", flag: "--graph", env: "ODAT_GRAPH" })?;

        let input = cli
            .input
            .or(file.input)
            .ok_or(OdatError::MissingOption { field: "input", flag: "--input", env: "ODAT_INFILE" })?;

        Ok(Self {
            graph,
            input,
            decoder_config: cli.decoder_config.or(file.decoder_config).unwrap_or(DecoderConfigKind::Strict),
            output_dir: cli.output_dir.or(file.output_dir).unwrap_or_else(|| PathBuf::from("output")),
            target_crs: cli.target_crs.or(file.target_crs).unwrap_or(TargetCrs::Epsg4326),
            buffer: cli.buffer.or(file.buffer).unwrap_or(20.0),
            concave_ratio: cli.concave_ratio.or(file.concave_ratio).unwrap_or(0.5),
            lrp_radius: cli.lrp_radius.or(file.lrp_radius).unwrap_or(20.0),
            num_threads: cli.num_threads.or(file.num_threads).unwrap_or(1).max(1),
            detailed: cli.detailed || file.detailed.unwrap_or(false),
            verbose: cli.verbose || file.verbose.unwrap_or(false),
        })
    }

    /// The path the streamed results JSON is written to: `{output_dir}/{timestamp}.json`,
    /// matching the original tool's run-stamped output filename.
    pub fn output_path(&self) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        self.output_dir.join(format!("{stamp}.json"))
    }
}

fn load_file_config(path: Option<&std::path::Path>) -> Result<FileConfig, OdatError> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };

    let config = Config::builder().add_source(File::from(path.to_path_buf()).required(true)).build()?;
    Ok(config.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn empty_cli() -> Cli {
        Cli {
            config: None,
            graph: None,
            input: None,
            decoder_config: None,
            output_dir: None,
            target_crs: None,
            buffer: None,
            concave_ratio: None,
            lrp_radius: None,
            num_threads: None,
            detailed: false,
            verbose: false,
        }
    }

    #[test]
    fn resolve_fails_when_graph_is_missing_everywhere() {
        let cli = Cli { input: Some(PathBuf::from("in.json")), ..empty_cli() };

        let error = RunConfig::resolve(cli).unwrap_err();

        assert!(matches!(error, OdatError::MissingOption { field: "graph", .. }));
    }

    #[test]
    fn resolve_applies_defaults_when_nothing_else_is_supplied() {
        let cli = Cli {
            graph: Some(PathBuf::from("map.geojson")),
            input: Some(PathBuf::from("in.json")),
            ..empty_cli()
        };

        let config = RunConfig::resolve(cli).unwrap();

        assert_eq!(config.decoder_config, DecoderConfigKind::Strict);
        assert_eq!(config.target_crs, TargetCrs::Epsg4326);
        assert_eq!(config.buffer, 20.0);
        assert_eq!(config.lrp_radius, 20.0);
        assert_eq!(config.num_threads, 1);
        assert!(!config.detailed);
    }

    #[test]
    fn cli_flag_wins_over_config_file() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, r#"graph = "from-file.geojson"
input = "from-file.json"
buffer = 50.0
decoder_config = "Relaxed"
"#)
        .unwrap();

        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            buffer: Some(5.0),
            ..empty_cli()
        };

        let config = RunConfig::resolve(cli).unwrap();

        // `buffer` was set on the CLI, so it wins; `graph`/`input`/`decoder_config` fall
        // through to the file since the CLI left them unset.
        assert_eq!(config.buffer, 5.0);
        assert_eq!(config.graph, PathBuf::from("from-file.geojson"));
        assert_eq!(config.input, PathBuf::from("from-file.json"));
        assert_eq!(config.decoder_config, DecoderConfigKind::Relaxed);
    }

    #[test]
    fn num_threads_is_floored_at_one() {
        let cli = Cli {
            graph: Some(PathBuf::from("map.geojson")),
            input: Some(PathBuf::from("in.json")),
            num_threads: Some(0),
            ..empty_cli()
        };

        let config = RunConfig::resolve(cli).unwrap();

        assert_eq!(config.num_threads, 1);
    }

    #[test]
    fn output_path_is_timestamped_under_the_configured_directory() {
        let cli = Cli {
            graph: Some(PathBuf::from("map.geojson")),
            input: Some(PathBuf::from("in.json")),
            output_dir: Some(PathBuf::from("results")),
            ..empty_cli()
        };

        let config = RunConfig::resolve(cli).unwrap();
        let path = config.output_path();

        assert_eq!(path.parent(), Some(std::path::Path::new("results")));
        assert_eq!(path.extension(), Some(std::ffi::OsStr::new("json")));
    }
}
