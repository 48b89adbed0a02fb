use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use std::path::PathBuf;

use visionlabel::{ClassifierConfig, Label, Model};

#[derive(Parser)]
#[command(name = "visionlabel-cli")]
#[command(about = "Label images with a pretrained TensorFlow classification graph", long_about = None)]
#[command(version)]
struct Args {
    /// Images to classify (PNG or JPEG)
    #[arg(value_name = "IMAGES", required = true)]
    images: Vec<PathBuf>,

    /// Frozen TensorFlow graph (.pb)
    #[arg(short, long, value_name = "FILE")]
    model: PathBuf,

    /// Label file, one label per line
    #[arg(short, long, value_name = "FILE")]
    labels: PathBuf,

    /// Config file (JSON), defaults to ~/.config/visionlabel/config.json
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the effective settings to the user config file
    #[arg(long, default_value_t)]
    save_config: bool,

    /// Number of labels to print per image
    #[arg(short = 'k', long, value_name = "N")]
    top_k: Option<usize>,

    /// Model input height
    #[arg(long, value_name = "PIXELS")]
    height: Option<u32>,

    /// Model input width
    #[arg(long, value_name = "PIXELS")]
    width: Option<u32>,

    /// Value subtracted from every channel
    #[arg(long, value_name = "VALUE", allow_hyphen_values = true)]
    mean: Option<f32>,

    /// Divisor applied after mean subtraction
    #[arg(long, value_name = "VALUE")]
    scale: Option<f32>,

    /// Graph node fed with the image tensor
    #[arg(long, value_name = "NAME")]
    input_node: Option<String>,

    /// Graph node holding the class probabilities
    #[arg(long, value_name = "NAME")]
    output_node: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = FormatArg::Text)]
    format: FormatArg,

    /// Number of threads to use, defaults to the number of logical CPUs
    #[arg(short, long)]
    threads: Option<usize>,

    /// Verbose output
    #[arg(short, long, default_value_t)]
    verbose: bool,

    /// Quiet mode (minimal output)
    #[arg(short, long, default_value_t)]
    quiet: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}

#[derive(Debug, serde::Serialize)]
struct ImageResult {
    image: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<Vec<Label>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    setup_logging(args.verbose, args.quiet);

    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    let results = run(&args)?;

    match args.format {
        FormatArg::Json => println!("{}", render_json(&results)?),
        FormatArg::Text => print_text(&results),
    }

    ensure_all_classified(&results)
}

fn run(args: &Args) -> Result<Vec<ImageResult>> {
    for path in [&args.model, &args.labels] {
        if !path.exists() {
            anyhow::bail!("Input file does not exist: {}", path.display());
        }
    }

    let config = build_config(args)?;
    if args.save_config {
        match config.save() {
            Some(()) => log::info!("Saved settings"),
            None => log::warn!("Failed to save settings"),
        }
    }

    let model = Model::new(&args.model, &args.labels, &config).context("Failed to load model")?;

    let results = args
        .images
        .iter()
        .zip(model.classify_batch(&args.images))
        .map(|(image, result)| match result {
            Ok(labels) => ImageResult {
                image: image.clone(),
                labels: Some(visionlabel::top_k(labels, config.top_k)),
                error: None,
            },
            Err(e) => ImageResult {
                image: image.clone(),
                labels: None,
                error: Some(format!("{e:#}")),
            },
        })
        .collect();

    Ok(results)
}

fn render_json(results: &[ImageResult]) -> Result<String> {
    serde_json::to_string_pretty(results).map_err(Into::into)
}

fn ensure_all_classified(results: &[ImageResult]) -> Result<()> {
    let failed = results.iter().filter(|r| r.error.is_some()).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} images failed", results.len());
    }
    Ok(())
}

fn print_text(results: &[ImageResult]) {
    for result in results {
        println!("{}", result.image.display());
        if let Some(labels) = &result.labels {
            for label in labels {
                println!("  {:<30} {:>7.3}%", label.label, label.probability * 100.0);
            }
        }
        if let Some(error) = &result.error {
            println!("  error: {error}");
        }
    }
}

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn build_config(args: &Args) -> Result<ClassifierConfig> {
    let mut config = match &args.config {
        Some(path) => ClassifierConfig::load_from(path)?,
        None => ClassifierConfig::load().unwrap_or_default(),
    };

    if let Some(top_k) = args.top_k {
        config.top_k = top_k;
    }
    if let Some(height) = args.height {
        config.preprocess.height = height;
    }
    if let Some(width) = args.width {
        config.preprocess.width = width;
    }
    if let Some(mean) = args.mean {
        config.preprocess.mean = mean;
    }
    if let Some(scale) = args.scale {
        config.preprocess.scale = scale;
    }
    if args.input_node.is_some() {
        config.input_node = args.input_node.clone();
    }
    if args.output_node.is_some() {
        config.output_node = args.output_node.clone();
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tract_tensorflow::prelude::tensor1;
    use tract_tensorflow::tfpb::{
        self,
        tensorflow::{DataType, TensorProto},
    };
    use visionlabel::Preprocess;

    /// input [1,h,w,3] -> mean over height and width -> softmax over channels
    fn write_model(dir: &Path) -> (PathBuf, PathBuf, PathBuf) {
        let graph = dir.join("graph.pb");
        let axes = TensorProto::try_from(&tensor1(&[1i32, 2])).unwrap();
        tfpb::graph()
            .node(
                tfpb::node()
                    .name("input")
                    .op("Placeholder")
                    .attr("dtype", DataType::DtFloat),
            )
            .node(
                tfpb::node()
                    .name("axes")
                    .op("Const")
                    .attr("dtype", DataType::DtInt32)
                    .attr("value", axes),
            )
            .node(
                tfpb::node()
                    .name("mean")
                    .op("Mean")
                    .input("input")
                    .input("axes")
                    .attr("T", DataType::DtFloat)
                    .attr("Tidx", DataType::DtInt32)
                    .attr("keep_dims", false),
            )
            .node(tfpb::node().name("output").op("Softmax").input("mean"))
            .save_to(&graph)
            .unwrap();

        let labels = dir.join("labels.txt");
        std::fs::write(&labels, "Horse\nCar\nBike\n").unwrap();

        let config = dir.join("config.json");
        ClassifierConfig {
            preprocess: Preprocess {
                height: 2,
                width: 2,
                mean: 0.0,
                scale: 255.0,
            },
            ..Default::default()
        }
        .save_to(&config)
        .unwrap();

        (graph, labels, config)
    }

    fn write_png(path: &Path, pixel: [u8; 3]) {
        imageproc::image::RgbImage::from_pixel(3, 3, imageproc::image::Rgb(pixel))
            .save(path)
            .unwrap();
    }

    fn cli_args(dir: &Path, extra: &[&str], images: &[&Path]) -> Args {
        let (graph, labels, config) = write_model(dir);
        let mut argv: Vec<String> = vec![
            "visionlabel-cli".into(),
            "-m".into(),
            graph.display().to_string(),
            "-l".into(),
            labels.display().to_string(),
            "-c".into(),
            config.display().to_string(),
        ];
        argv.extend(extra.iter().map(|s| s.to_string()));
        argv.extend(images.iter().map(|p| p.display().to_string()));
        Args::parse_from(argv)
    }

    #[test]
    fn json_reports_labels_and_errors_per_image() {
        let dir = tempfile::tempdir().unwrap();
        let blue = dir.path().join("blue.png");
        write_png(&blue, [0, 0, 255]);
        let gif = dir.path().join("cat.gif");

        let args = cli_args(dir.path(), &["-k", "2", "-f", "json"], &[&blue, &gif]);
        let results = run(&args).unwrap();

        let json: serde_json::Value = serde_json::from_str(&render_json(&results).unwrap()).unwrap();
        let entries = json.as_array().unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0]["image"], blue.display().to_string());
        let labels = entries[0]["labels"].as_array().unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0]["label"], "Bike");
        assert!(entries[0].get("error").is_none());

        assert!(entries[1].get("labels").is_none());
        assert!(entries[1]["error"]
            .as_str()
            .unwrap()
            .starts_with("Unsupported image type given: gif"));

        let err = ensure_all_classified(&results).unwrap_err();
        assert_eq!(err.to_string(), "1 of 2 images failed");
    }

    #[test]
    fn all_images_classified_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let red = dir.path().join("red.png");
        write_png(&red, [255, 0, 0]);

        let results = run(&cli_args(dir.path(), &[], &[&red])).unwrap();
        assert_eq!(results[0].labels.as_ref().unwrap()[0].label, "Horse");
        assert!(ensure_all_classified(&results).is_ok());
    }

    #[test]
    fn unknown_input_node_fails() {
        let dir = tempfile::tempdir().unwrap();
        let red = dir.path().join("red.png");
        write_png(&red, [255, 0, 0]);

        let args = cli_args(dir.path(), &["--input-node", "images"], &[&red]);
        let err = run(&args).unwrap_err();
        assert!(format!("{err:#}").contains("No input node named images"));
    }

    #[test]
    fn missing_model_file_is_reported() {
        let args = Args::parse_from([
            "visionlabel-cli",
            "-m",
            "no/such/graph.pb",
            "-l",
            "labels.txt",
            "cat.png",
        ]);
        let err = run(&args).unwrap_err();
        assert_eq!(err.to_string(), "Input file does not exist: no/such/graph.pb");
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "visionlabel-cli",
            "--model",
            "graph.pb",
            "--labels",
            "labels.txt",
            "--config",
            concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/config.json"),
            "-k",
            "3",
            "--mean",
            "-1.5",
            "cat.jpg",
        ]);
        let config = build_config(&args).unwrap();

        assert_eq!(config.top_k, 3);
        assert_eq!(config.preprocess.mean, -1.5);
        assert_eq!(config.input_node.as_deref(), Some("input"));
        assert_eq!(config.preprocess.height, 299);
    }

    #[test]
    fn zero_scale_flag_is_rejected() {
        let args = Args::parse_from([
            "visionlabel-cli",
            "-m",
            "graph.pb",
            "-l",
            "labels.txt",
            "--config",
            concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/config.json"),
            "--scale",
            "0",
            "cat.png",
        ]);
        assert!(build_config(&args).is_err());
    }

    #[test]
    fn images_are_required() {
        assert!(Args::try_parse_from(["visionlabel-cli", "-m", "g.pb", "-l", "l.txt"]).is_err());
    }
}
