use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use sticky_pixel_rs::logger;
use sticky_pixel_rs::memory_correction::{
    CalibrationModel, CorrectionConfig, CorrectionPipeline, CorrectionStrategy, Roi, StackReader,
    StackWriter, TiffStackReader, TiffStackWriter,
};

use tracing::{error, info};

const USAGE: &str = "usage: sticky_pixel [--strategy=S] [--dampening=D] [--no-repair] \
<calibration.tif> <calibration-roi> <data-roi> <output-dir> <channel.tif>...";

struct Args {
    config: CorrectionConfig,
    calibration: PathBuf,
    calibration_roi: Roi,
    data_roi: Roi,
    output_dir: PathBuf,
    channels: Vec<PathBuf>,
}

fn parse_args(args: impl Iterator<Item = String>) -> Result<Args> {
    let mut builder = CorrectionConfig::builder();
    let mut positional = Vec::new();

    for arg in args {
        if let Some(value) = arg.strip_prefix("--strategy=") {
            let strategy: CorrectionStrategy = value.parse()?;
            builder = builder.strategy(strategy);
        } else if let Some(value) = arg.strip_prefix("--dampening=") {
            let dampening: f32 = value
                .parse()
                .with_context(|| format!("invalid dampening '{value}'"))?;
            builder = builder.dampening(dampening);
        } else if arg == "--no-repair" {
            builder = builder.repair_pixels(false);
        } else if arg.starts_with("--") {
            bail!("unknown option '{arg}'\n{USAGE}");
        } else {
            positional.push(arg);
        }
    }

    if positional.len() < 5 {
        bail!("{USAGE}");
    }
    let mut positional = positional.into_iter();
    let mut next = || positional.next().unwrap_or_default();

    let calibration = PathBuf::from(next());
    let calibration_roi: Roi = next().parse().context("invalid calibration ROI")?;
    let data_roi: Roi = next().parse().context("invalid data ROI")?;
    let output_dir = PathBuf::from(next());
    let channels = positional.map(PathBuf::from).collect();

    Ok(Args {
        config: builder.build(),
        calibration,
        calibration_roi,
        data_roi,
        output_dir,
        channels,
    })
}

fn output_path(output_dir: &Path, channel: &Path) -> Result<PathBuf> {
    let name = channel
        .file_name()
        .with_context(|| format!("channel path '{}' has no file name", channel.display()))?;
    Ok(output_dir.join(name))
}

fn run(args: Args) -> Result<()> {
    let reader = TiffStackReader;
    let writer = TiffStackWriter::default();

    let dataset = reader.read_f32(&args.calibration)?;
    let calibration = CalibrationModel::from_dataset(dataset, args.calibration_roi, args.config.alignment)?;
    info!(
        path = %args.calibration.display(),
        roi = %args.calibration_roi,
        "Calibration loaded"
    );

    let stacks = args
        .channels
        .iter()
        .map(|path| reader.read_u16(path))
        .collect::<Result<Vec<_>, _>>()?;
    info!(channels = stacks.len(), roi = %args.data_roi, "Channel stacks loaded");

    let pipeline = CorrectionPipeline::new(args.config)?;
    info!("Strategy: {}", pipeline.corrector_name());

    let output = pipeline.correct_with_report(&stacks, &calibration, &args.data_roi)?;
    if let Some(report) = &output.repair {
        info!(
            defects = report.defect_count,
            degenerate = report.degenerate(),
            "Insensitive pixels repaired"
        );
    }
    output.timings.log_summary();

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;
    for (stack, channel) in output.stacks.iter().zip(&args.channels) {
        let path = output_path(&args.output_dir, channel)?;
        writer.write_u16(stack.view(), &path)?;
        info!(path = %path.display(), "Wrote corrected stack");
    }

    Ok(())
}

fn main() -> Result<()> {
    logger::init();

    info!("Starting sticky_pixel...");

    let args = parse_args(std::env::args().skip(1))?;
    if let Err(e) = run(args) {
        error!("Correction failed: {:#}", e);
        return Err(e);
    }

    info!("Correction successful!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn test_parse_args() {
        let parsed = parse_args(args(&[
            "--strategy=scalar",
            "--dampening=0.5",
            "--no-repair",
            "cal.tif",
            "1,1,100,100",
            "16,11,80,50",
            "out",
            "a/ch0.tif",
            "a/ch1.tif",
        ]))
        .unwrap();

        assert_eq!(parsed.config.strategy, CorrectionStrategy::Scalar);
        assert_eq!(parsed.config.dampening, 0.5);
        assert!(!parsed.config.repair_pixels);
        assert_eq!(parsed.calibration_roi, Roi::new(1, 1, 100, 100));
        assert_eq!(parsed.data_roi, Roi::new(16, 11, 80, 50));
        assert_eq!(parsed.channels.len(), 2);
        assert_eq!(
            output_path(&parsed.output_dir, &parsed.channels[1]).unwrap(),
            PathBuf::from("out/ch1.tif")
        );
    }

    #[test]
    fn test_parse_args_rejects_bad_input() {
        assert!(parse_args(args(&["cal.tif", "1,1,2,2"])).is_err());
        assert!(parse_args(args(&["--fast", "c", "1,1,2,2", "1,1,2,2", "o", "x"])).is_err());
        assert!(parse_args(args(&["--strategy=warp", "c", "1,1,2,2", "1,1,2,2", "o", "x"])).is_err());
        assert!(parse_args(args(&["c", "1,1,2", "1,1,2,2", "o", "x"])).is_err());
    }
}
