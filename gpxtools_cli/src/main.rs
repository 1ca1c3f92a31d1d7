use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use gpxtools::{
    rebase_timestamps, remove_pauses, slow_down, summarize, Activity, GpxDocument, PauseParams,
    RebaseTarget, SlowDownParams,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Edit GPX activity timestamps before upload", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collapse recording pauses (expects a constant 1 Hz style recording)
    #[command(alias = "cleanPause")]
    CleanPause(CleanPauseArgs),
    /// Shift every timestamp so the activity starts at the given date/time (UTC)
    #[command(alias = "changeTimestamps")]
    ChangeTimestamps(ChangeTimestampsArgs),
    /// Delay each point a little more than the previous one
    #[command(alias = "slowDown")]
    SlowDown(SlowDownArgs),
    /// Print activity statistics as JSON
    Summarize(SummarizeArgs),
}

#[derive(Args, Debug)]
struct EditArgs {
    /// Input GPX file
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Output GPX file (defaults to <input>_<command>_<YYYYmmddHHMM>.gpx next to the input)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,

    /// Log stage timings
    #[arg(long, action = ArgAction::SetTrue)]
    profile: bool,
}

#[derive(Args, Debug)]
struct CleanPauseArgs {
    #[command(flatten)]
    io: EditArgs,

    /// Expected recording interval in seconds; longer gaps are pauses
    #[arg(long, default_value_t = 1)]
    cadence: u32,
}

#[derive(Args, Debug)]
struct ChangeTimestampsArgs {
    #[command(flatten)]
    io: EditArgs,

    /// Target year (defaults to the activity's)
    #[arg(long)]
    year: Option<i32>,

    /// Target month
    #[arg(long)]
    month: Option<u32>,

    /// Target day of month
    #[arg(long)]
    day: Option<u32>,

    /// Target hour
    #[arg(long)]
    hour: Option<u32>,

    /// Target minute
    #[arg(long)]
    minute: Option<u32>,

    /// Target second
    #[arg(long)]
    second: Option<u32>,
}

#[derive(Args, Debug)]
struct SlowDownArgs {
    #[command(flatten)]
    io: EditArgs,

    /// Per-point delay increment in milliseconds
    #[arg(long, default_value_t = 100)]
    factor: u32,
}

#[derive(Args, Debug)]
struct SummarizeArgs {
    /// Input GPX file
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Expected recording interval in seconds; longer gaps are pauses
    #[arg(long, default_value_t = 1)]
    cadence: u32,

    /// Single-line JSON
    #[arg(long, action = ArgAction::SetTrue)]
    compact: bool,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

impl Command {
    fn verbose(&self) -> bool {
        match self {
            Command::CleanPause(args) => args.io.verbose,
            Command::ChangeTimestamps(args) => args.io.verbose,
            Command::SlowDown(args) => args.io.verbose,
            Command::Summarize(args) => args.verbose,
        }
    }
}

impl From<&ChangeTimestampsArgs> for RebaseTarget {
    fn from(args: &ChangeTimestampsArgs) -> Self {
        RebaseTarget {
            year: args.year,
            month: args.month,
            day: args.day,
            hour: args.hour,
            minute: args.minute,
            second: args.second,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.command.verbose() { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    run(cli, Utc::now())
}

fn run(cli: Cli, now: DateTime<Utc>) -> Result<()> {
    match cli.command {
        Command::CleanPause(args) => handle_clean_pause(args, now),
        Command::ChangeTimestamps(args) => handle_change_timestamps(args, now),
        Command::SlowDown(args) => handle_slow_down(args, now),
        Command::Summarize(args) => handle_summarize(args),
    }
}

fn handle_clean_pause(args: CleanPauseArgs, now: DateTime<Utc>) -> Result<()> {
    let params = PauseParams {
        cadence: Duration::seconds(i64::from(args.cadence)),
    };
    edit_file(&args.io, "cleanPause", now, |activity| {
        let report = remove_pauses(activity, &params)?;
        info!(
            "Removed {} pause(s): {:.1} s taken out, {} point(s) moved",
            report.pauses,
            report.removed_ms as f64 / 1000.0,
            report.points_adjusted
        );
        Ok(())
    })
}

fn handle_change_timestamps(args: ChangeTimestampsArgs, now: DateTime<Utc>) -> Result<()> {
    let target = RebaseTarget::from(&args);
    if target.is_empty() {
        warn!("No date/time component given; timestamps stay where they are");
    }
    edit_file(&args.io, "changeTimestamps", now, |activity| {
        let report = rebase_timestamps(activity, &target)?;
        match report.previous_start {
            Some(previous) => info!(
                "Moved start {} -> {} ({:+} s, {} point(s))",
                previous, report.new_start, report.delta_s, report.points_shifted
            ),
            None => info!(
                "Set start to {} ({} point(s))",
                report.new_start, report.points_shifted
            ),
        }
        Ok(())
    })
}

fn handle_slow_down(args: SlowDownArgs, now: DateTime<Utc>) -> Result<()> {
    let params = SlowDownParams {
        factor_ms: args.factor,
    };
    edit_file(&args.io, "slowDown", now, |activity| {
        let report = slow_down(activity, &params)?;
        info!(
            "Slowed down {} point(s) by {} ms steps, last point +{:.1} s",
            report.points_delayed,
            params.factor_ms,
            report.added_ms as f64 / 1000.0
        );
        Ok(())
    })
}

fn handle_summarize(args: SummarizeArgs) -> Result<()> {
    let input = check_input_file(&args.input)?;
    let doc = read_document(&input)?;
    let summary = summarize(&doc.activity, Duration::seconds(i64::from(args.cadence)));
    let text = if args.compact {
        serde_json::to_string(&summary)?
    } else {
        serde_json::to_string_pretty(&summary)?
    };
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", text)?;
    Ok(())
}

/// Reads `args.input`, applies `edit` to the decoded activity and writes the
/// result. The input is never overwritten.
fn edit_file<F>(args: &EditArgs, command: &str, now: DateTime<Utc>, edit: F) -> Result<()>
where
    F: FnOnce(&mut Activity) -> Result<()>,
{
    let input = check_input_file(&args.input)?;
    let output = match args.output.as_ref() {
        Some(path) => expand_home(path),
        None => default_output_path(&input, command, now),
    };
    if same_file(&input, &output)? {
        return Err(anyhow!(
            "output {} would overwrite the input file",
            output.display()
        ));
    }

    let t_parse = Instant::now();
    let mut doc = read_document(&input)?;
    if args.profile || args.verbose {
        info!(
            "Parse stage: {:.1} ms ({} points)",
            t_parse.elapsed().as_secs_f64() * 1000.0,
            doc.activity.point_count()
        );
    }
    if doc.activity.is_empty() {
        warn!("{} contains no track points", input.display());
    }
    if doc.has_extensions() {
        warn!(
            "{} has <extensions> data (heart rate, cadence, ...) that will not be written to {}",
            input.display(),
            output.display()
        );
    }

    let t_edit = Instant::now();
    edit(&mut doc.activity)?;
    if args.profile || args.verbose {
        info!(
            "Edit stage: {:.1} ms",
            t_edit.elapsed().as_secs_f64() * 1000.0
        );
    }

    let t_write = Instant::now();
    let mut encoded = Vec::new();
    doc.write(&mut encoded)
        .with_context(|| format!("failed to encode {}", output.display()))?;
    fs::write(&output, encoded)
        .with_context(|| format!("failed to write {}", output.display()))?;
    if args.profile || args.verbose {
        info!(
            "Write stage: {:.1} ms",
            t_write.elapsed().as_secs_f64() * 1000.0
        );
    }
    info!("Wrote {}", output.display());
    Ok(())
}

fn read_document(path: &Path) -> Result<GpxDocument> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let doc = GpxDocument::read(BufReader::new(file))
        .with_context(|| format!("failed to parse {}", path.display()))?;
    debug!(
        "{}: creator {}, {} track(s), {} point(s)",
        path.display(),
        doc.raw().creator.as_deref().unwrap_or("unknown"),
        doc.activity.tracks.len(),
        doc.activity.point_count()
    );
    Ok(doc)
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

/// Expands `~`, then requires a `.gpx` extension and an existing file.
fn check_input_file(path: &Path) -> Result<PathBuf> {
    let path = expand_home(path);
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");
    if !extension.eq_ignore_ascii_case("gpx") {
        return Err(anyhow!(
            "not supported file extension '{}' for {} (expected .gpx)",
            extension,
            path.display()
        ));
    }
    if !path.is_file() {
        return Err(anyhow!("input file {} does not exist", path.display()));
    }
    Ok(path)
}

fn default_output_path(input: &Path, command: &str, now: DateTime<Utc>) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("activity");
    input.with_file_name(format!(
        "{}_{}_{}.gpx",
        stem,
        command,
        now.format("%Y%m%d%H%M")
    ))
}

fn same_file(a: &Path, b: &Path) -> Result<bool> {
    if a == b {
        return Ok(true);
    }
    if !b.exists() {
        return Ok(false);
    }
    let a = fs::canonicalize(a).with_context(|| format!("failed to resolve {}", a.display()))?;
    let b = fs::canonicalize(b).with_context(|| format!("failed to resolve {}", b.display()))?;
    Ok(a == b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="Garmin Connect" xmlns="http://www.topografix.com/GPX/1/1">
  <metadata>
    <time>2019-09-21T09:00:00Z</time>
  </metadata>
  <trk>
    <name>Evening Run</name>
    <trkseg>
      <trkpt lat="45.1000" lon="6.2000"><time>2019-09-21T09:00:00Z</time></trkpt>
      <trkpt lat="45.1001" lon="6.2001"><time>2019-09-21T09:00:01Z</time></trkpt>
      <trkpt lat="45.1002" lon="6.2002"><time>2019-09-21T09:00:51Z</time></trkpt>
      <trkpt lat="45.1003" lon="6.2003"><time>2019-09-21T09:00:52Z</time></trkpt>
    </trkseg>
  </trk>
</gpx>
"#;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 17, 18, 42, 13).unwrap()
    }

    fn sample_file(dir: &Path) -> PathBuf {
        let path = dir.join("activity_2778234104.gpx");
        fs::write(&path, SAMPLE).unwrap();
        path
    }

    fn point_times(path: &Path) -> Vec<DateTime<Utc>> {
        read_document(path)
            .unwrap()
            .activity
            .points()
            .map(|p| p.time)
            .collect()
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 9, 21, h, m, s).unwrap()
    }

    #[test]
    fn test_camel_case_aliases_parse() {
        let cli = Cli::try_parse_from(["gpxtools", "cleanPause", "--input", "a.gpx"]).unwrap();
        assert!(matches!(cli.command, Command::CleanPause(ref args) if args.cadence == 1));

        let cli = Cli::try_parse_from(["gpxtools", "slowDown", "-i", "a.gpx"]).unwrap();
        assert!(matches!(cli.command, Command::SlowDown(ref args) if args.factor == 100));

        let cli = Cli::try_parse_from([
            "gpxtools",
            "changeTimestamps",
            "-i",
            "a.gpx",
            "--month",
            "3",
            "--second",
            "15",
        ])
        .unwrap();
        match cli.command {
            Command::ChangeTimestamps(args) => {
                let target = RebaseTarget::from(&args);
                assert_eq!(target.month, Some(3));
                assert_eq!(target.second, Some(15));
                assert_eq!(target.year, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_input_is_required() {
        assert!(Cli::try_parse_from(["gpxtools", "clean-pause"]).is_err());
    }

    #[test]
    fn test_rejects_non_gpx_extension() {
        let err = check_input_file(Path::new("ride.fit")).unwrap_err();
        assert!(err.to_string().contains("not supported file extension 'fit'"));
        let err = check_input_file(Path::new("ride")).unwrap_err();
        assert!(err.to_string().contains("expected .gpx"));
    }

    #[test]
    fn test_rejects_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_input_file(&dir.path().join("missing.GPX")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_default_output_path() {
        let out = default_output_path(Path::new("/data/runs/morning.gpx"), "slowDown", now());
        assert_eq!(
            out,
            PathBuf::from("/data/runs/morning_slowDown_202405171842.gpx")
        );
    }

    #[test]
    fn test_expand_home() {
        let expanded = expand_home(Path::new("~/tracks/a.gpx"));
        match std::env::var_os("HOME") {
            Some(home) => assert_eq!(expanded, PathBuf::from(home).join("tracks/a.gpx")),
            None => assert_eq!(expanded, PathBuf::from("~/tracks/a.gpx")),
        }
        assert_eq!(
            expand_home(Path::new("/abs/a.gpx")),
            PathBuf::from("/abs/a.gpx")
        );
    }

    #[test]
    fn test_clean_pause_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let input = sample_file(dir.path());
        let output = dir.path().join("clean.gpx");
        let cli = Cli::try_parse_from([
            "gpxtools",
            "clean-pause",
            "--input",
            input.to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
        ])
        .unwrap();
        run(cli, now()).unwrap();

        assert_eq!(
            point_times(&output),
            vec![at(9, 0, 0), at(9, 0, 1), at(9, 0, 2), at(9, 0, 3)]
        );
        assert_eq!(fs::read_to_string(&input).unwrap(), SAMPLE);
    }

    #[test]
    fn test_change_timestamps_uses_default_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = sample_file(dir.path());
        let cli = Cli::try_parse_from([
            "gpxtools",
            "change-timestamps",
            "-i",
            input.to_str().unwrap(),
            "--hour",
            "18",
        ])
        .unwrap();
        run(cli, now()).unwrap();

        let output = dir
            .path()
            .join("activity_2778234104_changeTimestamps_202405171842.gpx");
        let times = point_times(&output);
        assert_eq!(times[0], at(18, 0, 0));
        assert_eq!(times[3], at(18, 0, 52));
        assert_eq!(read_document(&output).unwrap().activity.time, Some(at(18, 0, 0)));
    }

    #[test]
    fn test_invalid_date_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = sample_file(dir.path());
        let output = dir.path().join("rebased.gpx");
        let cli = Cli::try_parse_from([
            "gpxtools",
            "changeTimestamps",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--month",
            "2",
            "--day",
            "30",
        ])
        .unwrap();
        let err = run(cli, now()).unwrap_err();
        assert!(err.to_string().contains("invalid date/time"));
        assert!(!output.exists());
    }

    #[test]
    fn test_slow_down_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let input = sample_file(dir.path());
        let output = dir.path().join("slow.gpx");
        let cli = Cli::try_parse_from([
            "gpxtools",
            "slow-down",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--factor",
            "500",
        ])
        .unwrap();
        run(cli, now()).unwrap();

        let times = point_times(&output);
        assert_eq!(times[0], at(9, 0, 0) + Duration::milliseconds(500));
        assert_eq!(times[3], at(9, 0, 52) + Duration::milliseconds(2_000));
    }

    #[test]
    fn test_refuses_to_overwrite_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = sample_file(dir.path());
        let cli = Cli::try_parse_from([
            "gpxtools",
            "slow-down",
            "-i",
            input.to_str().unwrap(),
            "-o",
            input.to_str().unwrap(),
        ])
        .unwrap();
        let err = run(cli, now()).unwrap_err();
        assert!(err.to_string().contains("would overwrite"));
        assert_eq!(fs::read_to_string(&input).unwrap(), SAMPLE);
    }

    #[test]
    fn test_encode_failure_leaves_no_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("late.gpx");
        fs::write(&input, SAMPLE.replace("2019-09-21T09:00", "9999-12-31T23:59")).unwrap();
        let output = dir.path().join("slow.gpx");
        let cli = Cli::try_parse_from([
            "gpxtools",
            "slowDown",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--factor",
            "10000",
        ])
        .unwrap();
        let err = run(cli, now()).unwrap_err();
        assert!(err.to_string().contains("failed to encode"));
        assert!(!output.exists());
    }

    #[test]
    fn test_extension_data_still_edits() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("hr.gpx");
        let with_hr = SAMPLE.replace(
            "<time>2019-09-21T09:00:01Z</time></trkpt>",
            "<time>2019-09-21T09:00:01Z</time><extensions><hr>142</hr></extensions></trkpt>",
        );
        fs::write(&input, with_hr).unwrap();
        assert!(read_document(&input).unwrap().has_extensions());

        let output = dir.path().join("clean.gpx");
        let cli = Cli::try_parse_from([
            "gpxtools",
            "cleanPause",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .unwrap();
        run(cli, now()).unwrap();
        assert_eq!(point_times(&output)[2], at(9, 0, 2));
    }
}
