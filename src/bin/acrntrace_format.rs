use acrntrace_format::{CancellationToken, Dumper, FormatTable, TableSettings};
use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use dialoguer::Confirm;
use indoc::indoc;
use log::{LevelFilter, info, warn};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

struct TraceDump {
    formats: PathBuf,
    /// `-` reads the trace from stdin.
    input: PathBuf,
    output_target: Option<PathBuf>,
    confirm_overwrite: bool,
    table_settings: TableSettings,
    verbosity_level: Option<LevelFilter>,
}

impl TraceDump {
    pub fn from_cli_matches(matches: &ArgMatches) -> Self {
        let formats = PathBuf::from(matches.get_one::<String>("FORMATS").expect("required"));
        let input = PathBuf::from(matches.get_one::<String>("TRACE").expect("required"));

        let verbosity_level = match matches.get_count("verbose") {
            0 => None,
            1 => Some(LevelFilter::Info),
            2 => Some(LevelFilter::Debug),
            3 => Some(LevelFilter::Trace),
            _ => {
                eprintln!("using more than -vvv does not affect verbosity level");
                Some(LevelFilter::Trace)
            }
        };

        TraceDump {
            formats,
            input,
            output_target: matches.get_one::<String>("output-target").map(PathBuf::from),
            confirm_overwrite: !matches.get_flag("no-confirm-overwrite"),
            table_settings: TableSettings::new().strict_placeholders(!matches.get_flag("lenient")),
            verbosity_level,
        }
    }

    /// Main entry point for `TraceDump`
    pub fn run(&self) -> Result<()> {
        self.try_to_initialize_logging();

        // Both inputs are opened before any record is decoded.
        let table = FormatTable::from_path_with_settings(&self.formats, &self.table_settings)
            .with_context(|| {
                format!("Failed to load format rules from `{}`", self.formats.display())
            })?;
        info!("Loaded {} format rules", table.len());

        let input = self.open_input()?;
        let output = self.open_output()?;

        let cancel = CancellationToken::new();
        if let Err(e) = spawn_interrupt_listener(cancel.clone()) {
            warn!("Ctrl-C will terminate without flushing output: {e:#}");
        }

        let mut dumper = Dumper::new(&table, output).with_cancellation(cancel);
        dumper.dump(input).with_context(|| {
            format!("Failed to decode trace `{}`", self.input.display())
        })?;

        Ok(())
    }

    fn open_input(&self) -> Result<Box<dyn Read>> {
        if self.input.as_os_str() == "-" {
            return Ok(Box::new(io::stdin().lock()));
        }

        let f = File::open(&self.input)
            .with_context(|| format!("Failed to open trace file `{}`", self.input.display()))?;
        Ok(Box::new(BufReader::new(f)))
    }

    fn open_output(&self) -> Result<Box<dyn Write>> {
        match &self.output_target {
            Some(path) => {
                let f = create_output_file(path, self.confirm_overwrite).with_context(|| {
                    format!("An error occurred while creating output file at `{}`", path.display())
                })?;
                Ok(Box::new(BufWriter::new(f)))
            }
            None => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
        }
    }

    fn try_to_initialize_logging(&self) {
        if let Some(level) = self.verbosity_level {
            if let Err(e) = TermLogger::init(
                level,
                Config::default(),
                TerminalMode::Stderr,
                ColorChoice::Auto,
            ) {
                eprintln!("Failed to initialize logging: {e}");
            }
        }
    }
}

/// If `prompt` is passed, will display a confirmation prompt before overwriting files.
fn create_output_file(path: &Path, prompt: bool) -> Result<File> {
    if path.is_dir() {
        bail!(
            "There is a directory at {}, refusing to overwrite",
            path.display()
        );
    }

    if path.exists() {
        if prompt {
            let confirmed = Confirm::new()
                .with_prompt(format!(
                    "Are you sure you want to override output file at {}",
                    path.display()
                ))
                .default(false)
                .interact()
                .context("Failed to write confirmation prompt to term")?;

            if !confirmed {
                bail!("Cancelled");
            }
        }
        return Ok(File::create(path)?);
    }

    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            fs::create_dir_all(parent)?;
        }
        Some(_) => {}
        None => bail!("Output file cannot be root."),
    }

    Ok(File::create(path)?)
}

/// Cancels `cancel` on the first Ctrl-C, a second one exits immediately.
///
/// The decoder polls the token between records, so a pending blocking read is not interrupted
/// by the first signal.
fn spawn_interrupt_listener(cancel: CancellationToken) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build signal runtime")?;

    std::thread::Builder::new()
        .name("ctrl-c".to_owned())
        .spawn(move || {
            runtime.block_on(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for Ctrl-C: {e}");
                    return;
                }
                info!("Received Ctrl-C, stopping after the current record");
                cancel.cancel();

                if tokio::signal::ctrl_c().await.is_ok() {
                    exit(130);
                }
            })
        })
        .context("Failed to spawn signal thread")?;

    Ok(())
}

fn cli() -> Command {
    Command::new("acrntrace_format")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Formats acrntrace binary trace data according to a rule file")
        .long_about(indoc!(
            r#"
            Parses trace data in binary format generated by acrntrace and reformats it
            according to the rules in the FORMATS file.

            Each rule reads `<event id> <template>`, one rule per event id. Lines starting
            with `#` are comments. The event id is a decimal, 0x hex or 0o / leading zero
            octal literal.

            Templates may use %(cpu)d, %(tsc)d, %(event)d, %(1)d .. %(16)d, which refer to
            the CPU number, the timestamp counter, the event id and the data logged in the
            trace entry. `d` prints in decimal, `x` in hexadecimal and `o` in octal.
        "#
        ))
        .arg(
            Arg::new("FORMATS")
                .required(true)
                .help("Path of the format rule file."),
        )
        .arg(
            Arg::new("TRACE")
                .required(true)
                .help("Path of the binary trace, or `-` to read it from stdin."),
        )
        .arg(
            Arg::new("output-target")
                .long("output")
                .short('f')
                .action(ArgAction::Set)
                .help(indoc!("Writes output to the file specified instead of stdout, errors will still be printed to stderr.
                       Will ask for confirmation before overwriting files, to allow overwriting, pass `--no-confirm-overwrite`
                       Will create parent directories if needed.")),
        )
        .arg(
            Arg::new("no-confirm-overwrite")
                .long("no-confirm-overwrite")
                .action(ArgAction::SetTrue)
                .help("When set, will not ask for confirmation before overwriting files, useful for automation"),
        )
        .arg(
            Arg::new("lenient")
                .long("lenient")
                .action(ArgAction::SetTrue)
                .help(indoc!("When set, rules naming unknown placeholders are kept instead of rejecting the format file.
                       Records using them are printed as the raw template followed by their field values.")),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("-v - info, -vv - debug, -vvv - trace"),
        )
}

fn main() {
    let matches = cli().get_matches();

    let app = TraceDump::from_cli_matches(&matches);
    if let Err(e) = app.run() {
        eprintln!("{e:#}");
        exit(1);
    }
}
