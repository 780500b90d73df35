use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use dialoguer::Confirm;
use indoc::indoc;
use log::{LevelFilter, info};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use evtc::{
    CompilerSettings, DEFAULT_PREFIX, Generator, ModelJsonGenerator, SummaryGenerator,
    compile_path,
};

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

#[derive(Copy, Clone, PartialEq, Eq)]
enum OutputFormat {
    Summary,
    Json,
}

struct Evtc {
    settings: CompilerSettings,
    input: PathBuf,
    output_path: Option<PathBuf>,
    output_format: OutputFormat,
    confirm_overwrite: bool,
    verbosity_level: LevelFilter,
}

impl Evtc {
    fn from_cli_matches(matches: &ArgMatches) -> Result<Self> {
        let input = PathBuf::from(
            matches
                .get_one::<String>("INPUT")
                .expect("This is a required argument"),
        );

        let output_format = match matches
            .get_one::<String>("format")
            .map(String::as_str)
            .unwrap_or("summary")
        {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Summary,
        };

        let verbosity_level = match matches.get_count("verbose") {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            3 => LevelFilter::Trace,
            _ => {
                eprintln!("using more than -vvv does not affect verbosity level");
                LevelFilter::Trace
            }
        };

        let prefix = matches
            .get_one::<String>("prefix")
            .cloned()
            .unwrap_or_else(|| DEFAULT_PREFIX.to_owned());
        if prefix.is_empty() {
            bail!("the clause prefix must not be empty");
        }

        Ok(Evtc {
            settings: CompilerSettings::new()
                .prefix(prefix)
                .hash_duplicate_files(!matches.get_flag("no-dedupe")),
            input,
            output_path: matches.get_one::<String>("output").map(PathBuf::from),
            output_format,
            confirm_overwrite: !matches.get_flag("no-confirm-overwrite"),
            verbosity_level,
        })
    }

    fn run(&self) -> Result<()> {
        self.try_to_initialize_logging();

        let compilation = compile_path(&self.input, self.settings.clone())
            .with_context(|| format!("failed to compile `{}`", self.input.display()))?;
        info!(
            "compiled {} file(s), skipped {} duplicate(s)",
            compilation.files.len(),
            compilation.skipped.len()
        );

        let generator: Box<dyn Generator> = match self.output_format {
            OutputFormat::Summary => Box::new(SummaryGenerator),
            OutputFormat::Json => Box::new(ModelJsonGenerator { indent: true }),
        };
        let rendered = generator
            .generate(&compilation.provider)
            .with_context(|| format!("`{}` generator failed", generator.name()))?;

        let mut output: Box<dyn Write> = match &self.output_path {
            Some(path) => Box::new(create_output_file(path, self.confirm_overwrite)?),
            None => Box::new(io::stdout()),
        };
        output.write_all(rendered.as_bytes())?;
        if !rendered.ends_with('\n') {
            writeln!(output)?;
        }
        output.flush()?;
        Ok(())
    }

    fn try_to_initialize_logging(&self) {
        if let Err(e) = TermLogger::init(
            self.verbosity_level,
            Config::default(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ) {
            eprintln!("Failed to initialize logging: {:?}", e);
        }
    }
}

/// If `prompt` is set, asks for confirmation before overwriting an existing file.
fn create_output_file(path: &Path, prompt: bool) -> Result<File> {
    if path.is_dir() {
        bail!(
            "There is a directory at {}, refusing to overwrite",
            path.display()
        );
    }

    if path.exists() && prompt {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Are you sure you want to override output file at {}",
                path.display()
            ))
            .default(false)
            .interact()
            .context("failed to display confirmation prompt")?;
        if !confirmed {
            bail!("Cancelled");
        }
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create `{}`", parent.display()))?;
        }
    }

    File::create(path).with_context(|| format!("failed to create `{}`", path.display()))
}

fn command() -> Command {
    Command::new("evtc")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Omer B. <omerbenamram@gmail.com>")
        .about("Compile event provider schemas embedded in C/C++ sources and XML/JSON documents")
        .arg(
            Arg::new("INPUT")
                .required(true)
                .help("Root schema document (XML or JSON)."),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .value_name("PATH")
                .help("Writes output to the file specified instead of stdout, errors will still be printed to stderr.\
                       Will ask for confirmation before overwriting files, to allow overwriting, pass `--no-confirm-overwrite`\
                       Will create parent directories if needed."),
        )
        .arg(
            Arg::new("no-confirm-overwrite")
                .long("no-confirm-overwrite")
                .action(ArgAction::SetTrue)
                .help("When set, will not ask for confirmation before overwriting files, useful for automation"),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .short('f')
                .value_parser(["summary", "json"])
                .default_value("summary")
                .help("Sets the output format")
                .long_help(indoc!(r#"
                    Sets the output format:
                        "summary" - assigned values of every channel, task, opcode and event.
                        "json"    - the whole resolved model as JSON.
                "#)),
        )
        .arg(
            Arg::new("prefix")
                .long("prefix")
                .value_name("LITERAL")
                .default_value(DEFAULT_PREFIX)
                .help("The literal that introduces a schema clause in source files."),
        )
        .arg(
            Arg::new("no-dedupe")
                .long("no-dedupe")
                .action(ArgAction::SetTrue)
                .help("Compile every referenced file, even if identical contents were already compiled."),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("-v - info, -vv - debug, -vvv - trace"),
        )
}

fn main() {
    let matches = command().get_matches();

    let app = match Evtc::from_cli_matches(&matches) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("{:?}", e);
            exit(1)
        }
    };

    if let Err(e) = app.run() {
        eprintln!("{:?}", e);
        exit(1)
    }
}
