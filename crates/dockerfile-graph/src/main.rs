use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand, ValueEnum, error::ErrorKind};
use clap_complete::{
    generate,
    shells::{Bash, Fish, Zsh},
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use dockerfile_graph_core::exit_code::ExitCode;
use dockerfile_graph_core::{DotOptions, EdgeStyle, Error, parse_dockerfile, render_dot};

const LONG_ABOUT: &str = "Parse a Dockerfile and print its build stages, layers, and the images and stages they wait for as a Graphviz DOT graph.\n\nPipe the output to `dot` to render it, or use --json to get the parsed structure instead.";

const AFTER_HELP: &str = "Examples:\n  dockerfile-graph | dot -Tsvg -o Dockerfile.svg\n  dockerfile-graph --file build/Dockerfile --layers --legend\n  dockerfile-graph --max-label-length 40 --layers -o graph.dot\n  cat Dockerfile | dockerfile-graph --stdin --json";

fn main() {
    let code = match run() {
        Ok(()) => ExitCode::Success,
        Err(app_error) => {
            if !app_error.message.is_empty() {
                eprintln!("{}", app_error.message);
            }
            app_error.code
        }
    };
    std::process::exit(code.as_i32());
}

#[derive(Debug)]
struct AppError {
    code: ExitCode,
    message: String,
}

impl AppError {
    fn usage(message: impl Into<String>) -> Self {
        Self {
            code: ExitCode::Usage,
            message: message.into(),
        }
    }
}

impl From<Error> for AppError {
    fn from(value: Error) -> Self {
        Self {
            code: ExitCode::from(&value),
            message: value.to_string(),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Generate shell completion scripts")]
    Completion {
        #[arg(value_enum, value_name = "SHELL")]
        shell: CompletionShell,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum EdgeStyleArg {
    Default,
    Solid,
}

impl From<EdgeStyleArg> for EdgeStyle {
    fn from(value: EdgeStyleArg) -> Self {
        match value {
            EdgeStyleArg::Default => Self::Default,
            EdgeStyleArg::Solid => Self::Solid,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "dockerfile-graph",
    about = "Visualize Dockerfile build stages as a graph",
    long_about = LONG_ABOUT,
    after_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(
        short = 'f',
        long = "file",
        value_name = "PATH",
        help = "Read Dockerfile from a file path",
        long_help = "Read Dockerfile content from PATH. If omitted, ./Dockerfile is used."
    )]
    file: Option<PathBuf>,

    #[arg(
        long = "stdin",
        help = "Read Dockerfile from stdin",
        long_help = "Read Dockerfile content from stdin. This conflicts with --file."
    )]
    stdin: bool,

    #[arg(
        short = 'm',
        long = "max-label-length",
        value_name = "N",
        default_value_t = 20,
        env = "DOCKERFILE_GRAPH_MAX_LABEL_LENGTH",
        help = "Maximum length of layer labels",
        long_help = "Maximum number of characters in a layer label. Longer instructions are cut and end with '...'. Must be at least 4."
    )]
    max_label_length: usize,

    #[arg(
        long = "layers",
        help = "Draw every layer of each stage",
        long_help = "Draw one node per instruction, grouped by stage, instead of one node per stage."
    )]
    layers: bool,

    #[arg(long = "legend", help = "Add a legend explaining edge styles")]
    legend: bool,

    #[arg(
        long = "edge-style",
        value_enum,
        value_name = "STYLE",
        default_value_t = EdgeStyleArg::Default,
        help = "Line style of COPY and RUN --mount edges",
        long_help = "Line style of dependency edges. 'default' dashes COPY edges and dots RUN --mount edges; 'solid' draws every edge solid."
    )]
    edge_style: EdgeStyleArg,

    #[arg(
        long = "nodesep",
        value_name = "INCHES",
        default_value_t = 1.0,
        help = "Minimum space between nodes of the same rank"
    )]
    nodesep: f64,

    #[arg(
        long = "ranksep",
        value_name = "INCHES",
        default_value_t = 0.5,
        help = "Minimum space between ranks"
    )]
    ranksep: f64,

    #[arg(
        long = "json",
        help = "Emit the parsed structure as JSON",
        long_help = "Emit the parsed Dockerfile (external images, stages, layers, wait-for edges) as JSON instead of DOT."
    )]
    json: bool,

    #[arg(
        short = 'o',
        long = "output",
        value_name = "PATH",
        help = "Write output to a file instead of stdout"
    )]
    output: Option<PathBuf>,

    #[arg(
        short = 'v',
        long = "verbose",
        help = "Print debug details to stderr",
        long_help = "Print parser debug logging to stderr while keeping stdout clean for the graph. RUST_LOG takes precedence when set."
    )]
    verbose: bool,
}

fn run() -> Result<(), AppError> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if matches!(
                err.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            ) {
                print!("{err}");
                return Ok(());
            }
            return Err(AppError::usage(err.to_string()));
        }
    };

    execute(cli)
}

fn execute(cli: Cli) -> Result<(), AppError> {
    if let Some(command) = cli.command {
        return execute_command(command);
    }

    validate_cli(&cli)?;
    init_logging(cli.verbose);

    let content = read_dockerfile(&cli)?;
    let dockerfile = parse_dockerfile(&content, cli.max_label_length)?;

    let rendered = if cli.json {
        let mut json = serde_json::to_string_pretty(&dockerfile)
            .map_err(std::io::Error::from)
            .map_err(Error::from)?;
        json.push('\n');
        json
    } else {
        let options = DotOptions {
            layers: cli.layers,
            legend: cli.legend,
            edge_style: cli.edge_style.into(),
            nodesep: cli.nodesep,
            ranksep: cli.ranksep,
        };
        render_dot(&dockerfile, &options)
    };

    write_output(&rendered, cli.output.as_deref())
}

fn execute_command(command: Commands) -> Result<(), AppError> {
    match command {
        Commands::Completion { shell } => write_completion(shell),
    }
}

fn write_completion(shell: CompletionShell) -> Result<(), AppError> {
    let mut command = Cli::command();
    let mut stdout = std::io::stdout().lock();
    match shell {
        CompletionShell::Bash => generate(Bash, &mut command, "dockerfile-graph", &mut stdout),
        CompletionShell::Zsh => generate(Zsh, &mut command, "dockerfile-graph", &mut stdout),
        CompletionShell::Fish => generate(Fish, &mut command, "dockerfile-graph", &mut stdout),
    }
    stdout.flush().map_err(Error::from).map_err(AppError::from)
}

fn init_logging(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn validate_cli(cli: &Cli) -> Result<(), AppError> {
    if cli.stdin && cli.file.is_some() {
        return Err(AppError::usage("--stdin is mutually exclusive with --file"));
    }
    if !(cli.nodesep.is_finite() && cli.nodesep >= 0.0) {
        return Err(AppError::usage("--nodesep must be a non-negative number"));
    }
    if !(cli.ranksep.is_finite() && cli.ranksep >= 0.0) {
        return Err(AppError::usage("--ranksep must be a non-negative number"));
    }
    Ok(())
}

fn read_dockerfile(cli: &Cli) -> Result<Vec<u8>, AppError> {
    if cli.stdin {
        debug!("reading dockerfile from stdin");
        let mut input = Vec::new();
        std::io::stdin()
            .read_to_end(&mut input)
            .map_err(Error::from)?;
        return Ok(input);
    }

    let path = cli.file.as_deref().unwrap_or(Path::new("Dockerfile"));
    debug!(path = %path.display(), "reading dockerfile");
    std::fs::read(path)
        .map_err(Error::from)
        .map_err(AppError::from)
}

fn write_output(rendered: &str, output: Option<&Path>) -> Result<(), AppError> {
    if let Some(path) = output {
        debug!(path = %path.display(), "writing output");
        return std::fs::write(path, rendered)
            .map_err(Error::from)
            .map_err(AppError::from);
    }

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(rendered.as_bytes()).map_err(Error::from)?;
    stdout.flush().map_err(Error::from)?;
    Ok(())
}
