use clap::{Args, Parser, Subcommand};

#[derive(Args, Debug, Clone, Default)]
pub struct FormatOutputOpts {
    #[arg(
        long,
        help = "Output style: plain, structured or xml (alias of structured).",
        value_name = "STYLE",
        value_parser = ["plain", "structured", "xml"],
        help_heading = "Output Formatting"
    )]
    pub style: Option<String>,

    #[arg(
        long,
        help = "Prefix every line of file content with its line number.",
        help_heading = "Output Formatting"
    )]
    pub output_show_line_numbers: bool,

    #[arg(
        long,
        help = "Number of largest files (by line count) listed in the summary.",
        value_name = "N",
        help_heading = "Output Formatting"
    )]
    pub top_files_len: Option<usize>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct IgnoreTogglesGroup {
    #[arg(
        short = 'i',
        long,
        value_name = "PATTERNS",
        help = "Additional ignore patterns (comma-separated).",
        help_heading = "Ignore Rules"
    )]
    pub ignore: Option<String>,

    #[arg(
        long,
        help = "Do not honour .gitignore and .ignore files.",
        help_heading = "Ignore Rules"
    )]
    pub no_gitignore: bool,

    #[arg(
        long,
        help = "Disable the built-in ignore list (VCS, dependency and build directories, lock files).",
        help_heading = "Ignore Rules"
    )]
    pub no_default_patterns: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RemoteOpts {
    #[arg(
        long,
        value_name = "URL",
        help = "Pack a remote Git repository (URL or GitHub owner/repo shorthand).",
        help_heading = "Remote Source"
    )]
    pub remote: Option<String>,

    #[arg(
        long,
        value_name = "DURATION",
        help = "Abort the clone after this long (e.g. '90s', '2m').",
        requires = "remote",
        help_heading = "Remote Source"
    )]
    pub remote_timeout: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct PackArgs {
    #[arg(
        value_name = "DIRECTORY",
        default_value = ".",
        help = "Directory to pack."
    )]
    pub directory: String,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Output file path [default: repopack-output.txt].",
        help_heading = "Output Control"
    )]
    pub output: Option<String>,

    #[arg(
        long,
        value_name = "PATTERNS",
        help = "Include patterns (comma-separated, e.g. 'src/**/*.{ts,tsx},docs/').",
        help_heading = "Content Filtering"
    )]
    pub include: Option<String>,

    #[arg(
        short = 'c',
        long,
        value_name = "CONFIG",
        help = "Path to a repopack.config.json file.",
        help_heading = "Project Setup"
    )]
    pub config: Option<String>,

    #[clap(flatten)]
    pub ignore_toggles: IgnoreTogglesGroup,
    #[clap(flatten)]
    pub format_output: FormatOutputOpts,
    #[clap(flatten)]
    pub remote: RemoteOpts,
}

#[derive(Parser, Debug)]
#[command(
    name = "repopack",
    author,
    version,
    about = "Pack a repository into a single AI-friendly file.",
    long_about = "repopack walks a directory (or a cloned remote repository), selects files with \ninclude/ignore glob patterns and writes them into one plain-text or XML artifact \nwith an optional summary of the largest files.",
    help_template = "{about-section}\nUsage: {usage}\n\n{all-args}{after-help}",
    after_help = "EXAMPLES:\n  repopack\n  repopack ./my-app --include 'src/**/*.{ts,tsx}' -i '**/*.test.ts' --top-files-len 5\n  repopack --remote owner/repo --style xml -o repo.xml\n  repopack nextjs -d ./web -o ./repopacks",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[clap(flatten)]
    pub pack: PackArgs,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase message verbosity (-v, -vv, -vvv).")]
    pub verbose: u8,

    #[arg(
        short,
        long,
        global = true,
        help = "Silence the report, informational messages and warnings."
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    #[command(about = "Generate one pack per Next.js 13+ concern (common, api-routes, pages, layouts, all).")]
    Nextjs(NextjsArgs),
}

#[derive(Args, Debug, Clone)]
pub struct NextjsArgs {
    #[arg(
        short = 'd',
        long,
        value_name = "DIRECTORY",
        default_value = ".",
        help = "Root directory of the Next.js project.",
        help_heading = "Project Setup"
    )]
    pub dir: String,

    #[arg(
        short = 'o',
        long,
        value_name = "DIRECTORY",
        default_value = "./repopacks",
        help = "Directory the packs are written to.",
        help_heading = "Output Control"
    )]
    pub output: String,

    #[arg(
        short = 'j',
        long,
        value_name = "N",
        default_value_t = repopack_core::targets::DEFAULT_JOBS,
        help = "Maximum number of targets generated concurrently.",
        help_heading = "Output Control"
    )]
    pub jobs: usize,

    #[arg(
        long,
        help = "Stop at the first failing target instead of reporting all outcomes.",
        help_heading = "Output Control"
    )]
    pub fail_fast: bool,

    #[clap(flatten)]
    pub ignore_toggles: IgnoreTogglesGroup,
    #[clap(flatten)]
    pub format_output: FormatOutputOpts,
    #[clap(flatten)]
    pub remote: RemoteOpts,
}
