use clap::{Parser, Subcommand};
use simple_md::build;
use simple_md::compile::Compiler;
use simple_md::config::{self, BuildConfig, SiteConfig};
use simple_md::output::{self, ServeLog};
use simple_md::serve::{self, PreviewServer, ServeOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "simple-md")]
#[command(about = "Convert markdown files to HTML, or preview them live")]
#[command(long_about = "\
Convert markdown files to HTML, or preview them live

Batch build:

  simple-md build '*.md'                    # a.md → a.html, next to the source
  simple-md build -o site --move '**/*'     # whole tree into site/, assets moved
  simple-md build stdin < in.md > out.html  # pipe one document

Live preview:

  simple-md serve docs/                     # browse a folder
  simple-md serve README.md                 # open one page

Pages reload in the browser when their source changes, and the server
exits by itself a few seconds after the last tab is closed.

Settings are read from simple-md.toml in the working directory when present.
Run 'simple-md gen-config' to generate a documented one.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (default: ./simple-md.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(flatten)]
    page: PageArgs,

    #[command(flatten)]
    markdown: MarkdownArgs,

    #[command(subcommand)]
    command: Command,
}

/// Page assembly flags.
#[derive(clap::Args, Clone, Default)]
struct PageArgs {
    /// Page title (default: first level-1 heading)
    #[arg(short, long, global = true)]
    title: Option<String>,

    /// Theme name, stylesheet URL or inline CSS; repeat for several
    #[arg(short, long, global = true)]
    css: Vec<String>,

    /// Favicon URL
    #[arg(long, global = true)]
    favicon: Option<String>,

    /// Page template: a file or the template text
    #[arg(long, global = true, value_name = "TEMPLATE")]
    html: Option<String>,

    /// Rule applied to the markdown before parsing: /pattern/replacement/ or a rule file
    #[arg(long, global = true, value_name = "RULE")]
    re_md: Vec<String>,

    /// Rule applied to the finished page: /pattern/replacement/ or a rule file
    #[arg(long, global = true, value_name = "RULE")]
    re_html: Vec<String>,
}

/// Markdown feature switches, e.g. `--gm-table=false`.
#[derive(clap::Args, Clone, Default)]
struct MarkdownArgs {
    #[arg(long, global = true, value_name = "BOOL")]
    gm_attribute: Option<bool>,
    #[arg(long, global = true, value_name = "BOOL")]
    gm_auto_heading_id: Option<bool>,
    #[arg(long, global = true, value_name = "BOOL")]
    gm_definition_list: Option<bool>,
    #[arg(long, global = true, value_name = "BOOL")]
    gm_footnote: Option<bool>,
    #[arg(long, global = true, value_name = "BOOL")]
    gm_linkify: Option<bool>,
    #[arg(long, global = true, value_name = "BOOL")]
    gm_strikethrough: Option<bool>,
    #[arg(long, global = true, value_name = "BOOL")]
    gm_table: Option<bool>,
    #[arg(long, global = true, value_name = "BOOL")]
    gm_task_list: Option<bool>,
    #[arg(long, global = true, value_name = "BOOL")]
    gm_typographer: Option<bool>,
    #[arg(long, global = true, value_name = "BOOL")]
    gm_unsafe: Option<bool>,
    #[arg(long, global = true, value_name = "BOOL")]
    gm_hard_wraps: Option<bool>,
}

#[derive(clap::Args, Clone)]
struct BuildArgs {
    /// Files to convert: globs (*, ?, **, [..], {a,b}) or `stdin`
    #[arg(required = true, value_name = "PATTERN")]
    patterns: Vec<String>,

    /// Output folder (default: next to the sources)
    #[arg(short, long)]
    out_dir: Option<String>,

    /// Move matched non-markdown files into the output folder
    #[arg(long = "move")]
    move_non_markdown: bool,

    /// Ignore files and folders starting with a dot
    #[arg(long)]
    skip_dot: bool,

    /// Render README.md as index.html
    #[arg(long)]
    readme_index: bool,

    /// Rewrite links to existing local .md files to .html
    #[arg(long, value_name = "BOOL")]
    links_md2html: Option<bool>,
}

#[derive(clap::Args, Clone)]
struct ServeArgs {
    /// Folder or markdown file to serve
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Seconds without requests before exiting, once a page was served (0 = never)
    #[arg(long)]
    timeout: Option<u64>,

    /// Do not reload pages when their source changes
    #[arg(long)]
    no_live_update: bool,

    /// Do not open the browser
    #[arg(long)]
    no_browser: bool,

    /// First port to try
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Command {
    /// Convert markdown files to HTML
    Build(BuildArgs),
    /// Preview a folder or a file in the browser
    Serve(ServeArgs),
    /// Print a stock simple-md.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(ExitCode::SUCCESS);
    }

    ctrlc::set_handler(|| {
        eprintln!("\nBye.");
        std::process::exit(0);
    })?;

    let root = std::env::current_dir()?;
    let mut site = config::load_config(&root, cli.config.as_deref())?;
    apply_page_args(&mut site, &cli.page);
    apply_markdown_args(&mut site, &cli.markdown);

    match cli.command {
        Command::Build(args) => {
            apply_build_args(&mut site, &args);
            site.validate()?;
            run_build(&root, site, args.patterns, cli.quiet)
        }
        Command::Serve(args) => {
            apply_serve_args(&mut site, &args);
            site.validate()?;
            run_serve(&args.path, site, cli.quiet)
        }
        Command::GenConfig => Ok(ExitCode::SUCCESS),
    }
}

fn run_build(
    root: &Path,
    site: SiteConfig,
    patterns: Vec<String>,
    quiet: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let compiler = Compiler::new(&site)?;
    let build_config = BuildConfig::new(root, patterns, &site.build);
    build_config.ensure_out_dir()?;

    let (tx, rx) = mpsc::channel::<build::BuildEvent>();
    let display_root = root.to_path_buf();
    let printer = thread::spawn(move || {
        for event in rx {
            if quiet && !event.is_error() {
                continue;
            }
            for line in output::format_build_event(&event, &display_root) {
                eprintln!("{line}");
            }
        }
    });
    let report = build::build(&build_config, &compiler, Some(tx));
    printer.join().ok();

    if !quiet {
        eprintln!();
        eprintln!("{}", output::format_build_summary(&report));
    }
    Ok(if report.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn run_serve(
    target: &Path,
    site: SiteConfig,
    quiet: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let compiler = Arc::new(Compiler::new(&site)?);
    let (root, page) = serve::serve_target(target)?;

    let live_update = site.serve.live_update;
    let idle_interval =
        (live_update && site.serve.timeout > 0).then(|| Duration::from_secs(site.serve.timeout));
    let server = PreviewServer::bind(ServeOptions {
        root,
        port: site.serve.port,
        idle_interval,
        live_update,
    })?;

    let url = server.url(&page);
    if site.serve.open_browser && open::that(&url).is_err() {
        eprintln!("Can't open the web browser, but you can visit now: {url}");
    }

    let (tx, rx) = mpsc::channel::<serve::ServeEvent>();
    let printer = thread::spawn(move || {
        let mut log = ServeLog::new();
        for event in rx {
            if quiet && !event.is_error() {
                continue;
            }
            for line in log.lines(&event) {
                eprintln!("{line}");
            }
        }
    });
    server.run(compiler, Some(tx));
    printer.join().ok();

    Ok(ExitCode::SUCCESS)
}

fn apply_page_args(site: &mut SiteConfig, args: &PageArgs) {
    if let Some(title) = &args.title {
        site.page.title = title.clone();
    }
    if !args.css.is_empty() {
        site.page.css = args.css.clone();
    }
    if let Some(favicon) = &args.favicon {
        site.page.favicon = favicon.clone();
    }
    if let Some(html) = &args.html {
        site.page.template = html.clone();
    }
    site.rules.markdown.extend(args.re_md.iter().cloned());
    site.rules.html.extend(args.re_html.iter().cloned());
}

fn apply_markdown_args(site: &mut SiteConfig, args: &MarkdownArgs) {
    let md = &mut site.markdown;
    let switches = [
        (args.gm_attribute, &mut md.attribute),
        (args.gm_auto_heading_id, &mut md.auto_heading_id),
        (args.gm_definition_list, &mut md.definition_list),
        (args.gm_footnote, &mut md.footnote),
        (args.gm_linkify, &mut md.linkify),
        (args.gm_strikethrough, &mut md.strikethrough),
        (args.gm_table, &mut md.table),
        (args.gm_task_list, &mut md.task_list),
        (args.gm_typographer, &mut md.typographer),
        (args.gm_unsafe, &mut md.unsafe_html),
        (args.gm_hard_wraps, &mut md.hard_wraps),
    ];
    for (flag, target) in switches {
        if let Some(value) = flag {
            *target = value;
        }
    }
}

fn apply_build_args(site: &mut SiteConfig, args: &BuildArgs) {
    let build = &mut site.build;
    if let Some(out_dir) = &args.out_dir {
        build.out_dir = out_dir.clone();
    }
    build.move_non_markdown |= args.move_non_markdown;
    build.skip_dot |= args.skip_dot;
    build.readme_index |= args.readme_index;
    if let Some(links) = args.links_md2html {
        build.links_md2html = links;
    }
}

fn apply_serve_args(site: &mut SiteConfig, args: &ServeArgs) {
    let serve = &mut site.serve;
    if let Some(timeout) = args.timeout {
        serve.timeout = timeout;
    }
    if args.no_live_update {
        serve.live_update = false;
    }
    if args.no_browser {
        serve.open_browser = false;
    }
    if let Some(port) = args.port {
        serve.port = port;
    }
}
