use std::path::PathBuf;

use blog_tui::app::LaunchOptions;

const USAGE: &str = "BLOG-TUI, a terminal client for the blog REST API.

Usage: blog-tui [--base-url URL] [--config PATH]

  --base-url URL       API base address, e.g. http://localhost:5002/api
  --config PATH        Read configuration from PATH
  --version, -V        Show version and exit
  --help,    -h        Show this help message";

enum Cli {
    Run(LaunchOptions),
    Exit,
}

fn main() {
    let launch = match parse_args(std::env::args().skip(1)) {
        Ok(Cli::Run(launch)) => launch,
        Ok(Cli::Exit) => return,
        Err(message) => {
            eprintln!("error: {message}\n\n{USAGE}");
            std::process::exit(2);
        }
    };

    if let Err(err) = blog_tui::run(launch) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Cli, String> {
    let mut launch = LaunchOptions::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("BLOG-TUI {}", blog_tui::VERSION);
                return Ok(Cli::Exit);
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                return Ok(Cli::Exit);
            }
            "--base-url" => {
                let value = args.next().ok_or("--base-url needs a value")?;
                launch.base_url = Some(value);
            }
            "--config" => {
                let value = args.next().ok_or("--config needs a value")?;
                launch.config_file = Some(PathBuf::from(value));
            }
            other => {
                if let Some(value) = other.strip_prefix("--base-url=") {
                    launch.base_url = Some(value.to_string());
                } else if let Some(value) = other.strip_prefix("--config=") {
                    launch.config_file = Some(PathBuf::from(value));
                } else {
                    return Err(format!("unknown argument {other:?}"));
                }
            }
        }
    }
    Ok(Cli::Run(launch))
}
