use std::fs::File;
use std::io::{self, BufReader, Read};
use std::process;

use argh::FromArgs;
use log::debug;
use timetrash::shell::error::{Error, Result};
use timetrash::shell::{parse_stream, Executor, Scheduler};
use timetrash::utils::config::Config;
use timetrash::utils::log::init_logger;
use timetrash::utils::theme::Theme;
use timetrash::CommandStream;

#[derive(FromArgs)]
/// Run a shell script, optionally running commands that touch different
/// files at the same time.
struct Args {
    /// print each command tree instead of running it
    #[argh(switch, short = 'p')]
    print: bool,

    /// run independent commands concurrently
    #[argh(switch, short = 't')]
    time_travel: bool,

    /// script to run, or `-` for standard input
    #[argh(positional)]
    script: String,
}

fn main() {
    let args: Args = argh::from_env();
    let config = Config::new();
    init_logger(&config);
    let theme = Theme::new();

    if args.print && args.time_travel {
        eprintln!(
            "{}",
            theme.warning(format!("usage: {} [-p | -t] SCRIPT-FILE", config.name))
        );
        process::exit(1);
    }

    match run(&args, &config) {
        Ok(status) => process::exit(status),
        Err(e) => {
            eprintln!("{}", theme.error(format!("{}: {}", config.name, e)));
            process::exit(1);
        }
    }
}

fn run(args: &Args, config: &Config) -> Result<i32> {
    let mut stream = read_script(&args.script)?;
    debug!("{} commands in {}", stream.len(), args.script);

    if args.print {
        for entry in &stream {
            println!("# {}", entry.index());
            println!("{}", entry.command());
        }
        return Ok(0);
    }

    let status = if args.time_travel {
        Scheduler::new(config.poll_interval).run(&mut stream)?
    } else {
        Executor::new().execute_stream(&mut stream)?
    };
    Ok(status.unwrap_or(0))
}

fn read_script(path: &str) -> Result<CommandStream> {
    if path == "-" {
        return parse_stream(io::stdin().lock().bytes());
    }
    let file = File::open(path).map_err(|source| Error::Script {
        path: path.to_string(),
        source,
    })?;
    parse_stream(BufReader::new(file).bytes())
}
