use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::aggregate::UnresolvedPolicy;
use crate::errors::AppError;
use crate::result::AppResult;

#[derive(Parser, Debug)]
#[command(
    name = "mailtally",
    about = "Count, per receiving address, the mails received from each sender in an mbox archive",
    version,
    long_about = None
)]
pub struct Args {
    /// Path to the mbox archive file
    pub archive: PathBuf,

    /// Write the JSON report to this file (-jo)
    #[arg(long, value_name = "FILE")]
    pub json_out: Option<PathBuf>,

    /// Print the JSON report to the console (-co)
    #[arg(long)]
    pub console_out: bool,

    /// Print the de-duplicated list of senders to the console (-so)
    #[arg(long)]
    pub senders_out: bool,

    /// Handling of messages where neither sender nor receiver could be resolved
    #[arg(long, value_enum, default_value_t = UnresolvedPolicy::Bucket)]
    pub unresolved: UnresolvedPolicy,

    /// Number of worker threads used for header parsing
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Parses a command line, accepting the two-letter `-jo`, `-co` and `-so` flags.
    pub fn try_parse_legacy<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::try_parse_from(rewrite_legacy_flags(args))
    }
}

fn rewrite_legacy_flags<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| match arg.to_str() {
            Some("-jo") => OsString::from("--json-out"),
            Some("-co") => OsString::from("--console-out"),
            Some("-so") => OsString::from("--senders-out"),
            _ => arg,
        })
        .collect()
}

pub fn validate_args(args: &Args) -> AppResult<()> {
    if args.json_out.is_none() && !args.console_out && !args.senders_out {
        return Err(AppError::InvalidArguments(
            "at least one output option is required: -jo <file>, -co or -so".to_string(),
        ));
    }

    if args.console_out && args.senders_out {
        return Err(AppError::InvalidArguments(
            "-co and -so cannot be used together".to_string(),
        ));
    }

    if let Some(workers) = args.workers {
        if workers == 0 {
            return Err(AppError::InvalidArguments(
                "--workers must be greater than 0".to_string(),
            ));
        }
    }

    Ok(())
}
