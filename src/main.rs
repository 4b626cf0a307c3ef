use tracing::error;

use mailtally::args::{validate_args, Args};
use mailtally::extract::{extract_archive, ExtractOptions};
use mailtally::output;
use mailtally::result::AppResult;
use mailtally::utils::setup_logging;

fn run(args: &Args) -> AppResult<()> {
    validate_args(args)?;

    let extraction = extract_archive(
        &args.archive,
        ExtractOptions {
            workers: args.workers,
            unresolved: args.unresolved,
        },
    )?;

    if let Some(path) = &args.json_out {
        output::write_json_file(&extraction.result, path)?;
    }

    if args.console_out {
        output::print_json(&extraction.result)?;
    }

    if args.senders_out {
        output::print_senders(&extraction.result)?;
    }

    Ok(())
}

fn main() {
    let args = match Args::try_parse_legacy(std::env::args_os()) {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };
    setup_logging(args.verbose);

    if let Err(e) = run(&args) {
        error!(exit_code = e.exit_code(), "Error: {}", e);
        std::process::exit(e.exit_code());
    }
}
