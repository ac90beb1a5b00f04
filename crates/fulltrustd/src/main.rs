use std::process::ExitCode;

fn main() -> ExitCode {
    match fulltrustd::run_helper() {
        Ok(outcome) if outcome.succeeded() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("fulltrustd: {error}");
            ExitCode::FAILURE
        }
    }
}
