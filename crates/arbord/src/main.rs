use std::process::ExitCode;

fn main() -> ExitCode {
    match arbord::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("arbord: {error}");
            ExitCode::FAILURE
        }
    }
}
