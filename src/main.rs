use std::process::ExitCode;

fn main() -> ExitCode {
    match labsexplained_lib::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("labsexplained: {e}");
            ExitCode::FAILURE
        }
    }
}
