use std::process::ExitCode;

fn main() -> ExitCode {
    match stratumd::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(target: "stratumd", error = %error, "daemon exited with an error");
            eprintln!("stratumd: {error}");
            ExitCode::FAILURE
        }
    }
}
