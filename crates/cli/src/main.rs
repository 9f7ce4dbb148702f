use std::process::ExitCode;

fn main() -> ExitCode {
    pizzabot_cli::run()
}
