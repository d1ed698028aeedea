use std::process::ExitCode;

mod app;

fn main() -> ExitCode {
    app::bootstrap::init_tracing();
    let config = app::bootstrap::GameConfig::from_env();
    app::loop_runner::run(config)
}
