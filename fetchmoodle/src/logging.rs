use std::io::Write;

/// Logs go to stderr, stdout only carries the JSON output.
pub fn init_logger() {
    env_logger::builder()
        .filter_module(
            "fetchmoodle",
            if cfg!(debug_assertions) {
                log::LevelFilter::Debug
            } else {
                log::LevelFilter::Info
            },
        )
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format(|f, record| {
            let target = record.target();
            let level = record.level();
            let args = record.args();
            let time = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");

            writeln!(f, "{time} {level:<5} [{target}] {args}")
        })
        .init();
}
