use env_logger::{Builder, Env};
use log::LevelFilter;
use std::io::Write;

const DEFAULT_FILTER: &str = "warn,narration_sync=info";

/// Инициализация логгера для бинарного файла
///
/// `RUST_LOG` переопределяет фильтр по умолчанию.
pub fn init_logger(verbose: bool) {
    let env = Env::default().filter_or("RUST_LOG", DEFAULT_FILTER);

    let mut builder = Builder::from_env(env);

    // Явно подавляем логи HTTP-стека
    builder
        .filter_module("hyper", LevelFilter::Error)
        .filter_module("mio", LevelFilter::Error)
        .filter_module("reqwest", LevelFilter::Warn);

    if verbose {
        builder.filter_module("narration_sync", LevelFilter::Debug);
    }

    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr)
        .init();
}
