#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = feeder_config::load_toml(data) {
        if cfg.validate().is_ok() {
            // Anything that validates must convert into runtime config.
            let _ = feeder_core::ConsoleCfg::from(&cfg);
            let _ = feeder_core::LogSinkCfg::from(&cfg.log).trim_block();
        }
    }
});
